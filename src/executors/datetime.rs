//! xsd:date, xsd:gYear and xsd:gMonth values
//!
//! Calendar values are parsed into a [`XsdDate`] so that range and
//! enumeration facets can compare them. Values with a timezone are
//! normalized to UTC minutes for comparison; values without one compare as
//! if they were UTC.

use chrono::{Datelike, NaiveDate};

/// Which calendar type a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// xsd:date — `[-]YYYY-MM-DD` with optional timezone
    Date,
    /// xsd:gYear — `[-]YYYY` with optional timezone
    GYear,
    /// xsd:gMonth — `--MM` with optional timezone
    GMonth,
}

impl DateKind {
    /// The human-readable type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            DateKind::Date => "date",
            DateKind::GYear => "year",
            DateKind::GMonth => "month",
        }
    }
}

/// A parsed calendar value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XsdDate {
    date: NaiveDate,
    timezone_minutes: Option<i32>,
}

impl XsdDate {
    /// Parse a lexical value of the given kind. Returns `None` when the
    /// value does not match the kind's lexical space.
    pub fn parse(value: &str, kind: DateKind) -> Option<Self> {
        let (body, timezone_minutes) = split_timezone(value)?;
        let date = match kind {
            DateKind::Date => parse_date(body)?,
            DateKind::GYear => {
                let year = parse_year(body)?;
                NaiveDate::from_ymd_opt(year, 1, 1)?
            }
            DateKind::GMonth => {
                let month = parse_month(body)?;
                // Anchor month-only values in an arbitrary common year;
                // only the month takes part in comparisons
                NaiveDate::from_ymd_opt(2000, month, 1)?
            }
        };
        Some(Self {
            date,
            timezone_minutes,
        })
    }

    /// Normalized comparison key in minutes
    fn key(&self) -> i64 {
        i64::from(self.date.num_days_from_ce()) * 24 * 60
            - i64::from(self.timezone_minutes.unwrap_or(0))
    }
}

impl PartialOrd for XsdDate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XsdDate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// Split a trailing `Z` or `±hh:mm` timezone off the lexical value.
fn split_timezone(value: &str) -> Option<(&str, Option<i32>)> {
    if let Some(body) = value.strip_suffix('Z') {
        return Some((body, Some(0)));
    }
    if value.is_ascii() && value.len() > 6 {
        let (body, suffix) = value.split_at(value.len() - 6);
        let bytes = suffix.as_bytes();
        if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' {
            let hours: i32 = suffix[1..3].parse().ok()?;
            let minutes: i32 = suffix[4..6].parse().ok()?;
            if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
                return None;
            }
            let total = hours * 60 + minutes;
            let signed = if bytes[0] == b'-' { -total } else { total };
            return Some((body, Some(signed)));
        }
    }
    Some((value, None))
}

fn parse_date(body: &str) -> Option<NaiveDate> {
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let mut parts = body.splitn(3, '-');
    let year_part = parts.next()?;
    let month_part = parts.next()?;
    let day_part = parts.next()?;
    if year_part.len() < 4 || month_part.len() != 2 || day_part.len() != 2 {
        return None;
    }
    if !all_digits(year_part) || !all_digits(month_part) || !all_digits(day_part) {
        return None;
    }
    let mut year: i32 = year_part.parse().ok()?;
    if negative {
        year = -year;
    }
    NaiveDate::from_ymd_opt(year, month_part.parse().ok()?, day_part.parse().ok()?)
}

fn parse_year(body: &str) -> Option<i32> {
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    if digits.len() < 4 || !all_digits(digits) {
        return None;
    }
    let year: i32 = digits.parse().ok()?;
    Some(if negative { -year } else { year })
}

fn parse_month(body: &str) -> Option<u32> {
    // "--MM", plus the legacy "--MM--" form
    let digits = body.strip_prefix("--")?;
    let digits = digits.strip_suffix("--").unwrap_or(digits);
    if digits.len() != 2 || !all_digits(digits) {
        return None;
    }
    let month: u32 = digits.parse().ok()?;
    (1..=12).contains(&month).then_some(month)
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
