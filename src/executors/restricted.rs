//! Facet-driven executor for derived simple types
//!
//! One [`RestrictedExecutor`] covers every user-declared simple type: it
//! chains to the base type's executor and then applies the restriction's
//! facets. Bound and enumeration facets are parsed once, at construction,
//! into the comparison domain dictated by the atomic base type — exact
//! decimals for the numeric builtins, calendar values for the date
//! builtins, plain strings otherwise.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;

use crate::diagnostics::{
    DiagnosticKind, FacetRestriction, NodeKind, Position, SchemaDiagnostic,
};
use crate::error::{Error, Result};
use crate::schema::restriction::WhiteSpace;
use crate::schema::SimpleType;

use super::builtins::decimal_digits;
use super::datetime::{DateKind, XsdDate};
use super::pattern::compile_pattern;
use super::SimpleTypeExecutor;

/// A lower or upper bound facet, with the literal facet value kept for
/// diagnostics
struct Bound<T> {
    value: T,
    raw: String,
}

struct NumberFacets {
    min_inclusive: Option<Bound<Decimal>>,
    min_exclusive: Option<Bound<Decimal>>,
    max_inclusive: Option<Bound<Decimal>>,
    max_exclusive: Option<Bound<Decimal>>,
    total_digits: Option<u32>,
    fraction_digits: Option<u32>,
    values: Vec<Decimal>,
}

struct CalendarFacets {
    kind: DateKind,
    min_inclusive: Option<Bound<XsdDate>>,
    min_exclusive: Option<Bound<XsdDate>>,
    max_inclusive: Option<Bound<XsdDate>>,
    max_exclusive: Option<Bound<XsdDate>>,
    values: Vec<XsdDate>,
}

enum FacetDomain {
    Text { values: HashSet<String> },
    Number(NumberFacets),
    Calendar(CalendarFacets),
}

/// The executor for a simple type with a restriction
pub struct RestrictedExecutor {
    base: Option<Arc<dyn SimpleTypeExecutor>>,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    patterns: Vec<Arc<Regex>>,
    pattern_description: String,
    enumeration: Vec<String>,
    white_space: WhiteSpace,
    domain: FacetDomain,
}

impl RestrictedExecutor {
    /// Parse the type's facets into an executor
    pub fn new(base: Option<Arc<dyn SimpleTypeExecutor>>, ty: &Arc<SimpleType>) -> Result<Self> {
        let atomic = ty.atomic_base();
        let domain_kind = domain_of(&atomic.name);
        let Some(restriction) = ty.restriction.as_ref() else {
            return Ok(Self {
                base,
                length: None,
                min_length: None,
                max_length: None,
                patterns: Vec::new(),
                pattern_description: String::new(),
                enumeration: Vec::new(),
                white_space: WhiteSpace::Preserve,
                domain: FacetDomain::Text {
                    values: HashSet::new(),
                },
            });
        };
        restriction.check()?;

        let patterns = restriction
            .patterns
            .iter()
            .map(|pattern| compile_pattern(pattern))
            .collect::<Result<Vec<_>>>()?;
        let pattern_description = restriction
            .pattern_description
            .clone()
            .or_else(|| {
                (!ty.description.is_empty()).then(|| ty.description.join("; "))
            })
            .unwrap_or_else(|| {
                format!(
                    "the value must match one of the patterns: {}",
                    restriction
                        .patterns
                        .iter()
                        .map(|p| format!("'{}'", p))
                        .collect::<Vec<_>>()
                        .join(" or ")
                )
            });

        let domain = match domain_kind {
            DomainKind::Number => FacetDomain::Number(NumberFacets {
                min_inclusive: decimal_bound(restriction.min_inclusive.as_deref())?,
                min_exclusive: decimal_bound(restriction.min_exclusive.as_deref())?,
                max_inclusive: decimal_bound(restriction.max_inclusive.as_deref())?,
                max_exclusive: decimal_bound(restriction.max_exclusive.as_deref())?,
                total_digits: restriction.total_digits,
                fraction_digits: restriction.fraction_digits,
                values: restriction
                    .values
                    .iter()
                    .map(|value| parse_decimal(value))
                    .collect::<Result<Vec<_>>>()?,
            }),
            DomainKind::Calendar(kind) => FacetDomain::Calendar(CalendarFacets {
                kind,
                min_inclusive: date_bound(restriction.min_inclusive.as_deref(), kind)?,
                min_exclusive: date_bound(restriction.min_exclusive.as_deref(), kind)?,
                max_inclusive: date_bound(restriction.max_inclusive.as_deref(), kind)?,
                max_exclusive: date_bound(restriction.max_exclusive.as_deref(), kind)?,
                values: restriction
                    .values
                    .iter()
                    .filter(|value| !value.is_empty())
                    .map(|value| {
                        XsdDate::parse(value, kind).ok_or_else(|| {
                            Error::InvalidRestriction(format!(
                                "unable to parse a {} from '{}'",
                                kind.type_name(),
                                value
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            }),
            DomainKind::Text => FacetDomain::Text {
                values: restriction.values.iter().cloned().collect(),
            },
        };

        Ok(Self {
            base,
            length: restriction.length,
            min_length: restriction.min_length,
            max_length: restriction.max_length,
            patterns,
            pattern_description,
            enumeration: restriction.values.clone(),
            white_space: restriction.white_space,
            domain,
        })
    }

    fn facet_violation(
        &self,
        kind: NodeKind,
        name: &str,
        value: &str,
        facet: FacetRestriction,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        Some(SchemaDiagnostic::new(
            position,
            DiagnosticKind::FacetViolation {
                kind,
                name: name.to_string(),
                value: value.to_string(),
                facet,
            },
        ))
    }

    fn check_number(
        &self,
        facets: &NumberFacets,
        prepared: &str,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        // The base-type executor has already vetted the syntax; a value it
        // accepted parses here
        let parsed = Decimal::from_str(prepared.trim()).ok()?;
        if let Some(bound) = &facets.max_inclusive {
            if parsed > bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MaxInclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.max_exclusive {
            if parsed >= bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MaxExclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.min_inclusive {
            if parsed < bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MinInclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.min_exclusive {
            if parsed <= bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MinExclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(total) = facets.total_digits {
            if let Some((actual_total, actual_fraction)) = decimal_digits(prepared) {
                if actual_total > total {
                    return self.facet_violation(
                        kind,
                        name,
                        value,
                        FacetRestriction::TotalDigits(total),
                        position,
                    );
                }
                if let Some(fraction) = facets.fraction_digits {
                    if actual_fraction > fraction {
                        return self.facet_violation(
                            kind,
                            name,
                            value,
                            FacetRestriction::FractionDigits(fraction),
                            position,
                        );
                    }
                }
            }
        }
        if !facets.values.is_empty() && !facets.values.contains(&parsed) {
            return self.facet_violation(
                kind,
                name,
                value,
                FacetRestriction::Enumeration(self.enumeration.clone()),
                position,
            );
        }
        None
    }

    fn check_calendar(
        &self,
        facets: &CalendarFacets,
        prepared: &str,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        let parsed = XsdDate::parse(prepared, facets.kind)?;
        if let Some(bound) = &facets.max_inclusive {
            if parsed > bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MaxInclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.max_exclusive {
            if parsed >= bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MaxExclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.min_inclusive {
            if parsed < bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MinInclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if let Some(bound) = &facets.min_exclusive {
            if parsed <= bound.value {
                return self.facet_violation(
                    kind,
                    name,
                    value,
                    FacetRestriction::MinExclusive(bound.raw.clone()),
                    position,
                );
            }
        }
        if !facets.values.is_empty() && !facets.values.contains(&parsed) {
            return self.facet_violation(
                kind,
                name,
                value,
                FacetRestriction::Enumeration(self.enumeration.clone()),
                position,
            );
        }
        None
    }

    fn check_text(
        &self,
        values: &HashSet<String>,
        prepared: &str,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        let char_count = prepared.chars().count();
        if let Some(length) = self.length {
            if prepared.is_empty() {
                return Some(SchemaDiagnostic::new(
                    position,
                    DiagnosticKind::EmptyValue {
                        kind,
                        name: name.to_string(),
                    },
                ));
            }
            if char_count != length {
                return Some(SchemaDiagnostic::new(
                    position,
                    DiagnosticKind::LengthViolation {
                        kind,
                        name: name.to_string(),
                        value: value.to_string(),
                        length,
                    },
                ));
            }
        }
        if let Some(max_length) = self.max_length {
            if char_count > max_length {
                return Some(SchemaDiagnostic::new(
                    position,
                    DiagnosticKind::MaxLengthViolation {
                        kind,
                        name: name.to_string(),
                        value: value.to_string(),
                        max_length,
                    },
                ));
            }
        }
        if let Some(min_length) = self.min_length {
            if min_length > 0 && prepared.is_empty() {
                return Some(SchemaDiagnostic::new(
                    position,
                    DiagnosticKind::EmptyValue {
                        kind,
                        name: name.to_string(),
                    },
                ));
            }
            if !prepared.is_empty() && char_count < min_length {
                return Some(SchemaDiagnostic::new(
                    position,
                    DiagnosticKind::MinLengthViolation {
                        kind,
                        name: name.to_string(),
                        value: value.to_string(),
                        min_length,
                    },
                ));
            }
        }
        if !values.is_empty() && !values.contains(prepared) {
            return self.facet_violation(
                kind,
                name,
                value,
                FacetRestriction::Enumeration(self.enumeration.clone()),
                position,
            );
        }
        None
    }
}

impl SimpleTypeExecutor for RestrictedExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(base) = &self.base {
            if let Some(diagnostic) = base.execute(value, kind, name, position) {
                return Some(diagnostic);
            }
        }
        let prepared = self.white_space.normalize(value);
        if !self.patterns.is_empty() && !self.patterns.iter().any(|r| r.is_match(&prepared)) {
            return self.facet_violation(
                kind,
                name,
                value,
                FacetRestriction::Pattern(self.pattern_description.clone()),
                position,
            );
        }
        match &self.domain {
            FacetDomain::Number(facets) => {
                self.check_number(facets, &prepared, value, kind, name, position)
            }
            FacetDomain::Calendar(facets) => {
                self.check_calendar(facets, &prepared, value, kind, name, position)
            }
            FacetDomain::Text { values } => {
                self.check_text(values, &prepared, value, kind, name, position)
            }
        }
    }
}

enum DomainKind {
    Text,
    Number,
    Calendar(DateKind),
}

fn domain_of(atomic_name: &str) -> DomainKind {
    match atomic_name {
        "integer" | "int" | "decimal" => DomainKind::Number,
        "date" => DomainKind::Calendar(DateKind::Date),
        "gYear" => DomainKind::Calendar(DateKind::GYear),
        "gMonth" => DomainKind::Calendar(DateKind::GMonth),
        _ => DomainKind::Text,
    }
}

fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| Error::InvalidRestriction(format!("unable to parse a decimal from '{}'", value)))
}

fn decimal_bound(raw: Option<&str>) -> Result<Option<Bound<Decimal>>> {
    raw.filter(|raw| !raw.is_empty())
        .map(|raw| {
            Ok(Bound {
                value: parse_decimal(raw)?,
                raw: raw.to_string(),
            })
        })
        .transpose()
}

fn date_bound(raw: Option<&str>, kind: DateKind) -> Result<Option<Bound<XsdDate>>> {
    raw.filter(|raw| !raw.is_empty())
        .map(|raw| {
            let value = XsdDate::parse(raw, kind).ok_or_else(|| {
                Error::InvalidRestriction(format!(
                    "unable to parse a {} from '{}'",
                    kind.type_name(),
                    raw
                ))
            })?;
            Ok(Bound {
                value,
                raw: raw.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::{XS_DATE, XS_INT, XS_STRING};
    use crate::schema::Restriction;
    use crate::executors::ExecutorFactory;

    fn build_executor(base: &Arc<SimpleType>, restriction: Restriction) -> Arc<dyn SimpleTypeExecutor> {
        let ty = Arc::new(SimpleType::derived(
            "derived",
            Some(Arc::clone(base)),
            restriction,
        ));
        ExecutorFactory::new().build(&ty).unwrap()
    }

    fn run(executor: &Arc<dyn SimpleTypeExecutor>, value: &str) -> Option<SchemaDiagnostic> {
        executor.execute(value, NodeKind::Element, "field", Position::default())
    }

    #[test]
    fn test_base_failure_short_circuits() {
        let executor = build_executor(
            &XS_INT,
            Restriction {
                max_inclusive: Some("100".to_string()),
                ..Restriction::default()
            },
        );
        // The base 'int' executor rejects the syntax; the bound facet is
        // never consulted
        let diagnostic = run(&executor, "12x").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_numeric_bounds() {
        let executor = build_executor(
            &XS_INT,
            Restriction {
                min_inclusive: Some("10".to_string()),
                max_exclusive: Some("20".to_string()),
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "10").is_none());
        assert!(run(&executor, "19").is_none());
        assert!(matches!(
            run(&executor, "9").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::MinInclusive(_),
                ..
            }
        ));
        assert!(matches!(
            run(&executor, "20").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::MaxExclusive(_),
                ..
            }
        ));
    }

    #[test]
    fn test_digit_facets() {
        let executor = build_executor(
            &crate::schema::builtins::XS_DECIMAL,
            Restriction {
                total_digits: Some(4),
                fraction_digits: Some(2),
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "12.34").is_none());
        assert!(run(&executor, "0012.3400").is_none());
        assert!(matches!(
            run(&executor, "12345").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::TotalDigits(4),
                ..
            }
        ));
        assert!(matches!(
            run(&executor, "1.234").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::FractionDigits(2),
                ..
            }
        ));
    }

    #[test]
    fn test_string_length_and_enumeration() {
        let executor = build_executor(
            &XS_STRING,
            Restriction {
                min_length: Some(2),
                max_length: Some(3),
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "ab").is_none());
        assert!(matches!(
            run(&executor, "a").unwrap().kind,
            DiagnosticKind::MinLengthViolation { min_length: 2, .. }
        ));
        assert!(matches!(
            run(&executor, "abcd").unwrap().kind,
            DiagnosticKind::MaxLengthViolation { max_length: 3, .. }
        ));
        assert!(matches!(
            run(&executor, "").unwrap().kind,
            DiagnosticKind::EmptyValue { .. }
        ));

        let executor = build_executor(
            &XS_STRING,
            Restriction {
                values: vec!["red".to_string(), "green".to_string()],
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "red").is_none());
        assert!(matches!(
            run(&executor, "blue").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::Enumeration(_),
                ..
            }
        ));
    }

    #[test]
    fn test_pattern_facet() {
        let executor = build_executor(
            &XS_STRING,
            Restriction {
                patterns: vec!["[0-9]{3}".to_string(), "[0-9]{5}".to_string()],
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "123").is_none());
        assert!(run(&executor, "12345").is_none());
        assert!(matches!(
            run(&executor, "1234").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::Pattern(_),
                ..
            }
        ));
    }

    #[test]
    fn test_date_bounds() {
        let executor = build_executor(
            &XS_DATE,
            Restriction {
                min_inclusive: Some("2020-01-01".to_string()),
                max_inclusive: Some("2020-12-31".to_string()),
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "2020-06-15").is_none());
        assert!(matches!(
            run(&executor, "2021-01-01").unwrap().kind,
            DiagnosticKind::FacetViolation {
                facet: FacetRestriction::MaxInclusive(_),
                ..
            }
        ));
    }

    #[test]
    fn test_whitespace_collapse_before_facets() {
        let executor = build_executor(
            &XS_STRING,
            Restriction {
                values: vec!["ok".to_string()],
                white_space: WhiteSpace::Collapse,
                ..Restriction::default()
            },
        );
        assert!(run(&executor, "  ok  ").is_none());
    }

    #[test]
    fn test_invalid_bound_is_fatal() {
        let ty = Arc::new(SimpleType::derived(
            "broken",
            Some(Arc::clone(&XS_INT)),
            Restriction {
                max_inclusive: Some("ten".to_string()),
                ..Restriction::default()
            },
        ));
        assert!(matches!(
            ExecutorFactory::new().build(&ty),
            Err(Error::InvalidRestriction(_))
        ));
    }
}
