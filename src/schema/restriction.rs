//! Simple-type restrictions
//!
//! A [`Restriction`] collects the constraining facets declared on a derived
//! simple type. The facets are stored as written in the schema; the
//! executor layer parses bound values into their comparison domain
//! (decimal, date) when the automaton is compiled.

use crate::error::{Error, Result};

/// White space handling modes for the `whiteSpace` facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpace {
    /// Preserve all white space
    #[default]
    Preserve,
    /// Replace tabs, carriage returns and newlines with spaces
    Replace,
    /// Replace, then trim and collapse runs of spaces
    Collapse,
}

impl WhiteSpace {
    /// Parse from the facet's attribute value
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "preserve" => Ok(WhiteSpace::Preserve),
            "replace" => Ok(WhiteSpace::Replace),
            "collapse" => Ok(WhiteSpace::Collapse),
            _ => Err(Error::InvalidRestriction(format!(
                "invalid whiteSpace facet value: '{}'",
                s
            ))),
        }
    }

    /// Normalize a string according to this white space mode
    pub fn normalize(&self, s: &str) -> String {
        match self {
            WhiteSpace::Preserve => s.to_string(),
            WhiteSpace::Replace => replace_whitespace(s),
            WhiteSpace::Collapse => collapse_whitespace(s),
        }
    }
}

/// Replace tabs, carriage returns and newlines with single spaces,
/// preserving the length of the string.
pub fn replace_whitespace(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// Replace whitespace, then trim the ends and collapse interior runs of
/// spaces to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = true; // leading spaces are dropped
    for c in s.chars() {
        if matches!(c, ' ' | '\t' | '\n' | '\r') {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }
    if result.ends_with(' ') {
        result.pop();
    }
    result
}

/// The constraining facets of a simple-type restriction.
///
/// Numeric and date bounds are kept as the literal strings from the schema;
/// which domain they are parsed into depends on the atomic base type of the
/// restricted type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Restriction {
    /// Exact length
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Pattern facets; a value must match at least one
    pub patterns: Vec<String>,
    /// Human-readable description used in pattern diagnostics
    pub pattern_description: Option<String>,
    /// Enumeration values
    pub values: Vec<String>,
    /// Inclusive upper bound
    pub max_inclusive: Option<String>,
    /// Exclusive upper bound
    pub max_exclusive: Option<String>,
    /// Inclusive lower bound
    pub min_inclusive: Option<String>,
    /// Exclusive lower bound
    pub min_exclusive: Option<String>,
    /// Maximum number of significant digits
    pub total_digits: Option<u32>,
    /// Maximum number of fraction digits
    pub fraction_digits: Option<u32>,
    /// White space normalization applied before the other facets
    pub white_space: WhiteSpace,
}

impl Restriction {
    /// Validate facet combinations that can only be checked once the whole
    /// restriction is assembled.
    pub fn check(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(Error::InvalidRestriction(
                    "the value of the 'minLength' facet cannot be greater than \
                     the value of the 'maxLength' facet"
                        .to_string(),
                ));
            }
        }
        if self.length.is_some() && (self.min_length.is_some() || self.max_length.is_some()) {
            return Err(Error::InvalidRestriction(
                "the 'length' facet cannot be used together with 'minLength' or 'maxLength'"
                    .to_string(),
            ));
        }
        if self.fraction_digits.is_some() && self.total_digits.is_none() {
            return Err(Error::InvalidRestriction(
                "the 'totalDigits' facet must be specified along with the \
                 'fractionDigits' facet"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
