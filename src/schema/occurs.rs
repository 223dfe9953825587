//! Occurrence bounds for content-model items
//!
//! Every element, sequence and choice item carries `minOccurs`/`maxOccurs`
//! bounds. `None` for the maximum means `unbounded`.

use crate::error::{Error, Result};

/// Occurrence bounds (minOccurs, maxOccurs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create occurrence bounds, rejecting `min > max`
    pub fn new(min: u32, max: Option<u32>) -> Result<Self> {
        if let Some(max) = max {
            if min > max {
                return Err(Error::MalformedOccurs { min, max });
            }
        }
        Ok(Self { min, max })
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this item may be absent (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this item occurs at most once (maxOccurs == 1)
    pub fn is_single(&self) -> bool {
        self.max == Some(1)
    }

    /// Check if the bounds require a runtime counter: loops with a plain
    /// repetition edge cannot by themselves enforce `min > 1` or a finite
    /// `max > 1`
    pub fn needs_counter(&self) -> bool {
        self.min > 1 || self.max.map_or(false, |max| max > 1)
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let min = match min_occurs {
        None => 1,
        Some(s) => s.trim().parse::<u32>().map_err(|_| {
            Error::SchemaParse(format!(
                "minOccurs must be a non-negative integer but was '{}'",
                s
            ))
        })?,
    };
    let max = match max_occurs {
        None => Some(1),
        Some("unbounded") => None,
        Some(s) => Some(s.trim().parse::<u32>().map_err(|_| {
            Error::SchemaParse(format!(
                "maxOccurs must be a non-negative integer or 'unbounded' but was '{}'",
                s
            ))
        })?),
    };
    Occurs::new(min, max)
}
