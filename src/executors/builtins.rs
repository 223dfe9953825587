//! Executors for the built-in simple types
//!
//! Each built-in type gets one shared executor instance. The derivation
//! chain of the builtins themselves is fixed: every non-string builtin
//! chains to the string executor, `int` chains through `integer`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use once_cell::sync::Lazy;
use url::Url;

use crate::diagnostics::{DiagnosticKind, NodeKind, Position, SchemaDiagnostic};

use super::datetime::{DateKind, XsdDate};
use super::SimpleTypeExecutor;

static STRING: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| Arc::new(StringExecutor));
static INTEGER: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(IntegerExecutor {
        base: Arc::clone(&STRING),
    })
});
static INT: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(IntExecutor {
        base: Arc::clone(&INTEGER),
    })
});
static DECIMAL: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(DecimalExecutor {
        base: Arc::clone(&STRING),
    })
});
static BOOLEAN: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(BooleanExecutor {
        base: Arc::clone(&STRING),
    })
});
static DATE: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| calendar(DateKind::Date));
static G_YEAR: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| calendar(DateKind::GYear));
static G_MONTH: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| calendar(DateKind::GMonth));
static ANY_URI: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(AnyUriExecutor {
        base: Arc::clone(&STRING),
    })
});
static BASE64_BINARY: Lazy<Arc<dyn SimpleTypeExecutor>> = Lazy::new(|| {
    Arc::new(Base64BinaryExecutor {
        base: Arc::clone(&STRING),
    })
});

fn calendar(kind: DateKind) -> Arc<dyn SimpleTypeExecutor> {
    Arc::new(CalendarExecutor {
        base: Arc::clone(&STRING),
        kind,
    })
}

/// The shared executor for a built-in type, by type name
pub(crate) fn builtin_executor(name: &str) -> Option<Arc<dyn SimpleTypeExecutor>> {
    let executor = match name {
        "string" => &STRING,
        "integer" => &INTEGER,
        "int" => &INT,
        "decimal" => &DECIMAL,
        "boolean" => &BOOLEAN,
        "date" => &DATE,
        "gYear" => &G_YEAR,
        "gMonth" => &G_MONTH,
        "anyURI" => &ANY_URI,
        "base64Binary" => &BASE64_BINARY,
        _ => return None,
    };
    Some(Arc::clone(executor))
}

fn empty_value(kind: NodeKind, name: &str, position: Position) -> Option<SchemaDiagnostic> {
    Some(SchemaDiagnostic::new(
        position,
        DiagnosticKind::EmptyValue {
            kind,
            name: name.to_string(),
        },
    ))
}

fn invalid_value(
    kind: NodeKind,
    name: &str,
    value: &str,
    expected_type: &str,
    position: Position,
) -> Option<SchemaDiagnostic> {
    Some(SchemaDiagnostic::new(
        position,
        DiagnosticKind::InvalidValue {
            kind,
            name: name.to_string(),
            value: value.to_string(),
            expected_type: expected_type.to_string(),
        },
    ))
}

/// xs:string accepts everything
struct StringExecutor;

impl SimpleTypeExecutor for StringExecutor {
    fn execute(&self, _: &str, _: NodeKind, _: &str, _: Position) -> Option<SchemaDiagnostic> {
        None
    }
}

/// Arbitrary-width integer syntax: optional sign, at least one digit,
/// surrounding whitespace allowed
pub(crate) fn is_integer(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let digits = trimmed
        .strip_prefix(['-', '+'])
        .unwrap_or(trimmed)
        .as_bytes();
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

/// Decimal syntax check that also counts significant digits.
///
/// Returns `(total_digits, fraction_digits)` with leading integer zeros and
/// trailing fraction zeros excluded, or `None` when the value is not a
/// decimal number.
pub(crate) fn decimal_digits(value: &str) -> Option<(u32, u32)> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Some((0, 0));
    }
    let body = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    let bytes = body.as_bytes();
    if bytes.is_empty() || (!bytes[0].is_ascii_digit() && bytes[0] != b'.') {
        return None;
    }
    let has_integer_digit = bytes[0].is_ascii_digit();
    let (integer_part, fraction_part) = match body.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (body, None),
    };
    if !integer_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut total = integer_part.trim_start_matches('0').len() as u32;
    match fraction_part {
        None => has_integer_digit.then_some((total, 0)),
        Some(fraction) => {
            if !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let significant = fraction.trim_end_matches('0');
            if fraction.is_empty() || significant.is_empty() {
                // "5." and "5.000" carry no fraction digits
                return has_integer_digit.then_some((total, 0));
            }
            let fraction_digits = significant.len() as u32;
            total += fraction_digits;
            Some((total, fraction_digits))
        }
    }
}

struct IntegerExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for IntegerExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.trim().is_empty() {
            return empty_value(kind, name, position);
        }
        if !is_integer(value) {
            return invalid_value(kind, name, value, "integer", position);
        }
        None
    }
}

struct IntExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for IntExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.trim().is_empty() {
            return empty_value(kind, name, position);
        }
        if value.trim().parse::<i32>().is_err() {
            return invalid_value(kind, name, value, "32-bit integer", position);
        }
        None
    }
}

struct DecimalExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for DecimalExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.trim().is_empty() {
            return empty_value(kind, name, position);
        }
        if decimal_digits(value).is_none() {
            return invalid_value(kind, name, value, "decimal number", position);
        }
        None
    }
}

struct BooleanExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for BooleanExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.is_empty() {
            return empty_value(kind, name, position);
        }
        if !matches!(value, "1" | "0" | "true" | "false") {
            return invalid_value(kind, name, value, "boolean", position);
        }
        None
    }
}

struct CalendarExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
    kind: DateKind,
}

impl SimpleTypeExecutor for CalendarExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.is_empty() {
            return empty_value(kind, name, position);
        }
        if XsdDate::parse(value, self.kind).is_none() {
            return invalid_value(kind, name, value, self.kind.type_name(), position);
        }
        None
    }
}

struct AnyUriExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for AnyUriExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.is_empty() {
            return empty_value(kind, name, position);
        }
        // Relative references are acceptable anyURI values
        match Url::parse(value) {
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => None,
            Err(_) => invalid_value(kind, name, value, "URI", position),
        }
    }
}

struct Base64BinaryExecutor {
    base: Arc<dyn SimpleTypeExecutor>,
}

impl SimpleTypeExecutor for Base64BinaryExecutor {
    fn execute(
        &self,
        value: &str,
        kind: NodeKind,
        name: &str,
        position: Position,
    ) -> Option<SchemaDiagnostic> {
        if let Some(diagnostic) = self.base.execute(value, kind, name, position) {
            return Some(diagnostic);
        }
        if value.is_empty() {
            return empty_value(kind, name, position);
        }
        // The lexical space allows whitespace between the encoded groups
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        if BASE64.decode(compact.as_bytes()).is_err() {
            return invalid_value(kind, name, value, "base64 binary", position);
        }
        None
    }
}
