//! XSD pattern facets
//!
//! XSD regular expressions differ from the host dialect in two ways that
//! matter here: they are implicitly anchored, and they define XML-specific
//! character-class escapes (`\i`/`\c` for name start/name characters,
//! `\w` over the XML character set). [`compile_pattern`] rewrites those
//! escapes, anchors the pattern, compiles it once and caches the result by
//! pattern text. The cache is never evicted: the set of distinct patterns
//! is bounded by the schemas in use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static PATTERNS: Lazy<RwLock<HashMap<String, Arc<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// XML 1.0 NameStartChar, as a regex character-class body
const NAME_START: &str = ":A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\
\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\
\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}\
\u{10000}-\u{EFFFF}";

// The NameChar additions over NameStartChar
const NAME_EXTRA: &str = "\\-.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}";

/// Compile an XSD pattern, reusing a previously compiled instance when the
/// same pattern text was seen before.
pub fn compile_pattern(pattern: &str) -> Result<Arc<Regex>> {
    if let Some(regex) = PATTERNS.read().expect("pattern cache poisoned").get(pattern) {
        return Ok(Arc::clone(regex));
    }
    let translated = translate(pattern);
    let regex = Regex::new(&translated).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut cache = PATTERNS.write().expect("pattern cache poisoned");
    let entry = cache
        .entry(pattern.to_string())
        .or_insert_with(|| Arc::new(regex));
    Ok(Arc::clone(entry))
}

/// Rewrite XML character-class escapes and anchor the pattern.
fn translate(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len() + 8);
    result.push_str("^(?:");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('i') => class(&mut result, false, NAME_START, ""),
            Some('I') => class(&mut result, true, NAME_START, ""),
            Some('c') => class(&mut result, false, NAME_START, NAME_EXTRA),
            Some('C') => class(&mut result, true, NAME_START, NAME_EXTRA),
            // XSD \w is "everything except punctuation, separators and
            // control characters"; the host \w is narrower
            Some('w') => result.push_str(r"[^\p{P}\p{Z}\p{C}]"),
            Some('W') => result.push_str(r"[\p{P}\p{Z}\p{C}]"),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result.push_str(")$");
    result
}

fn class(out: &mut String, negated: bool, body: &str, extra: &str) {
    out.push('[');
    if negated {
        out.push('^');
    }
    out.push_str(body);
    out.push_str(extra);
    out.push(']');
}
