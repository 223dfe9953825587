//! Built-in simple types
//!
//! The built-in types are shared singletons: attribute and text
//! declarations referencing `xs:string` all point at the same instance, and
//! the executor layer recognizes builtins by pointer identity.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::types::SimpleType;

/// xs:string
pub static XS_STRING: Lazy<Arc<SimpleType>> = Lazy::new(|| Arc::new(SimpleType::builtin("string")));
/// xs:integer
pub static XS_INTEGER: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("integer")));
/// xs:int
pub static XS_INT: Lazy<Arc<SimpleType>> = Lazy::new(|| Arc::new(SimpleType::builtin("int")));
/// xs:decimal
pub static XS_DECIMAL: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("decimal")));
/// xs:boolean
pub static XS_BOOLEAN: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("boolean")));
/// xs:date
pub static XS_DATE: Lazy<Arc<SimpleType>> = Lazy::new(|| Arc::new(SimpleType::builtin("date")));
/// xs:gYear
pub static XS_G_YEAR: Lazy<Arc<SimpleType>> = Lazy::new(|| Arc::new(SimpleType::builtin("gYear")));
/// xs:gMonth
pub static XS_G_MONTH: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("gMonth")));
/// xs:anyURI
pub static XS_ANY_URI: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("anyURI")));
/// xs:base64Binary
pub static XS_BASE64_BINARY: Lazy<Arc<SimpleType>> =
    Lazy::new(|| Arc::new(SimpleType::builtin("base64Binary")));

/// Look up a built-in simple type by its local name.
///
/// `anyType` is not returned here: it maps to "no type" in the type tree
/// and is handled by the schema parser directly.
pub fn builtin_simple_type(local_name: &str) -> Option<&'static Arc<SimpleType>> {
    match local_name {
        "string" => Some(&XS_STRING),
        "integer" => Some(&XS_INTEGER),
        "int" => Some(&XS_INT),
        "decimal" => Some(&XS_DECIMAL),
        "boolean" => Some(&XS_BOOLEAN),
        "date" => Some(&XS_DATE),
        "gYear" => Some(&XS_G_YEAR),
        "gMonth" => Some(&XS_G_MONTH),
        "anyURI" => Some(&XS_ANY_URI),
        "base64Binary" => Some(&XS_BASE64_BINARY),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_shared() {
        let first = builtin_simple_type("string").unwrap();
        let second = builtin_simple_type("string").unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(first.name, "string");
        assert!(first.base.is_none());
        assert!(first.restriction.is_none());
    }

    #[test]
    fn test_unknown_builtin() {
        assert!(builtin_simple_type("float").is_none());
        assert!(builtin_simple_type("anyType").is_none());
    }
}
