//! The schema type tree
//!
//! These types are what the schema-document parser produces and what the
//! automaton compiler consumes: complex types with sequence/choice/element
//! content and attribute declarations, and simple types forming a
//! restriction-derivation chain down to a built-in atomic type.

use std::sync::Arc;

use super::occurs::Occurs;
use super::restriction::Restriction;

/// A simple or complex schema type
#[derive(Debug, Clone)]
pub enum SchemaType {
    /// A simple type: text content restricted by a derivation chain
    Simple(Arc<SimpleType>),
    /// A complex type: child elements and attributes
    Complex(Arc<ComplexType>),
}

impl SchemaType {
    /// The declared name of the type
    pub fn name(&self) -> &str {
        match self {
            SchemaType::Simple(simple) => &simple.name,
            SchemaType::Complex(complex) => &complex.name,
        }
    }
}

/// A simple type with an optional base type and an optional restriction.
///
/// Built-in types have neither; every user-declared simple type restricts
/// either a built-in or another user-declared simple type.
#[derive(Debug)]
pub struct SimpleType {
    /// The declared type name ("anonymousType" for inline declarations)
    pub name: String,
    /// The restricted base type
    pub base: Option<Arc<SimpleType>>,
    /// The constraining facets, if any
    pub restriction: Option<Restriction>,
    /// Documentation text from the schema annotation
    pub description: Vec<String>,
}

impl SimpleType {
    /// Create a built-in type: no base, no restriction
    pub fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base: None,
            restriction: None,
            description: Vec::new(),
        }
    }

    /// Create a derived type
    pub fn derived(
        name: impl Into<String>,
        base: Option<Arc<SimpleType>>,
        restriction: Restriction,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            restriction: Some(restriction),
            description: Vec::new(),
        }
    }

    /// Walk the derivation chain to the type it bottoms out at.
    ///
    /// For well-formed schemas this is one of the built-in types; the
    /// atomic base decides the comparison domain (string, number or date)
    /// of bound and enumeration facets.
    pub fn atomic_base(&self) -> &SimpleType {
        let mut current = self;
        while let Some(base) = &current.base {
            current = base;
        }
        current
    }
}

/// A complex type: a base type (for `simpleContent`/`complexContent`
/// derivation), content-model children and attribute declarations.
#[derive(Debug)]
pub struct ComplexType {
    /// The declared type name
    pub name: String,
    /// The extended base type, if any
    pub base: Option<SchemaType>,
    /// Content-model children, in declaration order
    pub children: Vec<ContentItem>,
    /// Attribute declarations, in declaration order
    pub attributes: Vec<AttributeDecl>,
    /// Documentation text from the schema annotation
    pub description: Vec<String>,
}

/// An attribute declaration on a complex type
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// The attribute name
    pub name: String,
    /// The attribute's simple type; `None` leaves the value unchecked
    pub ty: Option<Arc<SimpleType>>,
    /// Whether the attribute must be present (`use="required"`)
    pub required: bool,
    /// A fixed value, if declared
    pub fixed: Option<String>,
}

/// One item of a complex type's content model
#[derive(Debug, Clone)]
pub enum ContentItem {
    /// A named child element
    Element(ElementItem),
    /// An ordered group
    Sequence(GroupItem),
    /// An alternative group
    Choice(GroupItem),
}

impl ContentItem {
    /// The item's occurrence bounds
    pub fn occurs(&self) -> Occurs {
        match self {
            ContentItem::Element(element) => element.occurs,
            ContentItem::Sequence(group) | ContentItem::Choice(group) => group.occurs,
        }
    }

    /// Whether this item can match the empty event sequence
    pub fn is_emptiable(&self) -> bool {
        if self.occurs().is_emptiable() {
            return true;
        }
        match self {
            ContentItem::Element(_) => false,
            ContentItem::Sequence(group) => group.items.iter().all(ContentItem::is_emptiable),
            ContentItem::Choice(group) => {
                group.items.is_empty() || group.items.iter().any(ContentItem::is_emptiable)
            }
        }
    }
}

/// A named element inside a content model
#[derive(Debug, Clone)]
pub struct ElementItem {
    /// The element name
    pub name: String,
    /// The element's type; `None` means any content is accepted
    pub ty: Option<SchemaType>,
    /// Occurrence bounds
    pub occurs: Occurs,
    /// A fixed value, if declared
    pub fixed: Option<String>,
}

/// A sequence or choice group inside a content model
#[derive(Debug, Clone)]
pub struct GroupItem {
    /// The group's items, in declaration order
    pub items: Vec<ContentItem>,
    /// Occurrence bounds
    pub occurs: Occurs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, occurs: Occurs) -> ContentItem {
        ContentItem::Element(ElementItem {
            name: name.to_string(),
            ty: None,
            occurs,
            fixed: None,
        })
    }

    #[test]
    fn test_atomic_base() {
        let root = Arc::new(SimpleType::builtin("string"));
        let mid = Arc::new(SimpleType::derived(
            "code",
            Some(Arc::clone(&root)),
            Restriction::default(),
        ));
        let leaf = Arc::new(SimpleType::derived(
            "shortCode",
            Some(Arc::clone(&mid)),
            Restriction::default(),
        ));
        assert!(std::ptr::eq(leaf.atomic_base(), root.as_ref()));
        assert!(std::ptr::eq(root.atomic_base(), root.as_ref()));
    }

    #[test]
    fn test_is_emptiable() {
        assert!(!element("a", Occurs::once()).is_emptiable());
        assert!(element("a", Occurs::optional()).is_emptiable());

        let sequence = ContentItem::Sequence(GroupItem {
            items: vec![
                element("a", Occurs::optional()),
                element("b", Occurs::optional()),
            ],
            occurs: Occurs::once(),
        });
        assert!(sequence.is_emptiable());

        let sequence = ContentItem::Sequence(GroupItem {
            items: vec![element("a", Occurs::optional()), element("b", Occurs::once())],
            occurs: Occurs::once(),
        });
        assert!(!sequence.is_emptiable());

        let choice = ContentItem::Choice(GroupItem {
            items: vec![element("a", Occurs::once()), element("b", Occurs::optional())],
            occurs: Occurs::once(),
        });
        assert!(choice.is_emptiable());
    }
}
