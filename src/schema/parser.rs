//! XSD schema-document parser
//!
//! Turns XSD markup into the [type tree](super::types) consumed by the
//! automaton compiler. Top-level element, type and attribute-group
//! declarations may reference each other in any order; definitions are
//! parsed lazily on first reference and memoized.
//!
//! Supported: named and anonymous complex/simple types, `sequence` and
//! `choice` groups with occurrence bounds, `simpleContent` and
//! `complexContent` derivation by `extension`, attribute declarations and
//! `attributeGroup` references, all restriction facets of
//! [`Restriction`](super::restriction::Restriction), element references.
//! `xs:all` groups, `mixed` content and list/union simple types are
//! rejected as unsupported.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use roxmltree::Node;

use crate::error::{Error, Result};
use crate::XSD_NAMESPACE;

use super::builtins::builtin_simple_type;
use super::occurs::parse_occurs;
use super::restriction::{Restriction, WhiteSpace};
use super::types::{
    AttributeDecl, ComplexType, ContentItem, ElementItem, GroupItem, SchemaType, SimpleType,
};

/// Name given to inline type declarations
const ANONYMOUS: &str = "anonymousType";

/// Parse an XSD document into a synthetic root complex type whose children
/// are the schema's top-level element declarations.
pub fn parse_schema(text: &str) -> Result<Arc<ComplexType>> {
    let doc = roxmltree::Document::parse(text).map_err(|e| Error::SchemaParse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(XSD_NAMESPACE) {
        return Err(Error::SchemaParse(format!(
            "expected an '{{{}}}schema' root element but found '{}'",
            XSD_NAMESPACE,
            root.tag_name().name()
        )));
    }

    let mut context = Context::default();
    for child in schema_children(root) {
        match child.tag_name().name() {
            "simpleType" | "complexType" => context.declare(Registry::Types, &child)?,
            "element" => context.declare(Registry::Elements, &child)?,
            "attributeGroup" => context.declare(Registry::AttributeGroups, &child)?,
            _ => {}
        }
    }

    let mut children = Vec::new();
    let mut attributes = Vec::new();
    for child in schema_children(root) {
        match child.tag_name().name() {
            "attribute" => {
                if let Some(attribute) = parse_attribute(child, &mut context)? {
                    attributes.push(attribute);
                }
            }
            "attributeGroup" => {
                attributes.extend(context.attribute_group(&name_attr(child)?)?);
            }
            "simpleType" | "complexType" => {
                // Force the definition so unused declarations are still checked
                context.type_definition(&name_attr(child)?)?;
            }
            "element" => children.push(ContentItem::Element(context.element(&name_attr(child)?)?)),
            other => {
                return Err(Error::SchemaParse(format!(
                    "unexpected top-level schema element '{}'",
                    other
                )))
            }
        }
    }

    Ok(Arc::new(ComplexType {
        name: "schema".to_string(),
        base: None,
        children,
        attributes,
        description: parse_annotation(root),
    }))
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Registry {
    Types,
    Elements,
    AttributeGroups,
}

/// Declared-but-unparsed nodes plus memoized definitions.
#[derive(Default)]
struct Context<'a, 'input> {
    declared: HashMap<(Registry, String), Node<'a, 'input>>,
    parsed_types: HashMap<String, Option<SchemaType>>,
    parsed_elements: HashMap<String, ElementItem>,
    parsed_attribute_groups: HashMap<String, Vec<AttributeDecl>>,
    in_progress: HashSet<String>,
}

impl<'a, 'input> Context<'a, 'input> {
    fn declare(&mut self, registry: Registry, node: &Node<'a, 'input>) -> Result<()> {
        let name = name_attr(*node)?;
        if self
            .declared
            .insert((registry, name.clone()), *node)
            .is_some()
        {
            return Err(Error::SchemaParse(format!(
                "'{}' is already declared",
                name
            )));
        }
        Ok(())
    }

    /// Resolve a type reference by its declared name. `None` means
    /// `anyType`.
    fn type_definition(&mut self, name: &str) -> Result<Option<SchemaType>> {
        if let Some(parsed) = self.parsed_types.get(name) {
            return Ok(parsed.clone());
        }
        let node = *self
            .declared
            .get(&(Registry::Types, name.to_string()))
            .ok_or_else(|| Error::SchemaParse(format!("type '{}' is not declared", name)))?;
        if !self.in_progress.insert(name.to_string()) {
            return Err(Error::SchemaParse(format!(
                "cyclic reference while resolving type '{}'",
                name
            )));
        }
        let parsed = match node.tag_name().name() {
            "simpleType" => Some(SchemaType::Simple(parse_simple_type(node, name, self)?)),
            _ => Some(parse_complex_type(node, name, self)?),
        };
        self.in_progress.remove(name);
        self.parsed_types.insert(name.to_string(), parsed.clone());
        Ok(parsed)
    }

    fn element(&mut self, name: &str) -> Result<ElementItem> {
        if let Some(parsed) = self.parsed_elements.get(name) {
            return Ok(parsed.clone());
        }
        let node = *self
            .declared
            .get(&(Registry::Elements, name.to_string()))
            .ok_or_else(|| Error::SchemaParse(format!("element '{}' is not declared", name)))?;
        let parsed = parse_element_item(node, self)?;
        self.parsed_elements.insert(name.to_string(), parsed.clone());
        Ok(parsed)
    }

    fn attribute_group(&mut self, name: &str) -> Result<Vec<AttributeDecl>> {
        if let Some(parsed) = self.parsed_attribute_groups.get(name) {
            return Ok(parsed.clone());
        }
        let node = *self
            .declared
            .get(&(Registry::AttributeGroups, name.to_string()))
            .ok_or_else(|| {
                Error::SchemaParse(format!("attribute group '{}' is not declared", name))
            })?;
        let parsed = parse_attribute_list(node, self)?;
        self.parsed_attribute_groups
            .insert(name.to_string(), parsed.clone());
        Ok(parsed)
    }
}

/// Resolve a possibly prefixed type reference from an attribute value.
fn resolve_type_reference<'a, 'input>(
    node: Node<'a, 'input>,
    reference: &str,
    context: &mut Context<'a, 'input>,
) -> Result<Option<SchemaType>> {
    let (prefix, local) = match reference.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, reference),
    };
    if node.lookup_namespace_uri(prefix) == Some(XSD_NAMESPACE) {
        if local == "anyType" {
            return Ok(None);
        }
        return builtin_simple_type(local)
            .map(|ty| Some(SchemaType::Simple(Arc::clone(ty))))
            .ok_or_else(|| {
                Error::SchemaParse(format!("built-in type '{}' is not supported", local))
            });
    }
    context.type_definition(local)
}

fn parse_complex_type<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &mut Context<'a, 'input>,
) -> Result<SchemaType> {
    if matches!(node.attribute("mixed"), Some("true") | Some("1")) {
        return Err(Error::UnsupportedConstruct("mixed content".to_string()));
    }
    let base = match node.attribute("base") {
        Some(reference) => resolve_type_reference(node, reference, context)?,
        None => None,
    };
    let children_nodes = schema_children(node).collect::<Vec<_>>();
    if let [only] = children_nodes.as_slice() {
        match only.tag_name().name() {
            "simpleContent" => return parse_simple_content(*only, name, context),
            "complexContent" => return parse_complex_content(*only, name, context),
            _ => {}
        }
    }
    let mut children = Vec::new();
    let mut attributes = Vec::new();
    for child in children_nodes {
        match child.tag_name().name() {
            "attribute" => {
                if let Some(attribute) = parse_attribute(child, context)? {
                    attributes.push(attribute);
                }
            }
            "attributeGroup" => {
                attributes.extend(context.attribute_group(&ref_attr(child)?)?);
            }
            _ => children.push(parse_content_item(child, context)?),
        }
    }
    Ok(SchemaType::Complex(Arc::new(ComplexType {
        name: name.to_string(),
        base,
        children,
        attributes,
        description: parse_annotation(node),
    })))
}

fn parse_simple_content<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &mut Context<'a, 'input>,
) -> Result<SchemaType> {
    let child = single_schema_child(node)?;
    match child.tag_name().name() {
        "restriction" => Ok(SchemaType::Simple(parse_restriction(
            child,
            name,
            parse_annotation(node),
            context,
        )?)),
        "extension" => parse_extension(child, name, context),
        other => Err(Error::SchemaParse(format!(
            "unexpected content of 'simpleContent': '{}'; expected 'extension' or 'restriction'",
            other
        ))),
    }
}

fn parse_complex_content<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &mut Context<'a, 'input>,
) -> Result<SchemaType> {
    if matches!(node.attribute("mixed"), Some("true") | Some("1")) {
        return Err(Error::UnsupportedConstruct("mixed content".to_string()));
    }
    let child = single_schema_child(node)?;
    match child.tag_name().name() {
        "extension" => parse_complex_type(child, name, context),
        other => Err(Error::SchemaParse(format!(
            "unexpected content of 'complexContent': '{}'; expected 'extension'",
            other
        ))),
    }
}

/// A `simpleContent` extension: a base type plus attribute declarations.
fn parse_extension<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &mut Context<'a, 'input>,
) -> Result<SchemaType> {
    let base = match node.attribute("base") {
        Some(reference) => resolve_type_reference(node, reference, context)?,
        None => None,
    };
    let attributes = parse_attribute_list(node, context)?;
    Ok(SchemaType::Complex(Arc::new(ComplexType {
        name: name.to_string(),
        base,
        children: Vec::new(),
        attributes,
        description: parse_annotation(node),
    })))
}

fn parse_attribute_list<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<Vec<AttributeDecl>> {
    let mut attributes = Vec::new();
    for child in schema_children(node) {
        match child.tag_name().name() {
            "attribute" => {
                if let Some(attribute) = parse_attribute(child, context)? {
                    attributes.push(attribute);
                }
            }
            "attributeGroup" => {
                attributes.extend(context.attribute_group(&ref_attr(child)?)?);
            }
            other => {
                return Err(Error::SchemaParse(format!(
                    "unexpected content '{}'; expected 'attribute' or 'attributeGroup'",
                    other
                )))
            }
        }
    }
    Ok(attributes)
}

fn parse_content_item<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<ContentItem> {
    match node.tag_name().name() {
        "element" => Ok(ContentItem::Element(parse_element_item(node, context)?)),
        "sequence" => Ok(ContentItem::Sequence(parse_group_item(node, context)?)),
        "choice" => Ok(ContentItem::Choice(parse_group_item(node, context)?)),
        other => Err(Error::UnsupportedConstruct(format!(
            "content-model item '{}'",
            other
        ))),
    }
}

fn parse_group_item<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<GroupItem> {
    let occurs = parse_occurs(node.attribute("minOccurs"), node.attribute("maxOccurs"))?;
    let items = schema_children(node)
        .map(|child| parse_content_item(child, context))
        .collect::<Result<Vec<_>>>()?;
    Ok(GroupItem { items, occurs })
}

fn parse_element_item<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<ElementItem> {
    if let Some(name) = node.attribute("name") {
        let occurs = parse_occurs(node.attribute("minOccurs"), node.attribute("maxOccurs"))?;
        let ty = parse_type_of(node, context)?;
        return Ok(ElementItem {
            name: name.to_string(),
            ty,
            occurs,
            fixed: node.attribute("fixed").map(str::to_string),
        });
    }
    let reference = node.attribute("ref").ok_or_else(|| {
        Error::SchemaParse("either 'name' or 'ref' must be specified for an element".to_string())
    })?;
    let mut item = context.element(reference)?;
    // Local occurrence bounds override the referenced declaration's
    let occurs = parse_occurs(node.attribute("minOccurs"), node.attribute("maxOccurs"))?;
    if node.attribute("minOccurs").is_some() || node.attribute("maxOccurs").is_some() {
        item.occurs = occurs;
    }
    if let Some(fixed) = node.attribute("fixed") {
        item.fixed = Some(fixed.to_string());
    }
    Ok(item)
}

fn parse_attribute<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<Option<AttributeDecl>> {
    let name = name_attr(node)?;
    let required = match node.attribute("use") {
        None | Some("optional") => false,
        Some("required") => true,
        Some("prohibited") => return Ok(None),
        Some(other) => {
            return Err(Error::SchemaParse(format!(
                "incorrect value for attribute usage: '{}'",
                other
            )))
        }
    };
    let ty = match parse_type_of(node, context)? {
        None => None,
        Some(SchemaType::Simple(simple)) => Some(simple),
        Some(SchemaType::Complex(_)) => {
            return Err(Error::SchemaParse(format!(
                "attribute '{}' cannot be of a complex type",
                name
            )))
        }
    };
    Ok(Some(AttributeDecl {
        name,
        ty,
        required,
        fixed: node.attribute("fixed").map(str::to_string),
    }))
}

/// The type of an element or attribute declaration: either a `type`
/// reference or a single inline `complexType`/`simpleType` child.
fn parse_type_of<'a, 'input>(
    node: Node<'a, 'input>,
    context: &mut Context<'a, 'input>,
) -> Result<Option<SchemaType>> {
    if let Some(reference) = node.attribute("type") {
        return resolve_type_reference(node, reference, context);
    }
    let complex = named_schema_child(node, "complexType")?;
    let simple = named_schema_child(node, "simpleType")?;
    match (complex, simple) {
        (Some(_), Some(_)) => Err(Error::SchemaParse(format!(
            "'{}' declares both a complex and a simple inline type",
            node.tag_name().name()
        ))),
        (Some(complex), None) => Ok(Some(parse_complex_type(complex, ANONYMOUS, context)?)),
        (None, Some(simple)) => Ok(Some(SchemaType::Simple(parse_simple_type(
            simple, ANONYMOUS, context,
        )?))),
        (None, None) => Ok(None),
    }
}

fn parse_simple_type<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    context: &mut Context<'a, 'input>,
) -> Result<Arc<SimpleType>> {
    for child in schema_children(node) {
        if matches!(child.tag_name().name(), "list" | "union") {
            return Err(Error::UnsupportedConstruct(format!(
                "'{}' simple types",
                child.tag_name().name()
            )));
        }
    }
    let restriction = named_schema_child(node, "restriction")?.ok_or_else(|| {
        Error::SchemaParse("a 'restriction' element is required to declare a simple type".to_string())
    })?;
    parse_restriction(restriction, name, parse_annotation(node), context)
}

fn parse_restriction<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    description: Vec<String>,
    context: &mut Context<'a, 'input>,
) -> Result<Arc<SimpleType>> {
    let base = match node.attribute("base") {
        Some(reference) => resolve_type_reference(node, reference, context)?,
        None => match named_schema_child(node, "simpleType")? {
            Some(inline) => Some(SchemaType::Simple(parse_simple_type(
                inline, ANONYMOUS, context,
            )?)),
            None => None,
        },
    };
    let base = match base {
        None => None,
        Some(SchemaType::Simple(simple)) => Some(simple),
        Some(SchemaType::Complex(_)) => {
            return Err(Error::SchemaParse(format!(
                "simple type '{}' cannot restrict a complex type",
                name
            )))
        }
    };

    let mut restriction = Restriction::default();
    let mut seen_values = HashSet::new();
    for child in schema_children(node) {
        let facet = child.tag_name().name();
        let value = || {
            child.attribute("value").ok_or_else(|| {
                Error::SchemaParse(format!("facet '{}' requires a 'value' attribute", facet))
            })
        };
        match facet {
            "simpleType" => {}
            "enumeration" => {
                let value = value()?.to_string();
                if !seen_values.insert(value.clone()) {
                    return Err(Error::InvalidRestriction(format!(
                        "duplicate enumeration value: '{}'",
                        value
                    )));
                }
                restriction.values.push(value);
            }
            "length" => {
                set_length_facet(&mut restriction.length, facet, value()?)?;
            }
            "minLength" => {
                set_length_facet(&mut restriction.min_length, facet, value()?)?;
            }
            "maxLength" => {
                set_length_facet(&mut restriction.max_length, facet, value()?)?;
            }
            "pattern" => restriction.patterns.push(value()?.to_string()),
            "minInclusive" => {
                set_bound_facet(&mut restriction.min_inclusive, facet, value()?)?;
            }
            "minExclusive" => {
                set_bound_facet(&mut restriction.min_exclusive, facet, value()?)?;
            }
            "maxInclusive" => {
                set_bound_facet(&mut restriction.max_inclusive, facet, value()?)?;
            }
            "maxExclusive" => {
                set_bound_facet(&mut restriction.max_exclusive, facet, value()?)?;
            }
            "totalDigits" => {
                set_digits_facet(&mut restriction.total_digits, facet, value()?)?;
            }
            "fractionDigits" => {
                set_digits_facet(&mut restriction.fraction_digits, facet, value()?)?;
            }
            "whiteSpace" => restriction.white_space = WhiteSpace::parse(value()?)?,
            other => {
                return Err(Error::UnsupportedConstruct(format!("facet '{}'", other)));
            }
        }
    }
    restriction.check()?;

    Ok(Arc::new(SimpleType {
        name: name.to_string(),
        base,
        restriction: Some(restriction),
        description,
    }))
}

fn set_length_facet(slot: &mut Option<usize>, facet: &str, value: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::InvalidRestriction(format!(
            "duplicate '{}' facet",
            facet
        )));
    }
    *slot = Some(value.trim().parse::<usize>().map_err(|_| {
        Error::InvalidRestriction(format!(
            "'{}' facet value must be a non-negative integer but was '{}'",
            facet, value
        ))
    })?);
    Ok(())
}

fn set_digits_facet(slot: &mut Option<u32>, facet: &str, value: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::InvalidRestriction(format!(
            "duplicate '{}' facet",
            facet
        )));
    }
    *slot = Some(value.trim().parse::<u32>().map_err(|_| {
        Error::InvalidRestriction(format!(
            "'{}' facet value must be a non-negative integer but was '{}'",
            facet, value
        ))
    })?);
    Ok(())
}

fn set_bound_facet(slot: &mut Option<String>, facet: &str, value: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::InvalidRestriction(format!(
            "duplicate '{}' facet",
            facet
        )));
    }
    *slot = Some(value.to_string());
    Ok(())
}

fn parse_annotation(node: Node) -> Vec<String> {
    node.children()
        .filter(|child| {
            child.is_element()
                && child.tag_name().namespace() == Some(XSD_NAMESPACE)
                && child.tag_name().name() == "annotation"
        })
        .flat_map(|annotation| annotation.children())
        .filter(|child| child.is_element() && child.tag_name().name() == "documentation")
        .filter_map(|documentation| documentation.text().map(str::trim).map(str::to_string))
        .collect()
}

/// Element children in the XSD namespace, annotations excluded
fn schema_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| {
        child.is_element()
            && child.tag_name().namespace() == Some(XSD_NAMESPACE)
            && child.tag_name().name() != "annotation"
    })
}

fn named_schema_child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Result<Option<Node<'a, 'input>>> {
    let mut matching = schema_children(node).filter(|child| child.tag_name().name() == name);
    let first = matching.next();
    if matching.next().is_some() {
        return Err(Error::SchemaParse(format!(
            "too many '{}' children in element '{}'",
            name,
            node.tag_name().name()
        )));
    }
    Ok(first)
}

fn single_schema_child<'a, 'input>(node: Node<'a, 'input>) -> Result<Node<'a, 'input>> {
    let mut children = schema_children(node);
    let first = children
        .next()
        .ok_or_else(|| Error::SchemaParse(format!("'{}' is empty", node.tag_name().name())))?;
    if children.next().is_some() {
        return Err(Error::SchemaParse(format!(
            "too many children in element '{}'",
            node.tag_name().name()
        )));
    }
    Ok(first)
}

fn name_attr(node: Node) -> Result<String> {
    node.attribute("name").map(str::to_string).ok_or_else(|| {
        Error::SchemaParse(format!(
            "attribute 'name' must be specified for '{}'",
            node.tag_name().name()
        ))
    })
}

fn ref_attr(node: Node) -> Result<String> {
    node.attribute("ref").map(str::to_string).ok_or_else(|| {
        Error::SchemaParse(format!(
            "attribute 'ref' must be specified for '{}'",
            node.tag_name().name()
        ))
    })
}
