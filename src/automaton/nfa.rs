//! Non-deterministic automaton construction
//!
//! The schema type tree compiles into a graph of nodes connected by
//! epsilon edges (structure) and letter edges (open/close tags). Each
//! content-model item becomes a fragment with one start and one finish
//! node; occurrence bounds add bypass edges (`minOccurs = 0`), backward
//! repetition edges (`maxOccurs != 1`) and counters. Backward edges close
//! a repetition loop; the distinction matters to the determinizer, which
//! propagates counter checks only across forward edges.
//!
//! The automaton assumes `choice` alternatives start with distinct element
//! names; that assumption is verified later, during determinization.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::schema::types::{ComplexType, ContentItem, SchemaType, SimpleType};
use crate::schema::{AttributeDecl, Occurs};

use super::counter::{CounterDef, CounterId};

/// An open-tag or close-tag input token for a named element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Letter {
    /// `<name>` was read
    Open(String),
    /// `</name>` was read
    Close(String),
}

impl Letter {
    /// The element name the letter refers to
    pub fn name(&self) -> &str {
        match self {
            Letter::Open(name) | Letter::Close(name) => name,
        }
    }

    /// Whether this is an open-tag letter
    pub fn is_open(&self) -> bool {
        matches!(self, Letter::Open(_))
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Letter::Open(name) => write!(f, "+{}", name),
            Letter::Close(name) => write!(f, "-{}", name),
        }
    }
}

/// Whether an edge descends into content (forward) or re-enters a
/// repeatable group (backward)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A structural, descending edge
    Forward,
    /// A repetition-loop edge
    Backward,
}

/// An unlabelled structural edge
#[derive(Debug, Clone, Copy)]
pub struct EpsilonEdge {
    /// Edge direction
    pub direction: Direction,
    /// Target node index
    pub target: usize,
}

/// An edge consumed by an open or close tag
#[derive(Debug, Clone)]
pub struct LetterEdge {
    /// The consuming token
    pub letter: Letter,
    /// Edge direction
    pub direction: Direction,
    /// Target node index
    pub target: usize,
}

/// One node of the non-deterministic graph
#[derive(Debug, Default)]
pub struct NfaNode {
    /// Nesting depth of the element level this node belongs to
    pub depth: u32,
    /// Structural edges
    pub epsilon_edges: Vec<EpsilonEdge>,
    /// Tag-consuming edges
    pub letter_edges: Vec<LetterEdge>,
    /// Declared attributes (None value = unchecked)
    pub allowed_attributes: IndexMap<String, Option<Arc<SimpleType>>>,
    /// Required attributes and their presence-tracking slots
    pub required_attributes: IndexMap<String, usize>,
    /// The simple type of the element's text content
    pub inner_text_type: Option<Arc<SimpleType>>,
    /// Whether the node accepts arbitrary content (an element declared
    /// without a type)
    pub any_type: bool,
    /// Whether ignorable whitespace is allowed here
    pub ignore_whitespace: bool,
    /// Counter incremented when this node's subtree is entered
    pub counter_to_update: Option<CounterId>,
    /// Counter validated when this node is left forward
    pub counter_to_check: Option<CounterId>,
}

/// The built non-deterministic automaton
pub struct Nfa {
    /// Node arena
    pub nodes: Vec<NfaNode>,
    /// Counter definitions, element names still empty
    pub counters: Vec<CounterDef>,
    /// The entry node
    pub start: usize,
    /// Number of required-attribute presence slots allocated
    pub required_slots: usize,
}

/// A compiled fragment with distinct entry and exit nodes
struct Fragment {
    start: usize,
    finish: usize,
}

/// Compiles the type tree into an [`Nfa`]
pub struct NfaBuilder {
    nodes: Vec<NfaNode>,
    counters: Vec<CounterDef>,
    required_slots: usize,
}

impl NfaBuilder {
    /// Build the automaton for a root type (`None` = any content)
    pub fn build(root: Option<&SchemaType>) -> Result<Nfa> {
        let mut builder = Self {
            nodes: Vec::new(),
            counters: Vec::new(),
            required_slots: 0,
        };
        let fragment = builder.build_type(root, 0)?;
        Ok(Nfa {
            nodes: builder.nodes,
            counters: builder.counters,
            start: fragment.start,
            required_slots: builder.required_slots,
        })
    }

    fn node(&mut self, depth: u32) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NfaNode {
            depth,
            ..NfaNode::default()
        });
        id
    }

    fn counter(&mut self, occurs: Occurs) -> Option<CounterId> {
        if !occurs.needs_counter() {
            return None;
        }
        let id = self.counters.len();
        self.counters.push(CounterDef::new(id, occurs.min, occurs.max));
        Some(id)
    }

    fn epsilon(&mut self, from: usize, direction: Direction, to: usize) {
        self.nodes[from].epsilon_edges.push(EpsilonEdge {
            direction,
            target: to,
        });
    }

    fn letter(&mut self, from: usize, letter: Letter, direction: Direction, to: usize) {
        self.nodes[from].letter_edges.push(LetterEdge {
            letter,
            direction,
            target: to,
        });
    }

    /// Compile a simple, any or complex type into a fragment.
    fn build_type(&mut self, ty: Option<&SchemaType>, depth: u32) -> Result<Fragment> {
        let complex = match ty {
            Some(SchemaType::Complex(complex)) => complex,
            simple_or_any => {
                let start = self.node(depth);
                let finish = self.node(depth);
                self.nodes[start].any_type = simple_or_any.is_none();
                if let Some(SchemaType::Simple(simple)) = simple_or_any {
                    self.nodes[start].inner_text_type = Some(Arc::clone(simple));
                }
                self.epsilon(start, Direction::Forward, finish);
                return Ok(Fragment { start, finish });
            }
        };

        let (inner_text_type, attributes, children) = flatten_derivation(complex);
        let start = self.node(depth);
        {
            let node = &mut self.nodes[start];
            node.inner_text_type = inner_text_type;
            for attribute in &attributes {
                node.allowed_attributes
                    .insert(attribute.name.clone(), attribute.ty.clone());
            }
        }
        for attribute in attributes.iter().filter(|attribute| attribute.required) {
            let slot = self.required_slots;
            self.required_slots += 1;
            self.nodes[start]
                .required_attributes
                .insert(attribute.name.clone(), slot);
        }

        let mut tail = start;
        for child in &children {
            let fragment = self.build_item(child, depth)?;
            self.epsilon(tail, Direction::Forward, fragment.start);
            tail = fragment.finish;
        }
        let finish = self.node(depth);
        self.epsilon(tail, Direction::Forward, finish);
        Ok(Fragment { start, finish })
    }

    /// Compile one content-model item into a fragment.
    fn build_item(&mut self, item: &ContentItem, depth: u32) -> Result<Fragment> {
        let occurs = item.occurs();
        if let Some(max) = occurs.max {
            if occurs.min > max {
                return Err(Error::MalformedOccurs {
                    min: occurs.min,
                    max,
                });
            }
        }
        match item {
            ContentItem::Element(element) => {
                let counter = self.counter(occurs);
                let start = self.node(depth);
                self.nodes[start].ignore_whitespace = true;
                let child = self.build_type(element.ty.as_ref(), depth + 1)?;
                let finish = self.node(depth);
                self.nodes[finish].ignore_whitespace = true;

                self.letter(
                    start,
                    Letter::Open(element.name.clone()),
                    Direction::Forward,
                    child.start,
                );
                self.letter(
                    child.finish,
                    Letter::Close(element.name.clone()),
                    Direction::Forward,
                    finish,
                );
                if occurs.min == 0 {
                    self.epsilon(start, Direction::Forward, finish);
                }
                if !occurs.is_single() {
                    self.letter(
                        finish,
                        Letter::Open(element.name.clone()),
                        Direction::Backward,
                        child.start,
                    );
                }
                if let Some(counter) = counter {
                    self.nodes[child.start].counter_to_update = Some(counter);
                    self.nodes[finish].counter_to_check = Some(counter);
                }
                Ok(Fragment { start, finish })
            }
            ContentItem::Sequence(group) => {
                if !occurs.is_single() && group.items.iter().all(ContentItem::is_emptiable) {
                    return Err(Error::ZeroWidthLoop("sequence"));
                }
                let counter = self.counter(occurs);
                let start = self.node(depth);
                let fragments = group
                    .items
                    .iter()
                    .map(|item| self.build_item(item, depth))
                    .collect::<Result<Vec<_>>>()?;
                let finish = self.node(depth);
                let mut tail = start;
                for fragment in &fragments {
                    self.epsilon(tail, Direction::Forward, fragment.start);
                    tail = fragment.finish;
                }
                self.epsilon(tail, Direction::Forward, finish);
                if occurs.min == 0 {
                    self.epsilon(start, Direction::Forward, finish);
                }
                if let Some(first) = fragments.first() {
                    if !occurs.is_single() {
                        self.epsilon(finish, Direction::Backward, first.start);
                    }
                    if let Some(counter) = counter {
                        self.nodes[first.start].counter_to_update = Some(counter);
                        self.nodes[finish].counter_to_check = Some(counter);
                    }
                }
                Ok(Fragment { start, finish })
            }
            ContentItem::Choice(group) => {
                if !occurs.is_single() && group.items.iter().any(ContentItem::is_emptiable) {
                    return Err(Error::ZeroWidthLoop("choice"));
                }
                let counter = self.counter(occurs);
                let start = self.node(depth);
                let fragments = group
                    .items
                    .iter()
                    .map(|item| self.build_item(item, depth))
                    .collect::<Result<Vec<_>>>()?;
                let finish = self.node(depth);
                if let Some(counter) = counter {
                    self.nodes[finish].counter_to_check = Some(counter);
                }
                for fragment in &fragments {
                    self.epsilon(start, Direction::Forward, fragment.start);
                    self.epsilon(fragment.finish, Direction::Forward, finish);
                    if !occurs.is_single() {
                        self.epsilon(finish, Direction::Backward, fragment.start);
                    }
                    if let Some(counter) = counter {
                        self.nodes[fragment.start].counter_to_update = Some(counter);
                    }
                }
                if occurs.min == 0 || fragments.is_empty() {
                    self.epsilon(start, Direction::Forward, finish);
                }
                Ok(Fragment { start, finish })
            }
        }
    }
}

/// Walk a complex type's derivation chain, collecting attributes and
/// content base-first and returning the inherited text type, if any.
fn flatten_derivation(
    complex: &Arc<ComplexType>,
) -> (
    Option<Arc<SimpleType>>,
    Vec<AttributeDecl>,
    Vec<ContentItem>,
) {
    fn walk(
        complex: &ComplexType,
        attributes: &mut Vec<AttributeDecl>,
        children: &mut Vec<ContentItem>,
    ) -> Option<Arc<SimpleType>> {
        let inner = match &complex.base {
            None => None,
            Some(SchemaType::Simple(simple)) => Some(Arc::clone(simple)),
            Some(SchemaType::Complex(base)) => walk(base, attributes, children),
        };
        attributes.extend(complex.attributes.iter().cloned());
        children.extend(complex.children.iter().cloned());
        inner
    }
    let mut attributes = Vec::new();
    let mut children = Vec::new();
    let inner = walk(complex, &mut attributes, &mut children);
    (inner, attributes, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::XS_STRING;
    use crate::schema::types::{ElementItem, GroupItem};

    fn element(name: &str, occurs: Occurs) -> ContentItem {
        ContentItem::Element(ElementItem {
            name: name.to_string(),
            ty: Some(SchemaType::Simple(Arc::clone(&XS_STRING))),
            occurs,
            fixed: None,
        })
    }

    fn complex_root(children: Vec<ContentItem>) -> SchemaType {
        SchemaType::Complex(Arc::new(ComplexType {
            name: "root".to_string(),
            base: None,
            children,
            attributes: Vec::new(),
            description: Vec::new(),
        }))
    }

    fn letters(nfa: &Nfa) -> Vec<(String, Direction)> {
        nfa.nodes
            .iter()
            .flat_map(|node| node.letter_edges.iter())
            .map(|edge| (edge.letter.to_string(), edge.direction))
            .collect()
    }

    #[test]
    fn test_single_element_shape() {
        let root = complex_root(vec![element("a", Occurs::once())]);
        let nfa = NfaBuilder::build(Some(&root)).unwrap();
        let letters = letters(&nfa);
        assert_eq!(letters.len(), 2);
        assert!(letters.contains(&("+a".to_string(), Direction::Forward)));
        assert!(letters.contains(&("-a".to_string(), Direction::Forward)));
        assert!(nfa.counters.is_empty());
    }

    #[test]
    fn test_repeatable_element_gets_loop_and_counter() {
        let root = complex_root(vec![element("a", Occurs::new(2, Some(3)).unwrap())]);
        let nfa = NfaBuilder::build(Some(&root)).unwrap();
        let letters = letters(&nfa);
        // opening, closing and the backward repetition edge
        assert_eq!(letters.len(), 3);
        assert!(letters.contains(&("+a".to_string(), Direction::Backward)));
        assert_eq!(nfa.counters.len(), 1);
        assert_eq!(nfa.counters[0].min, 2);
        assert_eq!(nfa.counters[0].max, Some(3));
    }

    #[test]
    fn test_optional_element_has_bypass() {
        let root = complex_root(vec![element("a", Occurs::optional())]);
        let nfa = NfaBuilder::build(Some(&root)).unwrap();
        // optional but not counted
        assert!(nfa.counters.is_empty());
        let bypasses: usize = nfa
            .nodes
            .iter()
            .map(|node| node.epsilon_edges.len())
            .sum();
        // the bypass edge exists on top of the plain structural chain
        let plain = {
            let root = complex_root(vec![element("a", Occurs::once())]);
            let nfa = NfaBuilder::build(Some(&root)).unwrap();
            nfa.nodes
                .iter()
                .map(|node| node.epsilon_edges.len())
                .sum::<usize>()
        };
        assert_eq!(bypasses, plain + 1);
    }

    #[test]
    fn test_unbounded_repetition_has_no_counter() {
        let root = complex_root(vec![element("a", Occurs::zero_or_more())]);
        let nfa = NfaBuilder::build(Some(&root)).unwrap();
        assert!(nfa.counters.is_empty());
        assert!(letters(&nfa).contains(&("+a".to_string(), Direction::Backward)));
    }

    #[test]
    fn test_required_attribute_slots() {
        let root = SchemaType::Complex(Arc::new(ComplexType {
            name: "root".to_string(),
            base: None,
            children: Vec::new(),
            attributes: vec![
                AttributeDecl {
                    name: "id".to_string(),
                    ty: None,
                    required: true,
                    fixed: None,
                },
                AttributeDecl {
                    name: "label".to_string(),
                    ty: None,
                    required: false,
                    fixed: None,
                },
            ],
            description: Vec::new(),
        }));
        let nfa = NfaBuilder::build(Some(&root)).unwrap();
        assert_eq!(nfa.required_slots, 1);
        let start = &nfa.nodes[nfa.start];
        assert_eq!(start.allowed_attributes.len(), 2);
        assert_eq!(start.required_attributes.len(), 1);
    }

    #[test]
    fn test_zero_width_repeatable_sequence_rejected() {
        let root = complex_root(vec![ContentItem::Sequence(GroupItem {
            items: vec![element("a", Occurs::optional())],
            occurs: Occurs::new(0, None).unwrap(),
        })]);
        assert!(matches!(
            NfaBuilder::build(Some(&root)),
            Err(Error::ZeroWidthLoop("sequence"))
        ));
    }

    #[test]
    fn test_zero_width_repeatable_choice_rejected() {
        let root = complex_root(vec![ContentItem::Choice(GroupItem {
            items: vec![element("a", Occurs::once()), element("b", Occurs::optional())],
            occurs: Occurs::new(1, None).unwrap(),
        })]);
        assert!(matches!(
            NfaBuilder::build(Some(&root)),
            Err(Error::ZeroWidthLoop("choice"))
        ));
    }

    #[test]
    fn test_any_type_leaf() {
        let nfa = NfaBuilder::build(None).unwrap();
        assert_eq!(nfa.nodes.len(), 2);
        assert!(nfa.nodes[nfa.start].any_type);
        assert!(nfa.nodes[nfa.start].inner_text_type.is_none());
    }

    #[test]
    fn test_simple_content_inherited_through_extension() {
        let base = SchemaType::Complex(Arc::new(ComplexType {
            name: "base".to_string(),
            base: Some(SchemaType::Simple(Arc::clone(&XS_STRING))),
            children: Vec::new(),
            attributes: vec![AttributeDecl {
                name: "unit".to_string(),
                ty: None,
                required: false,
                fixed: None,
            }],
            description: Vec::new(),
        }));
        let derived = SchemaType::Complex(Arc::new(ComplexType {
            name: "derived".to_string(),
            base: Some(base),
            children: Vec::new(),
            attributes: vec![AttributeDecl {
                name: "scale".to_string(),
                ty: None,
                required: false,
                fixed: None,
            }],
            description: Vec::new(),
        }));
        let nfa = NfaBuilder::build(Some(&derived)).unwrap();
        let start = &nfa.nodes[nfa.start];
        assert!(start.inner_text_type.is_some());
        // base attributes come first
        let names: Vec<&String> = start.allowed_attributes.keys().collect();
        assert_eq!(names, ["unit", "scale"]);
    }
}
