//! The runtime automaton
//!
//! A [`SchemaAutomaton`] executes one validation pass: it owns the live
//! occurrence counters, the element-name stack and the current-state
//! pointer, and consumes tag/attribute/text events against the shared,
//! immutable [`Dfa`]. After any structural error it repositions itself at
//! the nearest consistent ancestor state and keeps validating; the events
//! of the abandoned subtree are skipped by the caller tracking stack
//! depth.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::diagnostics::{DiagnosticKind, NodeKind, Position, SchemaDiagnostic};
use crate::error::Result;
use crate::schema::SchemaType;

use super::counter::CounterId;
use super::dfa::Dfa;
use super::nfa::Letter;

/// A compiled schema: build once, hand out cheap automaton instances.
///
/// The automaton graph is immutable and shared; the recovery memo is
/// populated lazily and shared too, which is safe because each entry is a
/// pure function of the graph.
pub struct CompiledSchema {
    dfa: Arc<Dfa>,
    recovery: Arc<RecoveryTable>,
}

impl CompiledSchema {
    /// Compile a root schema type (`None` accepts any content)
    pub fn compile(root: Option<&SchemaType>) -> Result<Self> {
        let dfa = Dfa::compile(root)?;
        Ok(Self {
            dfa: Arc::new(dfa),
            recovery: Arc::new(RecoveryTable::default()),
        })
    }

    /// Create a fresh automaton instance for one validation pass
    pub fn automaton(&self) -> SchemaAutomaton {
        SchemaAutomaton {
            counters: vec![0; self.dfa.counters.len()],
            required_seen: vec![false; self.dfa.required_slots],
            path: Vec::new(),
            current: Some(self.dfa.start),
            recovering: false,
            position: Position::default(),
            dfa: Arc::clone(&self.dfa),
            recovery: Arc::clone(&self.recovery),
        }
    }
}

/// The per-pass automaton state
pub struct SchemaAutomaton {
    dfa: Arc<Dfa>,
    recovery: Arc<RecoveryTable>,
    counters: Vec<u32>,
    required_seen: Vec<bool>,
    path: Vec<String>,
    current: Option<usize>,
    recovering: bool,
    position: Position,
}

impl SchemaAutomaton {
    /// Record the document position attached to subsequent diagnostics
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Whether the current state accepts arbitrary content; the caller
    /// should skip the subtree's events
    pub fn in_any_type_state(&self) -> bool {
        !self.recovering
            && self
                .current
                .is_some_and(|current| self.dfa.nodes[current].any_type)
    }

    /// Whether the current state declares text content
    pub fn has_text(&self) -> bool {
        !self.recovering
            && self
                .current
                .is_some_and(|current| self.dfa.nodes[current].inner_text_executor.is_some())
    }

    /// Consume an opening tag
    pub fn start_element(&mut self, name: &str) -> Option<SchemaDiagnostic> {
        let mut result = None;
        if !self.recovering {
            let parent = self.path.last().cloned();
            result = self.make_jump(&Letter::Open(name.to_string()), parent);
            if let Some(current) = self.current {
                let slots: Vec<usize> = self.dfa.nodes[current]
                    .required_attributes
                    .values()
                    .copied()
                    .collect();
                for slot in slots {
                    self.required_seen[slot] = false;
                }
            }
        }
        self.path.push(name.to_string());
        result
    }

    /// Consume a closing tag
    pub fn end_element(&mut self) -> Option<SchemaDiagnostic> {
        let top = self.path.pop()?;
        let result = if self.recovering {
            None
        } else {
            self.make_jump(&Letter::Close(top.clone()), Some(top))
        };
        if self.recovering {
            if let Some(current) = self.current {
                if self.path.len() as u64 == u64::from(self.dfa.nodes[current].depth) {
                    self.recovering = false;
                }
            }
        }
        result
    }

    /// Consume one attribute of the element just opened
    pub fn read_attribute(&mut self, name: &str, value: &str) -> Option<SchemaDiagnostic> {
        if self.recovering {
            return None;
        }
        let current = self.current?;
        match self.dfa.nodes[current].allowed_attributes.get(name) {
            None => Some(SchemaDiagnostic::new(
                self.position,
                DiagnosticKind::UnknownAttribute {
                    attribute: name.to_string(),
                },
            )),
            Some(executor) => {
                if let Some(&slot) = self.dfa.nodes[current].required_attributes.get(name) {
                    self.required_seen[slot] = true;
                }
                executor
                    .as_ref()
                    .and_then(|executor| {
                        executor.execute(value, NodeKind::Attribute, name, self.position)
                    })
            }
        }
    }

    /// Consume element text
    pub fn read_text(&mut self, text: &str) -> Option<SchemaDiagnostic> {
        if self.recovering {
            return None;
        }
        let current = self.current?;
        let element = self.path.last().cloned().unwrap_or_default();
        match &self.dfa.nodes[current].inner_text_executor {
            None => Some(SchemaDiagnostic::new(
                self.position,
                DiagnosticKind::TextNotAllowed { element },
            )),
            Some(executor) => executor.execute(text, NodeKind::Element, &element, self.position),
        }
    }

    /// Consume whitespace-only text
    pub fn read_whitespace(&mut self, whitespace: &str) -> Option<SchemaDiagnostic> {
        if self.recovering {
            return None;
        }
        let current = self.current?;
        let element = self.path.last().cloned().unwrap_or_default();
        let node = &self.dfa.nodes[current];
        if let Some(executor) = &node.inner_text_executor {
            return executor.execute(whitespace, NodeKind::Element, &element, self.position);
        }
        if node.ignore_whitespace {
            return None;
        }
        Some(SchemaDiagnostic::new(
            self.position,
            DiagnosticKind::WhitespaceNotAllowed { element },
        ))
    }

    /// Report every declared-required attribute not seen on the current
    /// element
    pub fn check_required_attributes(&self) -> Vec<SchemaDiagnostic> {
        if self.recovering {
            return Vec::new();
        }
        let Some(current) = self.current else {
            return Vec::new();
        };
        self.dfa.nodes[current]
            .required_attributes
            .iter()
            .filter(|(_, &slot)| !self.required_seen[slot])
            .map(|(name, _)| {
                SchemaDiagnostic::new(
                    self.position,
                    DiagnosticKind::MissingRequiredAttribute {
                        attribute: name.clone(),
                    },
                )
            })
            .collect()
    }

    /// Return to the initial state for a new document
    pub fn reset(&mut self) {
        self.current = Some(self.dfa.start);
        self.counters.fill(0);
        self.required_seen.fill(false);
        self.path.clear();
        self.recovering = false;
    }

    /// The core transition function.
    fn make_jump(&mut self, letter: &Letter, element: Option<String>) -> Option<SchemaDiagnostic> {
        let current = self.current?;
        let mut result = None;
        match self.dfa.nodes[current].jumps.get(letter).cloned() {
            None => {
                result = Some(self.missing_jump_diagnostic(current, letter, &element));
                self.recovering = true;
            }
            Some(jump) => {
                for &counter_id in &jump.counters_to_update {
                    self.counters[counter_id] += 1;
                    let definition = &self.dfa.counters[counter_id];
                    if let Some(max) = definition.max {
                        if self.counters[counter_id] > max {
                            // siblings that could still legally follow
                            let expected: Vec<String> = self.dfa.nodes[current]
                                .jumps
                                .keys()
                                .filter(|candidate| candidate.is_open())
                                .map(|candidate| candidate.name().to_string())
                                .filter(|name| !definition.element_names.contains(name))
                                .collect();
                            let kind = if expected.is_empty() {
                                DiagnosticKind::ExtraElement {
                                    element: element.clone(),
                                    child: letter.name().to_string(),
                                }
                            } else {
                                DiagnosticKind::UnexpectedElement {
                                    element: element.clone(),
                                    child: letter.name().to_string(),
                                    expected,
                                }
                            };
                            result = Some(SchemaDiagnostic::new(self.position, kind));
                            self.recovering = true;
                        }
                    }
                }
                for &counter_id in &jump.counters_to_check {
                    let definition = &self.dfa.counters[counter_id];
                    if self.counters[counter_id] < definition.min {
                        result = Some(SchemaDiagnostic::new(
                            self.position,
                            DiagnosticKind::IncompleteContent {
                                element: element.clone(),
                                expected: definition.element_names.iter().cloned().collect(),
                            },
                        ));
                        self.recovering = true;
                    }
                    // leaving the loop consumes the count either way
                    self.counters[counter_id] = 0;
                }
                if !self.recovering {
                    self.current = Some(jump.target);
                }
            }
        }
        if self.recovering {
            self.recover();
        }
        result
    }

    /// Classify a letter with no transition into a diagnostic.
    fn missing_jump_diagnostic(
        &self,
        current: usize,
        letter: &Letter,
        element: &Option<String>,
    ) -> SchemaDiagnostic {
        let node = &self.dfa.nodes[current];
        let kind = match letter {
            Letter::Close(_) => DiagnosticKind::IncompleteContent {
                element: element.clone(),
                expected: node
                    .jumps
                    .keys()
                    .map(|candidate| candidate.name().to_string())
                    .collect(),
            },
            Letter::Open(child) => {
                let expected: Vec<String> = node
                    .jumps
                    .keys()
                    .filter(|candidate| candidate.is_open())
                    .map(|candidate| candidate.name().to_string())
                    .collect();
                if !expected.is_empty() {
                    DiagnosticKind::UnexpectedElement {
                        element: element.clone(),
                        child: child.clone(),
                        expected,
                    }
                } else {
                    // No opening alternative here at all; consult the state
                    // that opened this subtree to tell "no children
                    // allowed" apart from "already complete"
                    let opening = node
                        .opening_node
                        .expect("opening node not resolved for a childless state");
                    let parent_allows_children = self.dfa.nodes[opening]
                        .jumps
                        .keys()
                        .any(Letter::is_open);
                    if parent_allows_children {
                        DiagnosticKind::ExtraElement {
                            element: element.clone(),
                            child: child.clone(),
                        }
                    } else if node.inner_text_executor.is_some() {
                        DiagnosticKind::TextOnlyElementWithChild {
                            element: element.clone().unwrap_or_default(),
                            child: child.clone(),
                        }
                    } else {
                        DiagnosticKind::LeafElementWithChild {
                            element: element.clone().unwrap_or_default(),
                            child: child.clone(),
                        }
                    }
                }
            }
        };
        SchemaDiagnostic::new(self.position, kind)
    }

    /// Relocate to the nearest consistent ancestor state, resetting every
    /// counter whose scope the failure abandoned.
    fn recover(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        match self.recovery.lookup(&self.dfa, current) {
            None => self.current = None,
            Some(jump) => {
                for &counter in &jump.counters_to_reset {
                    self.counters[counter] = 0;
                }
                self.current = Some(jump.target);
            }
        }
    }
}

/// The memoized recovery target of one state
struct RecoveryJump {
    target: usize,
    counters_to_reset: Vec<CounterId>,
}

/// Lazily populated map from failing state to recovery target.
///
/// Entries are pure functions of the automaton graph, so concurrent
/// computations of the same entry converge on equal results and
/// insert-if-absent keeps the first.
#[derive(Default)]
struct RecoveryTable {
    memo: RwLock<HashMap<usize, Option<Arc<RecoveryJump>>>>,
}

impl RecoveryTable {
    fn lookup(&self, dfa: &Dfa, from: usize) -> Option<Arc<RecoveryJump>> {
        if let Some(known) = self.memo.read().expect("recovery memo poisoned").get(&from) {
            return known.clone();
        }
        let computed = Self::compute(dfa, from).map(Arc::new);
        let mut memo = self.memo.write().expect("recovery memo poisoned");
        memo.entry(from).or_insert(computed).clone()
    }

    /// Breadth-first search over jumps for the unique reachable state one
    /// level above the failing one.
    fn compute(dfa: &Dfa, from: usize) -> Option<RecoveryJump> {
        let parent_depth = i64::from(dfa.nodes[from].depth) - 1;
        let mut target: Option<usize> = None;
        let mut counters_to_reset = Vec::new();
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);
        while let Some(node) = queue.pop_front() {
            for jump in dfa.nodes[node].jumps.values() {
                counters_to_reset.extend(&jump.counters_to_update);
                counters_to_reset.extend(&jump.counters_to_check);
                let next = jump.target;
                let next_depth = i64::from(dfa.nodes[next].depth);
                assert!(
                    next_depth >= parent_depth,
                    "recovery search dropped below the parent level"
                );
                if next_depth > parent_depth {
                    if visited.insert(next) {
                        queue.push_back(next);
                    }
                } else {
                    if let Some(existing) = target {
                        assert_eq!(existing, next, "recovery target is not unique");
                    }
                    target = Some(next);
                }
            }
        }
        target.map(|target| RecoveryJump {
            target,
            counters_to_reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::{XS_INT, XS_STRING};
    use crate::schema::types::{AttributeDecl, ComplexType, ContentItem, ElementItem};
    use crate::schema::{Occurs, Restriction};

    fn element(name: &str, ty: Option<SchemaType>, occurs: Occurs) -> ContentItem {
        ContentItem::Element(ElementItem {
            name: name.to_string(),
            ty,
            occurs,
            fixed: None,
        })
    }

    fn string_type() -> Option<SchemaType> {
        Some(SchemaType::Simple(Arc::clone(&XS_STRING)))
    }

    /// `<root>` containing `a{min,max}`
    fn repeated_schema(min: u32, max: Option<u32>) -> CompiledSchema {
        let root_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "rootType".to_string(),
            base: None,
            children: vec![element("a", string_type(), Occurs::new(min, max).unwrap())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let schema = SchemaType::Complex(Arc::new(ComplexType {
            name: "schema".to_string(),
            base: None,
            children: vec![element("root", Some(root_type), Occurs::once())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        CompiledSchema::compile(Some(&schema)).unwrap()
    }

    /// Drive `<root>` with `n` empty `<a/>` children and collect all
    /// diagnostics
    fn run_repetitions(schema: &CompiledSchema, n: usize) -> Vec<SchemaDiagnostic> {
        let mut automaton = schema.automaton();
        let mut diagnostics = Vec::new();
        diagnostics.extend(automaton.start_element("root"));
        for _ in 0..n {
            diagnostics.extend(automaton.start_element("a"));
            diagnostics.extend(automaton.read_text(""));
            diagnostics.extend(automaton.end_element());
        }
        diagnostics.extend(automaton.end_element());
        diagnostics
    }

    #[test]
    fn test_bounds_law_under_min() {
        let schema = repeated_schema(2, Some(3));
        let diagnostics = run_repetitions(&schema, 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            &diagnostics[0].kind,
            DiagnosticKind::IncompleteContent { expected, .. } if expected == &["a".to_string()]
        ));
    }

    #[test]
    fn test_bounds_law_in_range() {
        let schema = repeated_schema(2, Some(3));
        for n in 2..=3 {
            assert!(run_repetitions(&schema, n).is_empty(), "n = {}", n);
        }
    }

    #[test]
    fn test_bounds_law_over_max() {
        let schema = repeated_schema(2, Some(3));
        let diagnostics = run_repetitions(&schema, 4);
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            &diagnostics[0].kind,
            DiagnosticKind::ExtraElement { child, .. } if child == "a"
        ));
    }

    #[test]
    fn test_unexpected_element() {
        let schema = repeated_schema(1, Some(1));
        let mut automaton = schema.automaton();
        assert!(automaton.start_element("root").is_none());
        let diagnostic = automaton.start_element("b").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::UnexpectedElement { ref child, ref expected, .. }
                if child == "b" && expected == &["a".to_string()]
        ));
    }

    #[test]
    fn test_recovery_resumes_after_failed_subtree() {
        // root contains <a> (which must hold one <x/>) followed by <b/>
        let a_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "aType".to_string(),
            base: None,
            children: vec![element("x", string_type(), Occurs::once())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let root_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "rootType".to_string(),
            base: None,
            children: vec![
                element("a", Some(a_type), Occurs::once()),
                element("b", string_type(), Occurs::once()),
            ],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let schema = SchemaType::Complex(Arc::new(ComplexType {
            name: "schema".to_string(),
            base: None,
            children: vec![element("root", Some(root_type), Occurs::once())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let compiled = CompiledSchema::compile(Some(&schema)).unwrap();
        let mut automaton = compiled.automaton();

        assert!(automaton.start_element("root").is_none());
        assert!(automaton.start_element("a").is_none());

        // a wrong child fails; the rest of <a>'s subtree is skipped
        assert!(automaton.start_element("oops").is_some());
        assert!(automaton.start_element("deeper").is_none());
        assert!(automaton.end_element().is_none());
        assert!(automaton.end_element().is_none());

        // closing </a> resynchronizes; the sibling <b/> validates normally
        assert!(automaton.end_element().is_none());
        assert!(automaton.start_element("b").is_none());
        assert!(automaton.read_text("ok").is_none());
        assert!(automaton.end_element().is_none());
        assert!(automaton.end_element().is_none());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let schema = repeated_schema(1, Some(1));
        let mut automaton = schema.automaton();
        for _ in 0..2 {
            assert!(automaton.start_element("root").is_none());
            assert!(automaton.start_element("a").is_none());
            assert!(automaton.end_element().is_none());
            assert!(automaton.end_element().is_none());
            automaton.reset();
        }
    }

    fn attribute_schema() -> CompiledSchema {
        let root_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "rootType".to_string(),
            base: None,
            children: Vec::new(),
            attributes: vec![
                AttributeDecl {
                    name: "id".to_string(),
                    ty: Some(Arc::clone(&XS_INT)),
                    required: true,
                    fixed: None,
                },
                AttributeDecl {
                    name: "label".to_string(),
                    ty: Some(Arc::clone(&XS_STRING)),
                    required: true,
                    fixed: None,
                },
            ],
            description: Vec::new(),
        }));
        let schema = SchemaType::Complex(Arc::new(ComplexType {
            name: "schema".to_string(),
            base: None,
            children: vec![element("root", Some(root_type), Occurs::once())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        CompiledSchema::compile(Some(&schema)).unwrap()
    }

    #[test]
    fn test_missing_required_attributes() {
        let schema = attribute_schema();
        let mut automaton = schema.automaton();
        assert!(automaton.start_element("root").is_none());
        assert!(automaton.read_attribute("id", "7").is_none());
        let missing = automaton.check_required_attributes();
        assert_eq!(missing.len(), 1);
        assert!(matches!(
            &missing[0].kind,
            DiagnosticKind::MissingRequiredAttribute { attribute } if attribute == "label"
        ));
    }

    #[test]
    fn test_attribute_order_does_not_matter() {
        let schema = attribute_schema();
        for order in [["id", "label"], ["label", "id"]] {
            let mut automaton = schema.automaton();
            automaton.start_element("root");
            for name in order {
                assert!(automaton.read_attribute(name, "1").is_none());
            }
            assert!(automaton.check_required_attributes().is_empty());
        }
    }

    #[test]
    fn test_unknown_attribute() {
        let schema = attribute_schema();
        let mut automaton = schema.automaton();
        automaton.start_element("root");
        let diagnostic = automaton.read_attribute("unknown", "x").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::UnknownAttribute { ref attribute } if attribute == "unknown"
        ));
    }

    #[test]
    fn test_attribute_value_type_error() {
        let schema = attribute_schema();
        let mut automaton = schema.automaton();
        automaton.start_element("root");
        let diagnostic = automaton.read_attribute("id", "12x").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::InvalidValue { ref name, ref value, ref expected_type, .. }
                if name == "id" && value == "12x" && expected_type == "32-bit integer"
        ));
    }

    #[test]
    fn test_text_in_childless_element() {
        let schema = attribute_schema();
        let mut automaton = schema.automaton();
        automaton.start_element("root");
        let diagnostic = automaton.read_text("hello").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::TextNotAllowed { ref element } if element == "root"
        ));
    }

    #[test]
    fn test_whitespace_between_children_is_ignored() {
        let schema = repeated_schema(1, Some(1));
        let mut automaton = schema.automaton();
        automaton.start_element("root");
        assert!(automaton.read_whitespace("\n  ").is_none());
        automaton.start_element("a");
        automaton.end_element();
        assert!(automaton.read_whitespace("\n").is_none());
        assert!(automaton.end_element().is_none());
    }

    fn bounded_int() -> crate::schema::SimpleType {
        crate::schema::SimpleType::derived(
            "bounded",
            Some(Arc::clone(&XS_INT)),
            Restriction {
                max_inclusive: Some("100".to_string()),
                ..Restriction::default()
            },
        )
    }

    #[test]
    fn test_text_type_restriction_applies() {
        let bounded = Arc::new(bounded_int());
        let root_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "rootType".to_string(),
            base: None,
            children: vec![element(
                "n",
                Some(SchemaType::Simple(Arc::clone(&bounded))),
                Occurs::once(),
            )],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let schema = SchemaType::Complex(Arc::new(ComplexType {
            name: "schema".to_string(),
            base: None,
            children: vec![element("root", Some(root_type), Occurs::once())],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        let compiled = CompiledSchema::compile(Some(&schema)).unwrap();
        let mut automaton = compiled.automaton();
        automaton.start_element("root");
        automaton.start_element("n");
        assert!(automaton.read_text("50").is_none());
        automaton.end_element();
        automaton.end_element();

        automaton.reset();
        automaton.start_element("root");
        automaton.start_element("n");
        let diagnostic = automaton.read_text("200").unwrap();
        assert!(matches!(
            diagnostic.kind,
            DiagnosticKind::FacetViolation { .. }
        ));
    }

}
