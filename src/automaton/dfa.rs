//! Determinization by epsilon closure
//!
//! Each node of the non-deterministic graph that can be the target of a
//! letter edge becomes one deterministic node: the epsilon closure of that
//! node. The closure walk carries the set of counters to update and to
//! check accumulated along the path; two paths reaching the same node with
//! incompatible counter records mean the occurrence semantics of the
//! schema cannot be represented and construction fails. Likewise, two
//! letter edges for the same element name inside one closure must agree on
//! their target.
//!
//! The construction deliberately avoids general subset merging: it relies
//! on sibling alternatives being letter-disjoint and rejects schemas that
//! are not.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::executors::{ExecutorFactory, SimpleTypeExecutor};
use crate::schema::SchemaType;

use super::counter::{CounterDef, CounterId};
use super::nfa::{Direction, Letter, Nfa, NfaBuilder};

/// A deterministic transition
#[derive(Debug, Clone)]
pub struct Jump {
    /// Target node index
    pub target: usize,
    /// Counters incremented (and bounds-checked) when the jump is taken
    pub counters_to_update: BTreeSet<CounterId>,
    /// Counters whose minimum is verified (and count consumed) when the
    /// jump is taken
    pub counters_to_check: BTreeSet<CounterId>,
}

impl Jump {
    fn new(target: usize) -> Self {
        Self {
            target,
            counters_to_update: BTreeSet::new(),
            counters_to_check: BTreeSet::new(),
        }
    }
}

/// One executable automaton state
pub struct DfaNode {
    /// Nesting depth of the element level this state belongs to
    pub depth: u32,
    /// Declared attributes with their value executors (None = unchecked)
    pub allowed_attributes: IndexMap<String, Option<Arc<dyn SimpleTypeExecutor>>>,
    /// Required attributes and their presence-tracking slots
    pub required_attributes: IndexMap<String, usize>,
    /// Executor for the element's text content
    pub inner_text_executor: Option<Arc<dyn SimpleTypeExecutor>>,
    /// Whether the state accepts arbitrary content
    pub any_type: bool,
    /// Whether ignorable whitespace is allowed here
    pub ignore_whitespace: bool,
    /// Transitions by letter, in schema declaration order
    pub jumps: IndexMap<Letter, Jump>,
    /// The state that was current when this subtree was opened; used only
    /// to classify diagnostics
    pub opening_node: Option<usize>,
}

/// The compiled, immutable automaton
pub struct Dfa {
    /// State arena; all cross-references are indices into it
    pub nodes: Vec<DfaNode>,
    /// Frozen counter definitions
    pub counters: Vec<CounterDef>,
    /// The initial state
    pub start: usize,
    /// Number of required-attribute presence slots
    pub required_slots: usize,
}

impl Dfa {
    /// Compile a root schema type into an automaton
    pub fn compile(root: Option<&SchemaType>) -> Result<Dfa> {
        let nfa = NfaBuilder::build(root)?;
        let factory = ExecutorFactory::new();
        let mut determinizer = Determinizer {
            nfa: &nfa,
            factory: &factory,
            nodes: Vec::new(),
            counters: nfa.counters.clone(),
            mapping: HashMap::new(),
        };
        let start = determinizer.closure(nfa.start)?;
        let mut nodes = determinizer.nodes;
        resolve_opening_nodes(&mut nodes, start);
        Ok(Dfa {
            nodes,
            counters: determinizer.counters,
            start,
            required_slots: nfa.required_slots,
        })
    }
}

/// The counter obligations accumulated along one closure path
#[derive(Debug, Clone, Default)]
struct VisitedCounters {
    update: BTreeSet<CounterId>,
    check: BTreeSet<CounterId>,
}

impl VisitedCounters {
    /// Whether two paths into the same node agree. The update sets must be
    /// identical; checks matter only for counters the closure also
    /// updates, and those must be checked on both paths or neither.
    fn compatible(&self, other: &VisitedCounters) -> bool {
        if self.update != other.update {
            return false;
        }
        for counter in &self.check {
            if self.update.contains(counter)
                && !(other.check.contains(counter) && other.update.contains(counter))
            {
                return false;
            }
        }
        for counter in &other.check {
            if other.update.contains(counter)
                && !(self.check.contains(counter) && self.update.contains(counter))
            {
                return false;
            }
        }
        true
    }
}

struct Determinizer<'a> {
    nfa: &'a Nfa,
    factory: &'a ExecutorFactory,
    nodes: Vec<DfaNode>,
    counters: Vec<CounterDef>,
    mapping: HashMap<usize, usize>,
}

impl Determinizer<'_> {
    /// Determinize the closure of one node, memoized per node.
    fn closure(&mut self, root: usize) -> Result<usize> {
        if let Some(&existing) = self.mapping.get(&root) {
            return Ok(existing);
        }
        let dfa_id = self.nodes.len();
        let node = self.make_node(root)?;
        self.nodes.push(node);
        self.mapping.insert(root, dfa_id);

        // Breadth-first walk over epsilon edges, carrying the counter
        // record. Letter edges met along the way are verified here and
        // turned into jumps below, once per reachable node.
        let mut visited: IndexMap<usize, VisitedCounters> = IndexMap::new();
        let mut visited_by_letter: HashMap<usize, VisitedCounters> = HashMap::new();
        let mut came_from: HashMap<usize, (usize, Direction)> = HashMap::new();
        let mut queue: VecDeque<(usize, VisitedCounters)> = VecDeque::new();

        let mut initial = VisitedCounters::default();
        if let Some(update) = self.nfa.nodes[root].counter_to_update {
            initial.update.insert(update);
        }
        visited.insert(root, initial.clone());
        queue.push_back((root, initial));

        while let Some((current, record)) = queue.pop_front() {
            let check_here = self.nfa.nodes[current].counter_to_check;
            for edge in self.nfa.nodes[current].epsilon_edges.clone() {
                let mut copy = record.clone();
                if edge.direction == Direction::Forward {
                    if let Some(check) = check_here {
                        if !copy.update.contains(&check) {
                            copy.check.insert(check);
                        }
                    }
                }
                self.nodes[dfa_id].ignore_whitespace |=
                    self.nfa.nodes[edge.target].ignore_whitespace;
                if let Some(update) = self.nfa.nodes[edge.target].counter_to_update {
                    copy.update.insert(update);
                }
                if let Some(existing) = visited.get(&edge.target) {
                    if !copy.compatible(existing) {
                        return Err(Error::AmbiguousPaths);
                    }
                    continue;
                }
                queue.push_back((edge.target, copy.clone()));
                came_from.insert(edge.target, (current, edge.direction));
                visited.insert(edge.target, copy);
            }
            for edge in self.nfa.nodes[current].letter_edges.clone() {
                let mut copy = record.clone();
                if edge.direction == Direction::Forward {
                    if let Some(check) = check_here {
                        if !copy.update.contains(&check) {
                            copy.check.insert(check);
                        }
                    }
                }
                if let Some(update) = self.nfa.nodes[edge.target].counter_to_update {
                    copy.update.insert(update);
                }
                if let Some(existing) = visited_by_letter.get(&edge.target) {
                    if !copy.compatible(existing) {
                        return Err(Error::AmbiguousPaths);
                    }
                    continue;
                }
                visited_by_letter.insert(edge.target, copy);
            }
        }

        // The root's own letter edges carry only the target's counter.
        for edge in self.nfa.nodes[root].letter_edges.clone() {
            let updates: Vec<CounterId> = self.nfa.nodes[edge.target]
                .counter_to_update
                .into_iter()
                .collect();
            self.add_jump(dfa_id, &edge.letter, edge.target, &updates, &[])?;
        }

        // Every other closure member contributes its letter edges wrapped
        // with the counters accumulated on the path from the root to it.
        let reachable: Vec<usize> = visited.keys().copied().collect();
        for member in reachable {
            if member == root {
                continue;
            }
            let mut chain = Vec::new();
            let mut cursor = member;
            while cursor != root {
                let (parent, direction) = came_from[&cursor];
                chain.push((direction, cursor));
                cursor = parent;
            }
            chain.reverse();

            let mut updates: Vec<CounterId> = Vec::new();
            let mut checks: Vec<CounterId> = Vec::new();
            let mut current = root;
            for (direction, next) in chain {
                if let Some(update) = self.nfa.nodes[next].counter_to_update {
                    updates.push(update);
                }
                if direction == Direction::Forward {
                    if let Some(check) = self.nfa.nodes[current].counter_to_check {
                        checks.push(check);
                    }
                }
                for edge in self.nfa.nodes[next].letter_edges.clone() {
                    let mut all_updates = updates.clone();
                    if let Some(update) = self.nfa.nodes[edge.target].counter_to_update {
                        all_updates.push(update);
                    }
                    self.add_jump(dfa_id, &edge.letter, edge.target, &all_updates, &checks)?;
                }
                current = next;
            }
        }

        Ok(dfa_id)
    }

    /// Register one deterministic transition, verifying that repeated
    /// sightings of the same letter agree on the target.
    fn add_jump(
        &mut self,
        from: usize,
        letter: &Letter,
        target_nfa: usize,
        updates: &[CounterId],
        checks: &[CounterId],
    ) -> Result<()> {
        let target = self.closure(target_nfa)?;
        for &counter in updates {
            self.counters[counter]
                .element_names
                .insert(letter.name().to_string());
        }
        match self.nodes[from].jumps.entry(letter.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().target != target {
                    return Err(Error::ConflictingJumpTarget(letter.name().to_string()));
                }
                entry.get_mut().counters_to_update.extend(updates);
                entry.get_mut().counters_to_check.extend(checks);
            }
            Entry::Vacant(entry) => {
                let mut jump = Jump::new(target);
                jump.counters_to_update.extend(updates);
                jump.counters_to_check.extend(checks);
                entry.insert(jump);
            }
        }
        Ok(())
    }

    /// Materialize a deterministic node from the closure's root, building
    /// the value executors.
    fn make_node(&self, root: usize) -> Result<DfaNode> {
        let source = &self.nfa.nodes[root];
        let mut allowed_attributes = IndexMap::new();
        for (name, ty) in &source.allowed_attributes {
            let executor = match ty {
                Some(ty) => Some(self.factory.build(ty)?),
                None => None,
            };
            allowed_attributes.insert(name.clone(), executor);
        }
        let inner_text_executor = match &source.inner_text_type {
            Some(ty) => Some(self.factory.build(ty)?),
            None => None,
        };
        Ok(DfaNode {
            depth: source.depth,
            allowed_attributes,
            required_attributes: source.required_attributes.clone(),
            inner_text_executor,
            any_type: source.any_type,
            ignore_whitespace: source.ignore_whitespace,
            jumps: IndexMap::new(),
            opening_node: None,
        })
    }
}

/// Record, on every state with a close transition, which state was current
/// when the subtree being closed was opened.
fn resolve_opening_nodes(nodes: &mut [DfaNode], start: usize) {
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    visit(nodes, start, &mut path, &mut visited);

    fn visit(
        nodes: &mut [DfaNode],
        id: usize,
        path: &mut Vec<usize>,
        visited: &mut HashSet<usize>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let jumps: Vec<(Letter, usize)> = nodes[id]
            .jumps
            .iter()
            .map(|(letter, jump)| (letter.clone(), jump.target))
            .collect();
        for (letter, next) in jumps {
            if letter.is_open() {
                path.push(next);
                visit(nodes, next, path, visited);
                path.pop();
            } else {
                let opening = path
                    .pop()
                    .expect("close transition reached outside any open element");
                if let Some(existing) = nodes[id].opening_node {
                    assert_eq!(
                        existing, opening,
                        "close transition has conflicting opening nodes"
                    );
                }
                nodes[id].opening_node = Some(opening);
                visit(nodes, next, path, visited);
                path.push(opening);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::XS_STRING;
    use crate::schema::types::{ComplexType, ContentItem, ElementItem, GroupItem};
    use crate::schema::Occurs;

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

    fn wrap(name: &str, children: Vec<ContentItem>) -> ContentItem {
        ContentItem::Element(ElementItem {
            name: name.to_string(),
            ty: Some(complex_root(children)),
            occurs: Occurs::once(),
            fixed: None,
        })
    }

    #[test]
    fn test_sequence_compiles_deterministically() {
        let root = complex_root(vec![wrap(
            "root",
            vec![element("a", Occurs::once()), element("b", Occurs::once())],
        )]);
        let dfa = Dfa::compile(Some(&root)).unwrap();

        let start = &dfa.nodes[dfa.start];
        assert_eq!(start.jumps.len(), 1);
        let jump = &start.jumps[&Letter::Open("root".to_string())];
        let inside = &dfa.nodes[jump.target];
        assert!(inside.jumps.contains_key(&Letter::Open("a".to_string())));
        assert!(!inside.jumps.contains_key(&Letter::Open("b".to_string())));
    }

    #[test]
    fn test_optional_element_exposes_both_transitions() {
        let root = complex_root(vec![wrap(
            "root",
            vec![
                element("a", Occurs::optional()),
                element("b", Occurs::once()),
            ],
        )]);
        let dfa = Dfa::compile(Some(&root)).unwrap();
        let jump = &dfa.nodes[dfa.start].jumps[&Letter::Open("root".to_string())];
        let inside = &dfa.nodes[jump.target];
        assert!(inside.jumps.contains_key(&Letter::Open("a".to_string())));
        assert!(inside.jumps.contains_key(&Letter::Open("b".to_string())));
    }

    #[test]
    fn test_counted_repetition_carries_counters() {
        let root = complex_root(vec![wrap(
            "root",
            vec![element("a", Occurs::new(2, Some(3)).unwrap())],
        )]);
        let dfa = Dfa::compile(Some(&root)).unwrap();
        assert_eq!(dfa.counters.len(), 1);
        assert_eq!(
            dfa.counters[0].element_names.iter().collect::<Vec<_>>(),
            ["a"]
        );

        let jump = &dfa.nodes[dfa.start].jumps[&Letter::Open("root".to_string())];
        let inside = &dfa.nodes[jump.target];
        let open_a = &inside.jumps[&Letter::Open("a".to_string())];
        assert!(open_a.counters_to_update.contains(&0));
    }

    #[test]
    fn test_conflicting_choice_alternatives_rejected() {
        // both alternatives start with the same element name
        let root = complex_root(vec![wrap(
            "root",
            vec![ContentItem::Choice(GroupItem {
                items: vec![
                    ContentItem::Sequence(GroupItem {
                        items: vec![element("a", Occurs::once()), element("b", Occurs::once())],
                        occurs: Occurs::once(),
                    }),
                    ContentItem::Sequence(GroupItem {
                        items: vec![element("a", Occurs::once()), element("c", Occurs::once())],
                        occurs: Occurs::once(),
                    }),
                ],
                occurs: Occurs::once(),
            })],
        )]);
        assert!(matches!(
            Dfa::compile(Some(&root)),
            Err(Error::ConflictingJumpTarget(name)) if name == "a"
        ));
    }

    #[test]
    fn test_disjoint_choice_accepted() {
        let root = complex_root(vec![wrap(
            "root",
            vec![ContentItem::Choice(GroupItem {
                items: vec![element("a", Occurs::once()), element("b", Occurs::once())],
                occurs: Occurs::once(),
            })],
        )]);
        let dfa = Dfa::compile(Some(&root)).unwrap();
        let jump = &dfa.nodes[dfa.start].jumps[&Letter::Open("root".to_string())];
        let inside = &dfa.nodes[jump.target];
        assert!(inside.jumps.contains_key(&Letter::Open("a".to_string())));
        assert!(inside.jumps.contains_key(&Letter::Open("b".to_string())));
    }

    #[test]
    fn test_opening_nodes_resolved() {
        let root = complex_root(vec![wrap("root", vec![element("a", Occurs::once())])]);
        let dfa = Dfa::compile(Some(&root)).unwrap();
        for (id, node) in dfa.nodes.iter().enumerate() {
            for letter in node.jumps.keys() {
                if !letter.is_open() {
                    assert!(
                        node.opening_node.is_some(),
                        "node {} has a close transition but no opening node",
                        id
                    );
                }
            }
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let build = || {
            let root = complex_root(vec![wrap(
                "root",
                vec![
                    element("a", Occurs::new(1, Some(2)).unwrap()),
                    element("b", Occurs::optional()),
                ],
            )]);
            let dfa = Dfa::compile(Some(&root)).unwrap();
            dfa.nodes
                .iter()
                .map(|node| {
                    node.jumps
                        .iter()
                        .map(|(letter, jump)| (letter.to_string(), jump.target))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
