//! Occurrence counters
//!
//! A repeatable group whose bounds cannot be expressed by the graph alone
//! (`minOccurs > 1` or a finite `maxOccurs > 1`) gets a counter. The
//! definition lives in the compiled automaton; the per-pass counts live in
//! the runtime state and are addressed by [`CounterId`].

use std::collections::BTreeSet;

/// Index of a counter definition within the automaton
pub type CounterId = usize;

/// The compile-time definition of one occurrence counter
#[derive(Debug, Clone)]
pub struct CounterDef {
    /// The counter's index
    pub id: CounterId,
    /// Fewest repetitions allowed when the group is left
    pub min: u32,
    /// Most repetitions allowed (None = unbounded)
    pub max: Option<u32>,
    /// Element names whose transitions update this counter; collected
    /// during determinization and used in occurrence diagnostics
    pub element_names: BTreeSet<String>,
}

impl CounterDef {
    /// Create a definition with no recorded element names yet
    pub fn new(id: CounterId, min: u32, max: Option<u32>) -> Self {
        Self {
            id,
            min,
            max,
            element_names: BTreeSet::new(),
        }
    }
}
