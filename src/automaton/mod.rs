//! The schema automaton engine
//!
//! Compilation runs in three stages: the type tree becomes a
//! non-deterministic graph ([`nfa`]), the graph is determinized by epsilon
//! closure ([`dfa`]), and the result is executed incrementally against
//! document events ([`runtime`]). The compiled automaton is immutable and
//! shared; every validation pass gets its own cheap runtime instance.

mod counter;
mod dfa;
mod nfa;
mod runtime;

pub use counter::{CounterDef, CounterId};
pub use runtime::{CompiledSchema, SchemaAutomaton};
