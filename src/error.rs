//! Error types for xsd-automaton
//!
//! This module defines the fatal error type used throughout the library.
//! Fatal errors abort schema compilation: they are schema-author or
//! programmer errors, never document problems. Document problems are
//! reported as recoverable [`SchemaDiagnostic`](crate::diagnostics::SchemaDiagnostic)
//! values instead and never pass through this type.

use thiserror::Error;

/// Result type alias using the xsd-automaton Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error raised while parsing a schema document or compiling it
/// into an automaton.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema document parsing error
    #[error("schema parse error: {0}")]
    SchemaParse(String),

    /// A content-model construct the automaton does not support (`all`,
    /// mixed content, list/union simple types)
    #[error("unsupported schema construct: {0}")]
    UnsupportedConstruct(String),

    /// Occurrence bounds with `minOccurs` greater than `maxOccurs`
    #[error("malformed occurrence bounds: minOccurs {min} is greater than maxOccurs {max}")]
    MalformedOccurs {
        /// Declared minimum
        min: u32,
        /// Declared maximum
        max: u32,
    },

    /// Two epsilon-closure paths reached the same automaton node with
    /// conflicting occurrence-counter obligations
    #[error("ambiguous schema: conflicting counter obligations in one closure")]
    AmbiguousPaths,

    /// One element name leads to two different automaton nodes from the
    /// same state
    #[error("unsupported schema: element '{0}' leads to different automaton nodes")]
    ConflictingJumpTarget(String),

    /// A repeatable group whose content can match the empty sequence
    #[error("unsupported schema: repeatable {0} group can match empty content")]
    ZeroWidthLoop(&'static str),

    /// An inconsistent simple-type restriction (bad facet value or
    /// facet combination)
    #[error("invalid restriction: {0}")]
    InvalidRestriction(String),

    /// An XSD pattern that does not translate to a valid regular expression
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern text
        pattern: String,
        /// Why compilation failed
        reason: String,
    },

    /// XML syntax error in a validated document
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
