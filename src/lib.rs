//! # xsd-automaton
//!
//! Streaming validation of XML documents against XSD content models.
//!
//! A schema compiles once into an immutable deterministic automaton; each
//! document is then validated one SAX-like event at a time, producing
//! precise, position-tagged diagnostics instead of a single pass/fail
//! verdict. After an error the automaton repositions itself at the nearest
//! consistent state and keeps going, so one broken subtree does not hide
//! findings in the rest of the document.
//!
//! ## Example
//!
//! ```rust
//! use xsd_automaton::Schema;
//!
//! # fn main() -> xsd_automaton::Result<()> {
//! let schema = Schema::parse(
//!     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!          <xs:element name="greeting" type="xs:string"/>
//!        </xs:schema>"#,
//! )?;
//!
//! assert!(schema.is_valid("<greeting>hello</greeting>")?);
//!
//! for diagnostic in schema.validate_str("<greeting><oops/></greeting>")? {
//!     println!("{}", diagnostic);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Unsupported schema shapes (`xs:all`, mixed content, alternatives that
//! are not letter-disjoint) are rejected when the schema is compiled, not
//! silently misvalidated.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod automaton;
pub mod checker;
pub mod diagnostics;
pub mod error;
pub mod executors;
pub mod schema;
pub mod validator;

// Re-exports for convenience
pub use automaton::{CompiledSchema, SchemaAutomaton};
pub use checker::{check_document, Schema};
pub use diagnostics::{DiagnosticKind, Position, SchemaDiagnostic};
pub use error::{Error, Result};
pub use validator::SchemaValidator;

/// Version of the xsd-automaton library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
