//! Validation diagnostics
//!
//! Every problem found in a document is reported as a [`SchemaDiagnostic`]:
//! a position plus a [`DiagnosticKind`] carrying the structured fields of
//! the finding. Message text is produced by the `Display` implementations;
//! consumers that need machine-readable output should match on the kind
//! rather than parse the rendered message.

use std::fmt;

/// A line/column position in the validated document (1-based as reported
/// by the document driver; 0 when the driver has no position information).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number
    pub line: u64,
    /// Column number
    pub column: u64,
}

impl Position {
    /// Create a position
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Whether a value diagnostic concerns an element's text or an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The text content of an element
    Element,
    /// An attribute value
    Attribute,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element => write!(f, "Element"),
            NodeKind::Attribute => write!(f, "Attribute"),
        }
    }
}

/// The restriction a value failed, with the declared facet value(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetRestriction {
    /// The value is not one of the enumerated alternatives
    Enumeration(Vec<String>),
    /// The value matches none of the declared patterns; carries the
    /// human-readable format description
    Pattern(String),
    /// More significant digits than allowed
    TotalDigits(u32),
    /// More fraction digits than allowed
    FractionDigits(u32),
    /// Above the inclusive upper bound
    MaxInclusive(String),
    /// Not strictly below the exclusive upper bound
    MaxExclusive(String),
    /// Below the inclusive lower bound
    MinInclusive(String),
    /// Not strictly above the exclusive lower bound
    MinExclusive(String),
}

impl FacetRestriction {
    /// The XSD facet name
    pub fn name(&self) -> &'static str {
        match self {
            FacetRestriction::Enumeration(_) => "enumeration",
            FacetRestriction::Pattern(_) => "pattern",
            FacetRestriction::TotalDigits(_) => "totalDigits",
            FacetRestriction::FractionDigits(_) => "fractionDigits",
            FacetRestriction::MaxInclusive(_) => "maxInclusive",
            FacetRestriction::MaxExclusive(_) => "maxExclusive",
            FacetRestriction::MinInclusive(_) => "minInclusive",
            FacetRestriction::MinExclusive(_) => "minExclusive",
        }
    }
}

impl fmt::Display for FacetRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetRestriction::Enumeration(values) => {
                write!(f, "the value must be one of: {}", values.join(", "))
            }
            FacetRestriction::Pattern(description) => {
                write!(f, "the value has a wrong format: {}", description)
            }
            FacetRestriction::TotalDigits(n) => {
                write!(f, "the number must have at most {} digits", n)
            }
            FacetRestriction::FractionDigits(n) => {
                write!(f, "the fraction part must have at most {} digits", n)
            }
            FacetRestriction::MaxInclusive(v) => write!(f, "the value must be at most {}", v),
            FacetRestriction::MaxExclusive(v) => {
                write!(f, "the value must be strictly less than {}", v)
            }
            FacetRestriction::MinInclusive(v) => write!(f, "the value must be at least {}", v),
            FacetRestriction::MinExclusive(v) => {
                write!(f, "the value must be strictly greater than {}", v)
            }
        }
    }
}

/// The finding itself. Structural kinds come from the content-model
/// automaton, attribute kinds from the attribute tables, value kinds from
/// the simple-type executors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An element was closed before all required content was seen
    IncompleteContent {
        /// The element whose content is incomplete, when known
        element: Option<String>,
        /// Element names that would have completed the content
        expected: Vec<String>,
    },
    /// A child element appeared that does not fit the content model at
    /// this point, while other children were still expected
    UnexpectedElement {
        /// The containing element, when known
        element: Option<String>,
        /// The offending child
        child: String,
        /// Element names allowed at this point
        expected: Vec<String>,
    },
    /// A child element appeared after the content model was already
    /// satisfied
    ExtraElement {
        /// The containing element, when known
        element: Option<String>,
        /// The offending child
        child: String,
    },
    /// A child element inside an element declared with no content at all
    LeafElementWithChild {
        /// The containing element
        element: String,
        /// The offending child
        child: String,
    },
    /// A child element inside an element declared to contain only text
    TextOnlyElementWithChild {
        /// The containing element
        element: String,
        /// The offending child
        child: String,
    },
    /// Text inside an element whose type declares no text content
    TextNotAllowed {
        /// The containing element
        element: String,
    },
    /// Whitespace inside an element that allows neither text nor ignorable
    /// whitespace
    WhitespaceNotAllowed {
        /// The containing element
        element: String,
    },
    /// An attribute not declared for the element
    UnknownAttribute {
        /// The offending attribute
        attribute: String,
    },
    /// A declared-required attribute that was not present
    MissingRequiredAttribute {
        /// The missing attribute
        attribute: String,
    },
    /// A value that is required to be non-empty but is empty
    EmptyValue {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
    },
    /// A value that does not parse as its declared type
    InvalidValue {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
        /// The offending value
        value: String,
        /// Human-readable name of the expected type
        expected_type: String,
    },
    /// A value whose length differs from the exact `length` facet
    LengthViolation {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
        /// The offending value
        value: String,
        /// The required length
        length: usize,
    },
    /// A value shorter than the `minLength` facet
    MinLengthViolation {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
        /// The offending value
        value: String,
        /// The minimum length
        min_length: usize,
    },
    /// A value longer than the `maxLength` facet
    MaxLengthViolation {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
        /// The offending value
        value: String,
        /// The maximum length
        max_length: usize,
    },
    /// A value that fails one of the remaining restriction facets
    FacetViolation {
        /// Element text or attribute value
        kind: NodeKind,
        /// Name of the element or attribute
        name: String,
        /// The offending value
        value: String,
        /// Which facet failed and its declared value(s)
        facet: FacetRestriction,
    },
}

/// A single position-tagged validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiagnostic {
    /// Where in the document the finding was made
    pub position: Position,
    /// What was found
    pub kind: DiagnosticKind,
}

impl SchemaDiagnostic {
    /// Create a diagnostic
    pub fn new(position: Position, kind: DiagnosticKind) -> Self {
        Self { position, kind }
    }
}

fn opt(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or_default()
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::IncompleteContent { element, expected } => write!(
                f,
                "The content of element '{}' is incomplete. Expected elements: '{}'.",
                opt(element),
                expected.join(", ")
            ),
            DiagnosticKind::UnexpectedElement {
                element,
                child,
                expected,
            } => write!(
                f,
                "Element '{}' contains an unexpected child element '{}', \
                 a required element '{2}' is missing or out of order. \
                 Expected child elements: '{2}'.",
                opt(element),
                child,
                expected.join(", ")
            ),
            DiagnosticKind::ExtraElement { element, child } => write!(
                f,
                "Element '{}' contains an extra child element '{}'.",
                opt(element),
                child
            ),
            DiagnosticKind::LeafElementWithChild { element, child } => write!(
                f,
                "Element '{}' cannot contain element '{}' because the element must be empty.",
                element, child
            ),
            DiagnosticKind::TextOnlyElementWithChild { element, child } => write!(
                f,
                "Element '{}' cannot contain element '{}' because the element \
                 may only contain text.",
                element, child
            ),
            DiagnosticKind::TextNotAllowed { element } => {
                write!(f, "Element '{}' cannot contain text.", element)
            }
            DiagnosticKind::WhitespaceNotAllowed { element } => write!(
                f,
                "Element '{}' cannot contain whitespace between its opening and closing tags.",
                element
            ),
            DiagnosticKind::UnknownAttribute { attribute } => {
                write!(f, "Attribute '{}' is not allowed.", attribute)
            }
            DiagnosticKind::MissingRequiredAttribute { attribute } => {
                write!(f, "Required attribute '{}' is missing.", attribute)
            }
            DiagnosticKind::EmptyValue { kind, name } => {
                write!(f, "{} '{}' is invalid: the value is empty.", kind, name)
            }
            DiagnosticKind::InvalidValue {
                kind,
                name,
                value,
                expected_type,
            } => write!(
                f,
                "{} '{}' is invalid: the value '{}' is not a valid {}.",
                kind, name, value, expected_type
            ),
            DiagnosticKind::LengthViolation {
                kind,
                name,
                value,
                length,
            } => write!(
                f,
                "{} '{}' is invalid: the length of '{}' must be exactly {}.",
                kind, name, value, length
            ),
            DiagnosticKind::MinLengthViolation {
                kind,
                name,
                value,
                min_length,
            } => write!(
                f,
                "{} '{}' is invalid: the length of '{}' must be at least {}.",
                kind, name, value, min_length
            ),
            DiagnosticKind::MaxLengthViolation {
                kind,
                name,
                value,
                max_length,
            } => write!(
                f,
                "{} '{}' is invalid: the length of '{}' must be at most {}.",
                kind, name, value, max_length
            ),
            DiagnosticKind::FacetViolation {
                kind,
                name,
                value,
                facet,
            } => write!(
                f,
                "{} '{}' is invalid: the value '{}' violates the '{}' restriction: {}.",
                kind,
                name,
                value,
                facet.name(),
                facet
            ),
        }
    }
}

impl fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.position, self.kind)
    }
}
