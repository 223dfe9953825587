//! Streaming document driver
//!
//! Feeds a validator from raw XML: tags, attributes, text and whitespace
//! become validator events tagged with line:column positions computed from
//! the reader's byte offsets. The driver owns all I/O concerns; the
//! automaton never sees bytes.
//!
//! [`Schema`] bundles the schema parser, the compiled automaton and the
//! driver into the one-call surface most callers want.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::automaton::CompiledSchema;
use crate::diagnostics::{Position, SchemaDiagnostic};
use crate::error::{Error, Result};
use crate::schema::{parse_schema, SchemaType};
use crate::validator::SchemaValidator;

/// Maps byte offsets to line:column positions
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(offset, _)| offset + 1),
        );
        Self { line_starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Position::new(line as u64, column as u64)
    }
}

/// Validate one document against an existing validator, collecting every
/// diagnostic. The validator is reset first, so it can be reused across
/// documents.
pub fn check_document(
    xml: &str,
    validator: &mut SchemaValidator,
) -> Result<Vec<SchemaDiagnostic>> {
    validator.reset();
    let index = LineIndex::new(xml);
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut diagnostics = Vec::new();
    let mut buf = Vec::new();

    loop {
        let offset = reader.buffer_position();
        let position = index.position(offset);
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = element_name(e.name().as_ref())?;
                diagnostics.extend(validator.start_element(&name, position));
                read_attributes(&e, position, validator, &mut diagnostics)?;
                diagnostics.extend(validator.done_attributes());
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(e.name().as_ref())?;
                diagnostics.extend(validator.start_element(&name, position));
                read_attributes(&e, position, validator, &mut diagnostics)?;
                diagnostics.extend(validator.done_attributes());
                diagnostics.extend(validator.end_element(position));
            }
            Ok(Event::End(_)) => {
                diagnostics.extend(validator.end_element(position));
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::Xml(format!("failed to unescape text: {}", e)))?;
                if text.trim().is_empty() {
                    if !text.is_empty() {
                        diagnostics.extend(validator.read_whitespace(&text, position));
                    }
                } else {
                    diagnostics.extend(validator.read_text(&text, position));
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                diagnostics.extend(validator.read_text(&text, position));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {} // declarations, comments, processing instructions
            Err(e) => {
                return Err(Error::Xml(format!(
                    "error parsing XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        buf.clear();
    }

    Ok(diagnostics)
}

fn element_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| Error::Xml(format!("invalid element name: {}", e)))
}

fn read_attributes(
    start: &quick_xml::events::BytesStart<'_>,
    position: Position,
    validator: &mut SchemaValidator,
    diagnostics: &mut Vec<SchemaDiagnostic>,
) -> Result<()> {
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| Error::Xml(format!("failed to parse attribute: {}", e)))?;
        let name = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| Error::Xml(format!("invalid attribute name: {}", e)))?;
        // namespace declarations are not data attributes
        if name == "xmlns" || name.starts_with("xmlns:") {
            continue;
        }
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::Xml(format!("failed to unescape attribute value: {}", e)))?;
        diagnostics.extend(validator.read_attribute(name, &value, position));
    }
    Ok(())
}

/// A parsed and compiled schema, ready to validate documents
pub struct Schema {
    compiled: CompiledSchema,
}

impl Schema {
    /// Parse XSD markup and compile it
    pub fn parse(xsd: &str) -> Result<Self> {
        let root = parse_schema(xsd)?;
        let compiled = CompiledSchema::compile(Some(&SchemaType::Complex(root)))?;
        Ok(Self { compiled })
    }

    /// Read and compile a schema file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Create a validator instance for this schema
    pub fn validator(&self) -> SchemaValidator {
        SchemaValidator::new(&self.compiled)
    }

    /// Validate a document, returning every diagnostic found
    pub fn validate_str(&self, xml: &str) -> Result<Vec<SchemaDiagnostic>> {
        let mut validator = self.validator();
        check_document(xml, &mut validator)
    }

    /// Validate a document file
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<Vec<SchemaDiagnostic>> {
        self.validate_str(&std::fs::read_to_string(path)?)
    }

    /// Whether a document has no findings at all
    pub fn is_valid(&self, xml: &str) -> Result<bool> {
        Ok(self.validate_str(xml)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncde\n\nf");
        assert_eq!(index.position(0), Position::new(1, 1));
        assert_eq!(index.position(1), Position::new(1, 2));
        assert_eq!(index.position(3), Position::new(2, 1));
        assert_eq!(index.position(5), Position::new(2, 3));
        assert_eq!(index.position(7), Position::new(3, 1));
        assert_eq!(index.position(8), Position::new(4, 1));
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="root" type="xs:string"/>
               </xs:schema>"#,
        )
        .unwrap();
        assert!(matches!(
            schema.validate_str("<root><unclosed></root>"),
            Err(Error::Xml(_))
        ));
    }

    #[test]
    fn test_valid_document() {
        let schema = Schema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:element name="root" type="xs:string"/>
               </xs:schema>"#,
        )
        .unwrap();
        assert!(schema.is_valid("<root>hello</root>").unwrap());
        assert!(schema.is_valid("<?xml version=\"1.0\"?>\n<root>hi</root>").unwrap());
    }
}
