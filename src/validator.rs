//! Event-stream validator
//!
//! [`SchemaValidator`] wraps a [`SchemaAutomaton`] with the per-element
//! bookkeeping the automaton itself does not carry: skipping the inside of
//! any-type subtrees, checking required attributes exactly once per
//! element, and firing an empty-text check for text-typed elements that
//! closed without any text event (so required-value and minimum-length
//! facets still apply to `<e/>`).
//!
//! Each event method returns the diagnostics the event produced, already
//! position-tagged.

use crate::automaton::{CompiledSchema, SchemaAutomaton};
use crate::diagnostics::{Position, SchemaDiagnostic};

/// Per-element completion flags
#[derive(Default)]
struct ElementFrame {
    attributes_checked: bool,
    text_checked: bool,
}

/// Drives a schema automaton from document events
pub struct SchemaValidator {
    automaton: SchemaAutomaton,
    frames: Vec<ElementFrame>,
    /// Depth inside an any-type subtree; events are dropped while > 0
    skip_depth: u32,
}

impl SchemaValidator {
    /// Create a validator for one compiled schema
    pub fn new(schema: &CompiledSchema) -> Self {
        Self {
            automaton: schema.automaton(),
            frames: Vec::new(),
            skip_depth: 0,
        }
    }

    /// An element opens
    pub fn start_element(&mut self, name: &str, position: Position) -> Vec<SchemaDiagnostic> {
        self.automaton.set_position(position);
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Vec::new();
        }
        let mut diagnostics = Vec::new();
        self.check_pending_attributes(&mut diagnostics);
        diagnostics.extend(self.automaton.start_element(name));
        self.frames.push(ElementFrame::default());
        if self.automaton.in_any_type_state() {
            self.skip_depth = 1;
        }
        diagnostics
    }

    /// One attribute of the open element
    pub fn read_attribute(
        &mut self,
        name: &str,
        value: &str,
        position: Position,
    ) -> Vec<SchemaDiagnostic> {
        self.automaton.set_position(position);
        if self.skip_depth > 0 {
            return Vec::new();
        }
        self.automaton.read_attribute(name, value).into_iter().collect()
    }

    /// All attributes of the open element have been read
    pub fn done_attributes(&mut self) -> Vec<SchemaDiagnostic> {
        if self.skip_depth > 0 {
            return Vec::new();
        }
        let mut diagnostics = Vec::new();
        self.check_pending_attributes(&mut diagnostics);
        diagnostics
    }

    /// Text content
    pub fn read_text(&mut self, text: &str, position: Position) -> Vec<SchemaDiagnostic> {
        self.automaton.set_position(position);
        if self.skip_depth > 0 {
            return Vec::new();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.text_checked = true;
        }
        self.automaton.read_text(text).into_iter().collect()
    }

    /// Whitespace-only content
    pub fn read_whitespace(&mut self, whitespace: &str, position: Position) -> Vec<SchemaDiagnostic> {
        self.automaton.set_position(position);
        if self.skip_depth > 0 || self.frames.is_empty() {
            return Vec::new();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.text_checked = true;
        }
        self.automaton.read_whitespace(whitespace).into_iter().collect()
    }

    /// The element closes
    pub fn end_element(&mut self, position: Position) -> Vec<SchemaDiagnostic> {
        self.automaton.set_position(position);
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            if self.skip_depth > 0 {
                return Vec::new();
            }
        }
        let mut diagnostics = Vec::new();
        if let Some(frame) = self.frames.pop() {
            if !frame.attributes_checked {
                diagnostics.extend(self.automaton.check_required_attributes());
            }
            if !frame.text_checked && self.automaton.has_text() {
                diagnostics.extend(self.automaton.read_text(""));
            }
        }
        diagnostics.extend(self.automaton.end_element());
        diagnostics
    }

    /// Return to the initial state for the next document
    pub fn reset(&mut self) {
        self.automaton.reset();
        self.frames.clear();
        self.skip_depth = 0;
    }

    /// Check the innermost element's required attributes once
    fn check_pending_attributes(&mut self, diagnostics: &mut Vec<SchemaDiagnostic>) {
        if let Some(frame) = self.frames.last_mut() {
            if !frame.attributes_checked {
                diagnostics.extend(self.automaton.check_required_attributes());
                frame.attributes_checked = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtins::XS_STRING;
    use crate::schema::types::{AttributeDecl, ComplexType, ContentItem, ElementItem};
    use crate::schema::{Occurs, Restriction, SchemaType, SimpleType};
    use std::sync::Arc;

    fn pos() -> Position {
        Position::default()
    }

    fn compile(root_children: Vec<ContentItem>, attributes: Vec<AttributeDecl>) -> CompiledSchema {
        let root_type = SchemaType::Complex(Arc::new(ComplexType {
            name: "rootType".to_string(),
            base: None,
            children: root_children,
            attributes,
            description: Vec::new(),
        }));
        let schema = SchemaType::Complex(Arc::new(ComplexType {
            name: "schema".to_string(),
            base: None,
            children: vec![ContentItem::Element(ElementItem {
                name: "root".to_string(),
                ty: Some(root_type),
                occurs: Occurs::once(),
                fixed: None,
            })],
            attributes: Vec::new(),
            description: Vec::new(),
        }));
        CompiledSchema::compile(Some(&schema)).unwrap()
    }

    #[test]
    fn test_any_type_subtree_is_skipped() {
        // <anything> is declared without a type
        let compiled = compile(
            vec![ContentItem::Element(ElementItem {
                name: "anything".to_string(),
                ty: None,
                occurs: Occurs::once(),
                fixed: None,
            })],
            Vec::new(),
        );
        let mut validator = SchemaValidator::new(&compiled);
        let mut diagnostics = Vec::new();
        diagnostics.extend(validator.start_element("root", pos()));
        diagnostics.extend(validator.start_element("anything", pos()));
        diagnostics.extend(validator.start_element("unknown", pos()));
        diagnostics.extend(validator.read_attribute("whatever", "x", pos()));
        diagnostics.extend(validator.read_text("free text", pos()));
        diagnostics.extend(validator.end_element(pos()));
        diagnostics.extend(validator.end_element(pos()));
        diagnostics.extend(validator.end_element(pos()));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_missing_attribute_reported_once_without_done_attributes() {
        let compiled = compile(
            Vec::new(),
            vec![AttributeDecl {
                name: "id".to_string(),
                ty: Some(Arc::clone(&XS_STRING)),
                required: true,
                fixed: None,
            }],
        );
        let mut validator = SchemaValidator::new(&compiled);
        let mut diagnostics = Vec::new();
        diagnostics.extend(validator.start_element("root", pos()));
        // no done_attributes() call; the check fires at element end
        diagnostics.extend(validator.end_element(pos()));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_empty_text_element_gets_value_check() {
        let required_text = Arc::new(SimpleType::derived(
            "requiredText",
            Some(Arc::clone(&XS_STRING)),
            Restriction {
                min_length: Some(1),
                ..Restriction::default()
            },
        ));
        let compiled = compile(
            vec![ContentItem::Element(ElementItem {
                name: "value".to_string(),
                ty: Some(SchemaType::Simple(required_text)),
                occurs: Occurs::once(),
                fixed: None,
            })],
            Vec::new(),
        );
        let mut validator = SchemaValidator::new(&compiled);
        let mut diagnostics = Vec::new();
        diagnostics.extend(validator.start_element("root", pos()));
        diagnostics.extend(validator.start_element("value", pos()));
        // <value/> closes without any text event
        diagnostics.extend(validator.end_element(pos()));
        diagnostics.extend(validator.end_element(pos()));
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0].kind,
            crate::diagnostics::DiagnosticKind::EmptyValue { .. }
        ));
    }

    #[test]
    fn test_reset_between_documents() {
        let compiled = compile(Vec::new(), Vec::new());
        let mut validator = SchemaValidator::new(&compiled);
        for _ in 0..2 {
            let mut diagnostics = Vec::new();
            diagnostics.extend(validator.start_element("root", pos()));
            diagnostics.extend(validator.end_element(pos()));
            assert!(diagnostics.is_empty());
            validator.reset();
        }
    }
}
