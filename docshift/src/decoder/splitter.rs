use std::collections::VecDeque;

use crate::bail;
use crate::error::{ErrorKind, TransformResult};
use crate::types::{ContainerShape, Document};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Events produced by [`JsonSplitter`] in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitEvent {
    /// The container shape, always the first event.
    Shape(ContainerShape),
    /// A complete top-level document.
    Document(Document),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing but whitespace (or a byte-order mark) seen so far.
    Start,
    /// Inside the array, before the first element or the closing bracket.
    ArrayOpen,
    /// Inside the array, after a comma.
    ArrayElement,
    /// Inside the array, after an element.
    ArrayDelimiter,
    /// Inside a document, either top-level or an array element.
    InDocument { nested_in_array: bool },
    /// The top-level value is complete; only whitespace may follow.
    Done,
}

/// Push-based splitter turning a JSON byte stream into documents.
///
/// Bytes are fed in arbitrary chunks. The splitter tracks string and nesting state to find where
/// each top-level document ends, buffering only the document currently being read, and hands the
/// complete slice to `serde_json` for the actual parse.
#[derive(Debug)]
pub struct JsonSplitter {
    state: State,
    document: Vec<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    bom_matched: usize,
    leading: usize,
    documents: usize,
}

impl JsonSplitter {
    /// Creates a splitter positioned at the start of a source.
    pub fn new() -> Self {
        Self {
            state: State::Start,
            document: Vec::new(),
            depth: 0,
            in_string: false,
            escaped: false,
            bom_matched: 0,
            leading: 0,
            documents: 0,
        }
    }

    /// Returns the number of documents emitted so far.
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Feeds a chunk of bytes, pushing every event it completes onto `events`.
    ///
    /// On error, events completed earlier in the same chunk are still in `events`.
    pub fn feed(&mut self, chunk: &[u8], events: &mut VecDeque<SplitEvent>) -> TransformResult<()> {
        for &byte in chunk {
            self.push_byte(byte, events)?;
        }

        Ok(())
    }

    /// Signals the end of the source.
    pub fn finish(&mut self) -> TransformResult<()> {
        match self.state {
            State::Done => Ok(()),
            State::Start => bail!(ErrorKind::ParseError, "Source contains no JSON value"),
            State::ArrayOpen | State::ArrayElement | State::ArrayDelimiter => bail!(
                ErrorKind::ParseError,
                "Unexpected end of source inside the top-level array",
                format!("{} documents were read before the source ended", self.documents)
            ),
            State::InDocument { .. } => bail!(
                ErrorKind::ParseError,
                "Unexpected end of source inside a document",
                format!("document #{} is incomplete", self.documents + 1)
            ),
        }
    }

    fn push_byte(&mut self, byte: u8, events: &mut VecDeque<SplitEvent>) -> TransformResult<()> {
        match self.state {
            State::Start => {
                if self.skip_bom(byte)? || is_json_whitespace(byte) {
                    return Ok(());
                }

                match byte {
                    b'[' => {
                        events.push_back(SplitEvent::Shape(ContainerShape::Array));
                        self.state = State::ArrayOpen;
                    }
                    b'{' => {
                        events.push_back(SplitEvent::Shape(ContainerShape::Single));
                        self.begin_document(byte, false);
                    }
                    other => bail!(
                        ErrorKind::ParseError,
                        "Source must be a JSON object or an array of objects",
                        format!("unexpected leading character `{}`", other.escape_ascii())
                    ),
                }
            }
            State::ArrayOpen | State::ArrayElement => {
                if is_json_whitespace(byte) {
                    return Ok(());
                }

                match byte {
                    b'{' => self.begin_document(byte, true),
                    b']' if self.state == State::ArrayOpen => self.state = State::Done,
                    b']' => bail!(
                        ErrorKind::ParseError,
                        "Trailing comma in the top-level array",
                        format!("after document #{}", self.documents)
                    ),
                    other => bail!(
                        ErrorKind::ParseError,
                        "Array elements must be JSON objects",
                        format!(
                            "element #{} starts with `{}`",
                            self.documents + 1,
                            other.escape_ascii()
                        )
                    ),
                }
            }
            State::ArrayDelimiter => {
                if is_json_whitespace(byte) {
                    return Ok(());
                }

                match byte {
                    b',' => self.state = State::ArrayElement,
                    b']' => self.state = State::Done,
                    other => bail!(
                        ErrorKind::ParseError,
                        "Expected `,` or `]` between array elements",
                        format!(
                            "found `{}` after document #{}",
                            other.escape_ascii(),
                            self.documents
                        )
                    ),
                }
            }
            State::InDocument { nested_in_array } => {
                self.document.push(byte);

                if self.scan_document_byte(byte) {
                    events.push_back(SplitEvent::Document(self.complete_document()?));
                    self.state = if nested_in_array {
                        State::ArrayDelimiter
                    } else {
                        State::Done
                    };
                }
            }
            State::Done => {
                if !is_json_whitespace(byte) {
                    bail!(
                        ErrorKind::ParseError,
                        "Unexpected data after the top-level JSON value",
                        format!("found `{}`", byte.escape_ascii())
                    );
                }
            }
        }

        Ok(())
    }

    /// Consumes bytes of a UTF-8 byte-order mark at the very start of the source.
    fn skip_bom(&mut self, byte: u8) -> TransformResult<bool> {
        let at_bom = self.leading == self.bom_matched && self.bom_matched < UTF8_BOM.len();
        self.leading = self.leading.saturating_add(1);

        if !at_bom {
            return Ok(false);
        }

        if byte == UTF8_BOM[self.bom_matched] {
            self.bom_matched += 1;
            return Ok(true);
        }

        if self.bom_matched > 0 {
            bail!(
                ErrorKind::ParseError,
                "Source starts with an incomplete byte-order mark",
                format!("found `{}` after {} bom bytes", byte.escape_ascii(), self.bom_matched)
            );
        }

        Ok(false)
    }

    fn begin_document(&mut self, opening: u8, nested_in_array: bool) {
        self.document.clear();
        self.document.push(opening);
        self.depth = 1;
        self.in_string = false;
        self.escaped = false;
        self.state = State::InDocument { nested_in_array };
    }

    /// Updates nesting state for one document byte, returning `true` when the document closes.
    fn scan_document_byte(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }

            return false;
        }

        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }

        false
    }

    fn complete_document(&mut self) -> TransformResult<Document> {
        self.documents += 1;
        let document = serde_json::from_slice::<Document>(&self.document).map_err(|err| {
            crate::transform_error!(
                ErrorKind::ParseError,
                "Malformed document in source",
                format!("document #{}: {err}", self.documents),
                source: err
            )
        });
        self.document.clear();

        document
    }
}

impl Default for JsonSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whitespace allowed between JSON tokens: space, tab, line feed and carriage return.
fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn split(input: &str) -> (Vec<SplitEvent>, TransformResult<()>) {
        let mut splitter = JsonSplitter::new();
        let mut events = VecDeque::new();
        let result = splitter
            .feed(input.as_bytes(), &mut events)
            .and_then(|_| splitter.finish());

        (events.into_iter().collect(), result)
    }

    fn document(value: serde_json::Value) -> SplitEvent {
        match value {
            serde_json::Value::Object(map) => SplitEvent::Document(map),
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn splits_an_array_of_documents() {
        let (events, result) = split(r#" [ {"a": 1}, {"b": {"c": [1, 2]}} ] "#);

        result.unwrap();
        assert_eq!(
            events,
            vec![
                SplitEvent::Shape(ContainerShape::Array),
                document(json!({"a": 1})),
                document(json!({"b": {"c": [1, 2]}})),
            ]
        );
    }

    #[test]
    fn single_document_source() {
        let (events, result) = split("\u{feff}{\"_id\": \"x\", \"n\": null}\n");

        result.unwrap();
        assert_eq!(
            events,
            vec![
                SplitEvent::Shape(ContainerShape::Single),
                document(json!({"_id": "x", "n": null})),
            ]
        );
    }

    #[test]
    fn brackets_inside_strings_do_not_count() {
        let (events, result) = split(r#"[{"s": "}]\"{["}]"#);

        result.unwrap();
        assert_eq!(events[1], document(json!({"s": "}]\"{["})));
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let input = r#"[{"name": "Ada \"the first\""}, {"name": "Lin"}]"#;
        let mut splitter = JsonSplitter::new();
        let mut events = VecDeque::new();

        for byte in input.as_bytes() {
            splitter.feed(std::slice::from_ref(byte), &mut events).unwrap();
        }
        splitter.finish().unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(splitter.documents(), 2);
    }

    #[test]
    fn empty_array_has_shape_and_no_documents() {
        let (events, result) = split("[\n]");

        result.unwrap();
        assert_eq!(events, vec![SplitEvent::Shape(ContainerShape::Array)]);
    }

    #[test]
    fn documents_before_a_syntax_error_are_kept() {
        let (events, result) = split(r#"[{"a": 1}, {"b": 2} {"c": 3}]"#);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::ParseError);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn malformed_sources_are_parse_errors() {
        for input in [
            "",
            "   ",
            "42",
            "[1, 2]",
            "[{\"a\": 1},]",
            "[{\"a\": 1}",
            "{\"a\": ",
            "{\"a\": 1} {\"b\": 2}",
            "[{\"a\": tru}]",
            "[{\"a\": [1}]",
            "[\x0c{\"a\": 1}\x0c]\x0c",
            "{\"a\": 1}\x0c",
            "  \u{feff}{\"a\": 1}",
            "[\u{feff}{\"a\": 1}]",
        ] {
            let (_, result) = split(input);
            let err = result.expect_err(input);
            assert_eq!(err.kind(), ErrorKind::ParseError, "input: {input:?}");
        }
    }
}
