use std::fmt;

use serde_json::{Map, Value};

/// Name of the field holding a document's primary key.
pub const IDENTIFIER_FIELD: &str = "_id";

/// A single document: an ordered mapping of field names to JSON values.
///
/// Field order is preserved from the source so rewritten documents diff cleanly against it.
pub type Document = Map<String, Value>;

/// Returns `true` if `document` already carries an identifier.
pub fn has_identifier(document: &Document) -> bool {
    document.contains_key(IDENTIFIER_FIELD)
}

/// Whether a JSON source holds one document or an array of documents.
///
/// Determined once from the first structural token of the source and fixes how the output is
/// bracketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    /// The source is a single top-level document.
    Single,
    /// The source is a top-level array of documents.
    Array,
}

impl fmt::Display for ContainerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerShape::Single => f.write_str("single"),
            ContainerShape::Array => f.write_str("array"),
        }
    }
}
