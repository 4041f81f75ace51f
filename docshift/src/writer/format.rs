use docshift_config::shared::IndentConfig;
use serde::Serialize;
use serde_json::ser::{CompactFormatter, PrettyFormatter};

use crate::error::{ErrorKind, TransformResult};
use crate::transform_error;

/// Serializes documents with a configured indentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFormat {
    indent: String,
}

impl DocumentFormat {
    /// Creates a format for `indent`.
    pub fn new(indent: IndentConfig) -> Self {
        Self {
            indent: indent.as_indent_str(),
        }
    }

    /// Returns the string inserted once per nesting level, empty when compact.
    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Serializes `value` as a top-level JSON value.
    pub fn serialize<T>(&self, value: &T) -> TransformResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let mut out = Vec::with_capacity(128);

        let result = if self.indent.is_empty() {
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, CompactFormatter);
            value.serialize(&mut serializer)
        } else {
            let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
            value.serialize(&mut serializer)
        };

        result.map_err(|err| {
            transform_error!(
                ErrorKind::SerializationError,
                "Document could not be serialized",
                err.to_string(),
                source: err
            )
        })?;

        Ok(out)
    }

    /// Serializes `value` one level deep, as an element of a top-level array.
    ///
    /// Every line, the first included, is prefixed by the indent string. Serialized JSON never
    /// holds a raw newline inside a string, so splitting on newlines only touches structure.
    pub fn serialize_nested<T>(&self, value: &T) -> TransformResult<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        let serialized = self.serialize(value)?;
        if self.indent.is_empty() {
            return Ok(serialized);
        }

        let lines = serialized.iter().filter(|&&byte| byte == b'\n').count() + 1;
        let mut out = Vec::with_capacity(serialized.len() + lines * self.indent.len());

        out.extend_from_slice(self.indent.as_bytes());
        for byte in serialized {
            out.push(byte);
            if byte == b'\n' {
                out.extend_from_slice(self.indent.as_bytes());
            }
        }

        Ok(out)
    }
}

impl Default for DocumentFormat {
    fn default() -> Self {
        Self::new(IndentConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pretty_prints_with_the_configured_indent() {
        let format = DocumentFormat::new(IndentConfig::Spaces(4));

        let out = format.serialize(&json!({"a": {"b": [1]}})).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\n    \"a\": {\n        \"b\": [\n            1\n        ]\n    }\n}"
        );
    }

    #[test]
    fn nested_documents_are_shifted_one_level() {
        let format = DocumentFormat::new(IndentConfig::Tab);

        let out = format.serialize_nested(&json!({"a": 1})).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "\t{\n\t\t\"a\": 1\n\t}");
    }

    #[test]
    fn newlines_inside_strings_stay_escaped() {
        let format = DocumentFormat::default();

        let out = format.serialize_nested(&json!({"text": "one\ntwo"})).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "  {\n    \"text\": \"one\\ntwo\"\n  }"
        );
    }

    #[test]
    fn oversized_indent_uses_the_widest_supported_width() {
        let indent: IndentConfig = "100000000000000".parse().unwrap();
        let format = DocumentFormat::new(indent);

        assert_eq!(format.indent(), " ".repeat(IndentConfig::MAX_WIDTH));

        let out = format.serialize(&json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n          \"a\": 1\n}");
    }

    #[test]
    fn compact_format_has_no_whitespace() {
        let format = DocumentFormat::new(IndentConfig::None);

        let out = format.serialize_nested(&json!({"a": [1, 2], "b": null})).unwrap();

        assert_eq!(out, br#"{"a":[1,2],"b":null}"#);
    }
}
