use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::shared::ValidationError;

/// Indentation applied when serializing documents.
///
/// Purely a presentation setting, it never changes the documents themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "IndentValue")]
pub enum IndentConfig {
    /// Compact output, one document per line.
    None,
    /// Indent nested values by the given number of spaces.
    Spaces(usize),
    /// Indent nested values by one tab per level.
    Tab,
}

impl IndentConfig {
    /// Default indentation: two spaces.
    pub const DEFAULT: IndentConfig = IndentConfig::Spaces(2);

    /// Widest indentation in spaces; wider requests are clamped to it.
    pub const MAX_WIDTH: usize = 10;

    /// Returns the string inserted once per nesting level.
    pub fn as_indent_str(&self) -> String {
        match self {
            IndentConfig::None => String::new(),
            IndentConfig::Spaces(width) => " ".repeat((*width).min(Self::MAX_WIDTH)),
            IndentConfig::Tab => "\t".to_owned(),
        }
    }

    /// Returns `true` when documents are written without any whitespace.
    pub fn is_compact(&self) -> bool {
        matches!(self, IndentConfig::None)
    }

    /// Builds an indentation from a number of spaces, treating zero as compact and clamping the
    /// width to [`IndentConfig::MAX_WIDTH`].
    pub fn spaces(width: usize) -> Self {
        if width == 0 {
            IndentConfig::None
        } else {
            IndentConfig::Spaces(width.min(Self::MAX_WIDTH))
        }
    }
}

impl Default for IndentConfig {
    fn default() -> Self {
        IndentConfig::DEFAULT
    }
}

impl FromStr for IndentConfig {
    type Err = ValidationError;

    /// Parses `tabs` (or `tab`) or a non-negative number of spaces.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("tabs") || trimmed.eq_ignore_ascii_case("tab") {
            return Ok(IndentConfig::Tab);
        }

        trimmed
            .parse::<usize>()
            .map(IndentConfig::spaces)
            .map_err(|_| ValidationError::InvalidIndent(value.to_owned()))
    }
}

impl fmt::Display for IndentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndentConfig::None => write!(f, "0"),
            IndentConfig::Spaces(width) => write!(f, "{width}"),
            IndentConfig::Tab => write!(f, "tabs"),
        }
    }
}

/// Raw indentation as it appears in configuration sources.
#[derive(Deserialize)]
#[serde(untagged)]
enum IndentValue {
    Width(usize),
    Named(String),
}

impl TryFrom<IndentValue> for IndentConfig {
    type Error = ValidationError;

    fn try_from(value: IndentValue) -> Result<Self, Self::Error> {
        match value {
            IndentValue::Width(width) => Ok(IndentConfig::spaces(width)),
            IndentValue::Named(name) => name.parse(),
        }
    }
}

/// Output writer configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WriterConfig {
    /// Indentation used when serializing documents.
    #[serde(default = "default_indent")]
    pub indent: IndentConfig,
    /// Number of buffered bytes at which the writer pauses its source until the target drains.
    #[serde(default = "default_high_water_mark")]
    pub high_water_mark: usize,
}

impl WriterConfig {
    /// Default number of buffered bytes before the writer applies backpressure.
    pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;

    /// Validates writer configuration settings.
    ///
    /// Ensures high_water_mark is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.high_water_mark == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "writer.high_water_mark".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            high_water_mark: default_high_water_mark(),
        }
    }
}

fn default_indent() -> IndentConfig {
    IndentConfig::default()
}

fn default_high_water_mark() -> usize {
    WriterConfig::DEFAULT_HIGH_WATER_MARK
}
