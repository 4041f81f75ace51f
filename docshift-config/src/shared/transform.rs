use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::Config;
use crate::shared::{IdentifierConfig, StoreConfig, ValidationError, WriterConfig};

/// The transformations docshift can run over a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transformation {
    /// Strip the identifier field from every document.
    ClearIdentifiers,
    /// Give every document without an identifier a fresh one from the store.
    AssignIdentifiers,
    /// Convert a CSV file with a header row into an array of documents.
    CsvToJson,
}

impl Transformation {
    const CLEAR_IDENTIFIERS: &'static str = "clear-identifiers";
    const ASSIGN_IDENTIFIERS: &'static str = "assign-identifiers";
    const CSV_TO_JSON: &'static str = "csv-to-json";

    /// Returns the command line name of the transformation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transformation::ClearIdentifiers => Self::CLEAR_IDENTIFIERS,
            Transformation::AssignIdentifiers => Self::ASSIGN_IDENTIFIERS,
            Transformation::CsvToJson => Self::CSV_TO_JSON,
        }
    }
}

impl FromStr for Transformation {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_lowercase().as_str() {
            Self::CLEAR_IDENTIFIERS => Ok(Transformation::ClearIdentifiers),
            Self::ASSIGN_IDENTIFIERS => Ok(Transformation::AssignIdentifiers),
            Self::CSV_TO_JSON => Ok(Transformation::CsvToJson),
            _ => Err(ValidationError::UnknownTransformation(name.to_owned())),
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete configuration for a transformation run.
///
/// Every section has defaults, so an empty configuration source is valid.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TransformConfig {
    /// Output writer settings.
    #[serde(default)]
    pub writer: WriterConfig,
    /// Remote store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Identifier batching settings.
    #[serde(default)]
    pub identifiers: IdentifierConfig,
}

impl TransformConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.writer.validate()?;
        self.store.validate()?;
        self.identifiers.validate()
    }
}

impl Config for TransformConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transformation_names() {
        for transformation in [
            Transformation::ClearIdentifiers,
            Transformation::AssignIdentifiers,
            Transformation::CsvToJson,
        ] {
            assert_eq!(
                transformation.as_str().parse::<Transformation>().unwrap(),
                transformation
            );
        }
    }

    #[test]
    fn unknown_transformation_is_a_validation_error() {
        assert_eq!(
            "json-to-xml".parse::<Transformation>(),
            Err(ValidationError::UnknownTransformation(
                "json-to-xml".to_owned()
            ))
        );
    }

    #[test]
    fn default_config_is_valid() {
        assert!(TransformConfig::default().validate().is_ok());
    }

    #[test]
    fn batch_size_hint_is_capped() {
        let identifiers = IdentifierConfig::default();

        assert_eq!(identifiers.batch_size_for(12), 12);
        assert_eq!(identifiers.batch_size_for(12_000), 5000);
    }
}
