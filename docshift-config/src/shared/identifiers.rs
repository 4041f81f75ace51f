use serde::Deserialize;

use crate::shared::ValidationError;

/// Identifier batching configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IdentifierConfig {
    /// Upper bound for the number of identifiers requested from the store in one round-trip.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl IdentifierConfig {
    /// Default cap on the identifier batch size.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 5000;

    /// Returns the batch size hint for a run over `total_documents` documents.
    pub fn batch_size_for(&self, total_documents: usize) -> usize {
        total_documents.min(self.max_batch_size)
    }

    /// Validates identifier configuration settings.
    ///
    /// Ensures max_batch_size is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_batch_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "identifiers.max_batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_max_batch_size() -> usize {
    IdentifierConfig::DEFAULT_MAX_BATCH_SIZE
}
