use serde::Deserialize;

use crate::shared::ValidationError;

/// Connection settings for the remote document store that hands out identifiers.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Base url of the store. Only scheme, host and port are used; identifier requests always go
    /// to the store root.
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl StoreConfig {
    /// Well-known local endpoint used when no url is configured.
    pub const DEFAULT_URL: &'static str = "http://localhost:5984";

    /// Validates store configuration settings.
    ///
    /// Only checks the scheme; full url parsing happens when the client is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self.url.trim();
        let has_http_scheme = url.starts_with("http://") || url.starts_with("https://");
        let has_host = url
            .split_once("://")
            .is_some_and(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'));

        if !has_http_scheme || !has_host {
            return Err(ValidationError::InvalidStoreUrl(self.url.clone()));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

fn default_store_url() -> String {
    StoreConfig::DEFAULT_URL.to_owned()
}
