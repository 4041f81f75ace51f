use docshift_config::load_config;
use docshift_config::shared::{IndentConfig, StoreConfig, TransformConfig, ValidationError};

use crate::error::{CliError, CliResult};

/// Settings given on the command line, applied on top of the loaded configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub indent: Option<String>,
    pub url: Option<String>,
}

impl Overrides {
    /// Validates and applies every override present to `config`.
    pub fn apply(&self, config: &mut TransformConfig) -> Result<(), ValidationError> {
        if let Some(indent) = &self.indent {
            config.writer.indent = indent.parse::<IndentConfig>()?;
        }

        if let Some(url) = &self.url {
            let store = StoreConfig { url: url.clone() };
            store.validate()?;
            config.store = store;
        }

        Ok(())
    }
}

/// Loads the configuration, applies `overrides` and validates the result.
///
/// A bad override is a usage error; anything else that fails validation came from the
/// configuration sources.
pub fn load_transform_config(overrides: &Overrides) -> CliResult<TransformConfig> {
    let mut config = load_config::<TransformConfig>().map_err(CliError::config)?;
    overrides.apply(&mut config)?;
    config.validate().map_err(CliError::config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_loaded_values() {
        let mut config = TransformConfig::default();
        let overrides = Overrides {
            indent: Some("tabs".to_owned()),
            url: Some("https://couch.example.com/db".to_owned()),
        };

        overrides.apply(&mut config).unwrap();

        assert_eq!(config.writer.indent, IndentConfig::Tab);
        assert_eq!(config.store.url, "https://couch.example.com/db");
    }

    #[test]
    fn absent_overrides_keep_loaded_values() {
        let mut config = TransformConfig::default();

        Overrides::default().apply(&mut config).unwrap();

        assert_eq!(config, TransformConfig::default());
    }

    #[test]
    fn non_numeric_indent_is_rejected() {
        let mut config = TransformConfig::default();
        let overrides = Overrides {
            indent: Some("wide".to_owned()),
            url: None,
        };

        let err = overrides.apply(&mut config).unwrap_err();

        assert_eq!(err, ValidationError::InvalidIndent("wide".to_owned()));
    }

    #[test]
    fn invalid_url_override_is_rejected_and_leaves_the_store_alone() {
        let mut config = TransformConfig::default();
        let overrides = Overrides {
            indent: None,
            url: Some("couch.example.com".to_owned()),
        };

        let err = overrides.apply(&mut config).unwrap_err();

        assert_eq!(
            err,
            ValidationError::InvalidStoreUrl("couch.example.com".to_owned())
        );
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn invalid_url_override_is_a_usage_error() {
        let overrides = Overrides {
            indent: None,
            url: Some("ftp://couch.example.com".to_owned()),
        };

        let err = load_transform_config(&overrides).unwrap_err();

        assert!(matches!(
            err,
            CliError::Usage(ValidationError::InvalidStoreUrl(_), _)
        ));
        assert_eq!(err.category(), "usage error");
    }
}
