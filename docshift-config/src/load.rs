use std::{
    io,
    path::{Path, PathBuf},
};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the configuration file looked up inside [`CONFIGURATION_DIR`].
const BASE_FILE_STEM: &str = "base";

/// Supported extensions for the base configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// A configuration file existed but could not be parsed.
    #[error("failed to load base configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// The configuration sources were parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    /// Failed to initialize the configuration builder.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] config::ConfigError),
}

/// Loads configuration from `./configuration` and `APP_`-prefixed environment variables.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR))
}

/// Loads configuration from `directory` and `APP_`-prefixed environment variables.
///
/// The file `base.(yaml|yml|json)` inside `directory` is applied first when it exists; a missing
/// directory or file is not an error since every setting has a default. Environment variables
/// are applied on top. Nested keys use double underscores (`APP_STORE__URL`), and list values are
/// comma-separated.
pub fn load_config_from<T>(directory: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let mut builder = config::Config::builder();

    if let Some(base_file) = find_configuration_file(directory) {
        builder = builder.add_source(config::File::from(base_file.clone()));
        validate_configuration_source(&builder, &base_file)?;
    }

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source.list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the first base configuration file present in `directory`, if any.
fn find_configuration_file(directory: &Path) -> Option<PathBuf> {
    if !directory.is_dir() {
        return None;
    }

    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{BASE_FILE_STEM}.{extension}")))
        .find(|path| path.is_file())
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{IndentConfig, TransformConfig};

    #[test]
    fn missing_directory_yields_defaults() {
        let config: TransformConfig =
            load_config_from(Path::new("/definitely/not/a/configuration/dir")).unwrap();

        assert_eq!(config.writer.indent, IndentConfig::Spaces(2));
        assert_eq!(config.store.url, "http://localhost:5984");
        assert_eq!(config.identifiers.max_batch_size, 5000);
    }

    #[test]
    fn base_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            "writer:\n  indent: tabs\nstore:\n  url: http://couch.internal:5984\n",
        )
        .unwrap();

        let config: TransformConfig = load_config_from(dir.path()).unwrap();

        assert_eq!(config.writer.indent, IndentConfig::Tab);
        assert_eq!(config.store.url, "http://couch.internal:5984");
        assert_eq!(config.identifiers.max_batch_size, 5000);
    }

    #[test]
    fn malformed_base_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.json"), "{ not json").unwrap();

        let result = load_config_from::<TransformConfig>(dir.path());

        assert!(matches!(
            result,
            Err(LoadConfigError::ConfigurationFileLoad { .. })
        ));
    }
}
