use std::path::Path;
use std::sync::Arc;

use docshift_config::shared::{TransformConfig, Transformation};
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, TransformResult};
use crate::identifiers::couch::CouchUuidSource;
use crate::identifiers::{IdentifierCoordinator, IdentifierSource};
use crate::transform::{assign_identifiers, clear_identifiers, csv_to_json};
use crate::transform_error;
use crate::types::WriteSummary;

/// Runs transformations from a source file to a target file.
///
/// The configuration is validated once, up front, so a run never touches the file system with an
/// invalid configuration. Every run gets its own identifier coordinator; nothing is shared between
/// runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<TransformConfig>,
}

impl Pipeline {
    pub fn new(config: TransformConfig) -> TransformResult<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Runs `transformation`, fetching identifiers from the configured store when needed.
    ///
    /// The store client is only built for transformations that assign identifiers.
    pub async fn run(
        &self,
        transformation: Transformation,
        source: &Path,
        target: &Path,
    ) -> TransformResult<WriteSummary> {
        self.execute(transformation, source, target, || {
            CouchUuidSource::new(&self.config.store)
        })
        .await
    }

    /// Runs `transformation`, fetching identifiers from `identifiers` when needed.
    pub async fn run_with_identifiers<S>(
        &self,
        transformation: Transformation,
        source: &Path,
        target: &Path,
        identifiers: S,
    ) -> TransformResult<WriteSummary>
    where
        S: IdentifierSource + Send + Sync + 'static,
    {
        self.execute(transformation, source, target, move || Ok(identifiers))
            .await
    }

    async fn execute<S, F>(
        &self,
        transformation: Transformation,
        source: &Path,
        target: &Path,
        identifiers: F,
    ) -> TransformResult<WriteSummary>
    where
        S: IdentifierSource + Send + Sync + 'static,
        F: FnOnce() -> TransformResult<S>,
    {
        // An unusable store must not leave a target behind.
        let identifiers = match transformation {
            Transformation::AssignIdentifiers => Some(identifiers()?),
            Transformation::ClearIdentifiers | Transformation::CsvToJson => None,
        };

        info!(
            transformation = %transformation,
            source = %source.display(),
            sink = %target.display(),
            "starting transformation"
        );

        // The source is opened first so a missing source never leaves an empty target behind.
        let source_file = File::open(source).await.map_err(|err| {
            transform_error!(
                ErrorKind::SourceIoError,
                "Failed to open the source",
                format!("{}: {err}", source.display()),
                source: err
            )
        })?;
        let target_file = File::create(target).await.map_err(|err| {
            transform_error!(
                ErrorKind::SinkError,
                "Failed to create the target",
                format!("{}: {err}", target.display()),
                source: err
            )
        })?;

        let sink = BufWriter::new(target_file);
        let target_name = target.display().to_string();

        match (transformation, identifiers) {
            (Transformation::AssignIdentifiers, Some(identifiers)) => {
                let coordinator = IdentifierCoordinator::new(identifiers);
                assign_identifiers(
                    source_file,
                    sink,
                    &target_name,
                    &coordinator,
                    &self.config,
                )
                .await
            }
            (Transformation::AssignIdentifiers, None) => bail!(
                ErrorKind::InvalidState,
                "Identifier source missing for an identifier assignment"
            ),
            (Transformation::ClearIdentifiers, _) => {
                clear_identifiers(source_file, sink, &target_name, &self.config.writer).await
            }
            (Transformation::CsvToJson, _) => {
                csv_to_json(source_file, sink, &target_name, &self.config.writer).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use docshift_config::shared::{StoreConfig, WriterConfig};

    use super::*;
    use crate::identifiers::memory::MemoryIdentifierSource;

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let config = TransformConfig {
            writer: WriterConfig {
                high_water_mark: 0,
                ..WriterConfig::default()
            },
            ..TransformConfig::default()
        };

        let err = Pipeline::new(config).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn missing_source_creates_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        let pipeline = Pipeline::new(TransformConfig::default()).unwrap();

        let err = pipeline
            .run_with_identifiers(
                Transformation::ClearIdentifiers,
                &dir.path().join("missing.json"),
                &target,
                MemoryIdentifierSource::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceIoError);
        assert!(!target.exists());
    }

    fn pipeline_with_store(url: &str) -> Pipeline {
        let config = TransformConfig {
            store: StoreConfig {
                url: url.to_owned(),
            },
            ..TransformConfig::default()
        };

        Pipeline {
            config: Arc::new(config),
        }
    }

    #[tokio::test]
    async fn store_client_is_only_built_for_identifier_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.json");
        let target = dir.path().join("out.json");
        tokio::fs::write(&source, r#"[{"_id": "a", "n": 1}]"#)
            .await
            .unwrap();
        let pipeline = pipeline_with_store("not a url");

        let summary = pipeline
            .run(Transformation::ClearIdentifiers, &source, &target)
            .await
            .unwrap();
        assert_eq!(summary.documents, 1);

        let assign_target = dir.path().join("assigned.json");
        let err = pipeline
            .run(Transformation::AssignIdentifiers, &source, &assign_target)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(!assign_target.exists());
    }
}
