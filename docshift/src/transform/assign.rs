use docshift_config::shared::TransformConfig;
use futures::StreamExt;
use futures::stream::FuturesOrdered;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::decoder::DocumentDecoder;
use crate::error::{ErrorKind, TransformResult};
use crate::identifiers::{IdentifierCoordinator, IdentifierSource};
use crate::transform_error;
use crate::types::{ContainerShape, Document, IDENTIFIER_FIELD, WriteSummary, has_identifier};
use crate::writer::{DocumentFormat, ProgressTracker};

const OPERATION: &str = "assign-identifiers";

/// Gives every document in `source` a fresh identifier and writes the result to `sink`.
///
/// The whole source is read before any identifier is requested. Every document without an
/// identifier then requests one from `coordinator` concurrently, all with the same batch size
/// hint of `min(documents, max_batch_size)`. Documents that
/// already carry an identifier are logged and written unchanged. The result is serialized as a
/// single JSON value once every identifier is in place.
pub async fn assign_identifiers<R, W, S>(
    source: R,
    mut sink: W,
    target: &str,
    coordinator: &IdentifierCoordinator<S>,
    config: &TransformConfig,
) -> TransformResult<WriteSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: IdentifierSource + Send + Sync + 'static,
{
    let (shape, documents) = read_documents(source).await?;
    let missing = documents
        .iter()
        .filter(|document| !has_identifier(document))
        .count();
    let batch_size = config.identifiers.batch_size_for(documents.len());

    info!(
        documents = documents.len(),
        missing,
        batch_size,
        "assigning identifiers"
    );

    let mut progress = ProgressTracker::new(OPERATION);
    let mut pending: FuturesOrdered<_> = documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| assign(coordinator, index, document, batch_size))
        .collect();

    let mut assigned = Vec::with_capacity(pending.len());
    while let Some(document) = pending.next().await {
        assigned.push(document?);
        progress.record();
    }
    progress.finish();

    let format = DocumentFormat::new(config.writer.indent);
    let mut output = match shape {
        ContainerShape::Array => format.serialize(&assigned)?,
        ContainerShape::Single => match assigned.first() {
            Some(document) => format.serialize(document)?,
            None => format.serialize(&Value::Null)?,
        },
    };
    output.push(b'\n');

    write_output(&mut sink, target, &output).await?;

    info!(
        documents = assigned.len(),
        sink = %target,
        "wrote {} documents to {}",
        assigned.len(),
        target
    );

    Ok(WriteSummary {
        documents: assigned.len() as u64,
        target: target.to_owned(),
    })
}

/// Reads every document of `source` into memory.
async fn read_documents<R>(source: R) -> TransformResult<(ContainerShape, Vec<Document>)>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = DocumentDecoder::new(source);
    let shape = decoder.shape().await?;

    let mut documents = Vec::new();
    while let Some(document) = decoder.next_document().await? {
        documents.push(document);
    }

    Ok((shape, documents))
}

async fn assign<S>(
    coordinator: &IdentifierCoordinator<S>,
    index: usize,
    mut document: Document,
    batch_size: usize,
) -> TransformResult<Document>
where
    S: IdentifierSource + Send + Sync + 'static,
{
    if let Some(existing) = document.get(IDENTIFIER_FIELD) {
        warn!(
            document = index,
            identifier = %existing,
            "document already has an identifier, leaving it unchanged"
        );
        return Ok(document);
    }

    let identifier = coordinator.request_identifier(batch_size).await?;
    document.insert(IDENTIFIER_FIELD.to_owned(), Value::String(identifier));

    Ok(document)
}

async fn write_output<W>(sink: &mut W, target: &str, output: &[u8]) -> TransformResult<()>
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        sink.write_all(output).await?;
        sink.flush().await?;
        sink.shutdown().await
    }
    .await;

    result.map_err(|err| {
        transform_error!(
            ErrorKind::SinkError,
            "Failed to write to the target",
            format!("{target}: {err}"),
            source: err
        )
    })
}
