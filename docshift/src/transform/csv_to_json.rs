use docshift_config::shared::WriterConfig;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::csv::CsvReader;
use crate::error::{TransformError, TransformResult};
use crate::transform::{finish, open_writer, write_document};
use crate::types::{ContainerShape, Document, WriteSummary};
use crate::writer::DocumentWriter;

const OPERATION: &str = "csv-to-json";

/// Builds a document from one CSV row by pairing cells with the header's field names.
///
/// Empty cells are left out of the document entirely, as are cells beyond the header's width.
/// Every value is kept as a string.
pub fn row_to_document(fields: &[String], row: Vec<String>) -> Document {
    fields
        .iter()
        .zip(row)
        .filter(|(_, cell)| !cell.is_empty())
        .map(|(field, cell)| (field.clone(), Value::String(cell)))
        .collect()
}

/// Converts a CSV source with a header row into a JSON array of documents.
///
/// The first row names the fields; every following row becomes one document. A source without
/// any rows produces an empty array.
pub async fn csv_to_json<R, W>(
    source: R,
    sink: W,
    target: &str,
    config: &WriterConfig,
) -> TransformResult<WriteSummary>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = CsvReader::new(source);
    let mut writer = DocumentWriter::new(sink, target, OPERATION, config);

    let streamed = async {
        open_writer(&mut writer, ContainerShape::Array).await?;

        let Some(fields) = reader.next_row().await? else {
            debug!("source has no header row");
            return Ok(());
        };
        info!(fields = fields.len(), "converting rows to documents");

        while let Some(row) = reader.next_row().await? {
            let document = row_to_document(&fields, row);
            write_document(&mut writer, &document).await?;
        }

        Ok::<_, TransformError>(())
    }
    .await;

    finish(writer, streamed).await
}
