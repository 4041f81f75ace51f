use docshift_config::shared::WriterConfig;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::decoder::DocumentDecoder;
use crate::error::{TransformError, TransformResult};
use crate::transform::{finish, open_writer, write_document};
use crate::types::{IDENTIFIER_FIELD, WriteSummary};
use crate::writer::DocumentWriter;

const OPERATION: &str = "clear-identifiers";

/// Streams every document from `source` to `sink` with its identifier field removed.
///
/// The output keeps the source's container shape. On a parse or sink error the documents
/// written so far stay in `sink`.
pub async fn clear_identifiers<R, W>(
    source: R,
    sink: W,
    target: &str,
    config: &WriterConfig,
) -> TransformResult<WriteSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut decoder = DocumentDecoder::new(source);
    let mut writer = DocumentWriter::new(sink, target, OPERATION, config);

    let streamed = async {
        let shape = decoder.shape().await?;
        info!(shape = %shape, "clearing identifiers");
        open_writer(&mut writer, shape).await?;

        while let Some(mut document) = decoder.next_document().await? {
            document.shift_remove(IDENTIFIER_FIELD);
            write_document(&mut writer, &document).await?;
        }

        Ok::<_, TransformError>(())
    }
    .await;

    finish(writer, streamed).await
}
