//! Incremental JSON document decoding.
//!
//! [`DocumentDecoder`] reads a byte source in chunks and yields, in source order, one
//! [`DecoderEvent::Shape`], then every document as soon as its closing brace is read, then
//! [`DecoderEvent::End`]. Bytes are only pulled from the source when the consumer asks for the next
//! event, so a consumer waiting on its output holds the source back as well.

mod splitter;

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{ErrorKind, TransformError, TransformResult};
use crate::transform_error;
use crate::types::{ContainerShape, Document};

pub use splitter::{JsonSplitter, SplitEvent};

/// Size of each read from the byte source.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Events yielded by [`DocumentDecoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    /// Whether the source is a single document or an array; yielded once, first.
    Shape(ContainerShape),
    /// The next complete document.
    Document(Document),
    /// The source is exhausted. Yielded for every call after the end or after an error.
    End,
}

impl From<SplitEvent> for DecoderEvent {
    fn from(event: SplitEvent) -> Self {
        match event {
            SplitEvent::Shape(shape) => DecoderEvent::Shape(shape),
            SplitEvent::Document(document) => DecoderEvent::Document(document),
        }
    }
}

/// Pull-based incremental decoder over an async byte source.
#[derive(Debug)]
pub struct DocumentDecoder<R> {
    source: R,
    splitter: JsonSplitter,
    pending: VecDeque<SplitEvent>,
    buffer: BytesMut,
    failure: Option<TransformError>,
    exhausted: bool,
}

impl<R> DocumentDecoder<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a decoder reading from `source`.
    pub fn new(source: R) -> Self {
        Self {
            source,
            splitter: JsonSplitter::new(),
            pending: VecDeque::new(),
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            failure: None,
            exhausted: false,
        }
    }

    /// Returns the next event.
    ///
    /// A malformed source yields the documents completed before the malformed one, then the
    /// error once; every call after that returns [`DecoderEvent::End`].
    pub async fn next_event(&mut self) -> TransformResult<DecoderEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event.into());
            }

            if let Some(err) = self.failure.take() {
                return Err(err);
            }

            if self.exhausted {
                return Ok(DecoderEvent::End);
            }

            self.fill().await;
        }
    }

    /// Reads the container shape, which must be the next event.
    pub async fn shape(&mut self) -> TransformResult<ContainerShape> {
        match self.next_event().await? {
            DecoderEvent::Shape(shape) => Ok(shape),
            other => Err(transform_error!(
                ErrorKind::InvalidState,
                "Decoder shape requested after decoding started",
                format!("next event was {other:?}")
            )),
        }
    }

    /// Returns the next document, or `None` once the source is exhausted.
    pub async fn next_document(&mut self) -> TransformResult<Option<Document>> {
        match self.next_event().await? {
            DecoderEvent::Document(document) => Ok(Some(document)),
            DecoderEvent::End => Ok(None),
            DecoderEvent::Shape(shape) => Err(transform_error!(
                ErrorKind::InvalidState,
                "Document requested before the container shape was read",
                format!("source shape is {shape}")
            )),
        }
    }

    /// Reads one chunk and feeds it to the splitter, recording any failure.
    async fn fill(&mut self) {
        self.buffer.clear();

        let read = match self.source.read_buf(&mut self.buffer).await {
            Ok(read) => read,
            Err(err) => {
                self.fail(transform_error!(
                    ErrorKind::SourceIoError,
                    "Failed to read from the source",
                    err.to_string(),
                    source: err
                ));
                return;
            }
        };

        let result = if read == 0 {
            self.exhausted = true;
            debug!(
                documents = self.splitter.documents(),
                "source exhausted"
            );
            self.splitter.finish()
        } else {
            self.splitter.feed(&self.buffer[..read], &mut self.pending)
        };

        if let Err(err) = result {
            self.fail(err);
        }
    }

    fn fail(&mut self, err: TransformError) {
        self.failure = Some(err);
        self.exhausted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn yields_shape_documents_then_end() {
        let source: &[u8] = br#"[{"a": 1}, {"b": 2}]"#;
        let mut decoder = DocumentDecoder::new(source);

        assert_eq!(decoder.shape().await.unwrap(), ContainerShape::Array);
        assert_eq!(
            decoder.next_document().await.unwrap(),
            json!({"a": 1}).as_object().cloned()
        );
        assert_eq!(
            decoder.next_document().await.unwrap(),
            json!({"b": 2}).as_object().cloned()
        );
        assert_eq!(decoder.next_document().await.unwrap(), None);
        assert_eq!(decoder.next_event().await.unwrap(), DecoderEvent::End);
    }

    #[tokio::test]
    async fn error_is_yielded_once_after_completed_documents() {
        let source: &[u8] = br#"[{"a": 1}, {"b": }]"#;
        let mut decoder = DocumentDecoder::new(source);

        assert_eq!(decoder.shape().await.unwrap(), ContainerShape::Array);
        assert!(decoder.next_document().await.unwrap().is_some());

        let err = decoder.next_document().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);

        assert_eq!(decoder.next_event().await.unwrap(), DecoderEvent::End);
    }

    #[tokio::test]
    async fn documents_are_emitted_before_the_source_ends() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut decoder = DocumentDecoder::new(rx);

        tx.write_all(br#"[{"first": true},"#).await.unwrap();

        assert_eq!(decoder.shape().await.unwrap(), ContainerShape::Array);
        assert_eq!(
            decoder.next_document().await.unwrap(),
            json!({"first": true}).as_object().cloned()
        );

        tx.write_all(br#" {"second": true}]"#).await.unwrap();
        drop(tx);

        assert!(decoder.next_document().await.unwrap().is_some());
        assert_eq!(decoder.next_document().await.unwrap(), None);
    }
}
