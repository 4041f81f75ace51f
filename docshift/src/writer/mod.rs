//! Streaming JSON output with backpressure.
//!
//! [`DocumentWriter`] frames documents as a single JSON value or a top-level array and hands the
//! serialized bytes to a flush worker that owns the sink. Once the bytes waiting for the sink
//! reach the configured high-water mark the writer reports [`FlowState::Paused`], and the caller
//! must wait on [`DocumentWriter::drained`] before writing again.

mod flush;
mod format;
mod progress;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use docshift_config::shared::WriterConfig;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::bail;
use crate::concurrency::flow::{FlowControl, FlowRx};
use crate::error::{ErrorKind, TransformResult};
use crate::transform_error;
use crate::types::{ContainerShape, Document, WriteSummary};

pub use crate::concurrency::flow::FlowState;
pub use format::DocumentFormat;
pub use progress::{PROGRESS_INTERVAL, ProgressTracker};

use flush::{FlushWorker, FlushWorkerHandle};

/// Lifecycle of a [`DocumentWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Created, nothing written yet.
    Idle,
    /// The opening framing has been queued.
    Opened,
    /// Documents are being written and the sink keeps up.
    Streaming,
    /// The sink is behind; no writes until it drains.
    Paused,
    /// The closing framing has been written and the sink flushed.
    Closed,
    /// The run stopped on an error; partial output stays in place.
    ErrorClosed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Idle => "idle",
            WriterState::Opened => "opened",
            WriterState::Streaming => "streaming",
            WriterState::Paused => "paused",
            WriterState::Closed => "closed",
            WriterState::ErrorClosed => "error-closed",
        };

        f.write_str(name)
    }
}

/// Writes a stream of documents to an async sink.
#[derive(Debug)]
pub struct DocumentWriter {
    state: WriterState,
    shape: ContainerShape,
    format: DocumentFormat,
    flow: Arc<FlowControl>,
    flow_rx: FlowRx,
    chunks: Option<mpsc::UnboundedSender<Bytes>>,
    flush: Option<FlushWorkerHandle>,
    progress: ProgressTracker,
    target: String,
    written: u64,
}

impl DocumentWriter {
    /// Creates a writer over `sink` and starts its flush worker.
    ///
    /// `target` names the sink in logs and in the returned [`WriteSummary`]. Must be called within
    /// a tokio runtime.
    pub fn new<W>(
        sink: W,
        target: impl Into<String>,
        operation: &'static str,
        config: &WriterConfig,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let target = target.into();
        let flow = Arc::new(FlowControl::new(config.high_water_mark));
        let flow_rx = flow.subscribe();
        let (chunks_tx, chunks_rx) = mpsc::unbounded_channel();
        let flush = FlushWorker::new(sink, chunks_rx, flow.clone(), target.clone()).start();

        Self {
            state: WriterState::Idle,
            shape: ContainerShape::Single,
            format: DocumentFormat::new(config.indent),
            flow,
            flow_rx,
            chunks: Some(chunks_tx),
            flush: Some(flush),
            progress: ProgressTracker::new(operation),
            target,
            written: 0,
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Returns the number of documents written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Returns the number of bytes queued for the sink but not yet written.
    pub fn buffered(&self) -> usize {
        self.flow.buffered()
    }

    /// Queues the opening framing for `shape`: `[` for arrays, nothing for single documents.
    pub async fn open(&mut self, shape: ContainerShape) -> TransformResult<FlowState> {
        if self.state != WriterState::Idle {
            bail!(
                ErrorKind::InvalidState,
                "Writer can only be opened once",
                format!("writer is {}", self.state)
            );
        }

        self.shape = shape;
        self.state = WriterState::Opened;

        match shape {
            ContainerShape::Array => self.push(Bytes::from_static(b"[")).await,
            ContainerShape::Single => Ok(self.flow.state()),
        }
    }

    /// Serializes and queues `document`.
    ///
    /// Returns [`FlowState::Paused`] when the sink has fallen behind; the next write is rejected
    /// with [`ErrorKind::InvalidState`] until [`DocumentWriter::drained`] resolves.
    pub async fn write(&mut self, document: &Document) -> TransformResult<FlowState> {
        match self.state {
            WriterState::Opened | WriterState::Streaming => {}
            WriterState::Paused => bail!(
                ErrorKind::InvalidState,
                "Write issued while the writer is paused",
                format!(
                    "{} bytes are waiting for {} to drain",
                    self.flow.buffered(),
                    self.target
                )
            ),
            state => bail!(
                ErrorKind::InvalidState,
                "Write issued outside of an open writer",
                format!("writer is {state}")
            ),
        }

        let chunk = match self.shape {
            ContainerShape::Array => {
                let serialized = self.format.serialize_nested(document)?;
                let separator: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };

                let mut chunk = Vec::with_capacity(separator.len() + serialized.len());
                chunk.extend_from_slice(separator);
                chunk.extend_from_slice(&serialized);
                chunk
            }
            ContainerShape::Single if self.written > 0 => bail!(
                ErrorKind::InvalidState,
                "A single-document target holds exactly one document",
                format!("{} already has a document", self.target)
            ),
            ContainerShape::Single => {
                let mut chunk = self.format.serialize(document)?;
                chunk.push(b'\n');
                chunk
            }
        };

        let state = self.push(Bytes::from(chunk)).await?;
        self.written += 1;
        self.progress.record();

        Ok(state)
    }

    /// Waits until the sink has written out everything queued so far.
    ///
    /// Resolves immediately unless the writer is paused.
    pub async fn drained(&mut self) -> TransformResult<()> {
        match self.state {
            WriterState::Paused => {}
            WriterState::Opened | WriterState::Streaming => return Ok(()),
            state => bail!(
                ErrorKind::InvalidState,
                "Drain awaited outside of an open writer",
                format!("writer is {state}")
            ),
        }

        let flow_state = self
            .flow_rx
            .wait_for(|state| *state != FlowState::Paused)
            .await
            .map(|state| *state)
            .unwrap_or(FlowState::Failed);

        match flow_state {
            FlowState::Failed => Err(self.sink_failure().await),
            _ => {
                self.state = WriterState::Streaming;
                Ok(())
            }
        }
    }

    /// Queues the closing framing, waits for the sink to flush and returns a summary.
    pub async fn close(mut self) -> TransformResult<WriteSummary> {
        match self.state {
            WriterState::Opened | WriterState::Streaming | WriterState::Paused => {}
            state => bail!(
                ErrorKind::InvalidState,
                "Writer closed before it was opened",
                format!("writer is {state}")
            ),
        }

        if self.shape == ContainerShape::Array {
            self.queue(Bytes::from_static(b"\n]\n")).await?;
        }

        // Dropping the sender lets the worker finish once the queue is empty.
        self.chunks = None;
        let bytes = match self.flush.take() {
            Some(flush) => flush.wait().await,
            None => Err(transform_error!(
                ErrorKind::InvalidState,
                "Writer has no flush worker"
            )),
        };

        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(err) => {
                self.state = WriterState::ErrorClosed;
                return Err(err);
            }
        };

        self.state = WriterState::Closed;
        self.progress.finish();

        info!(
            documents = self.written,
            bytes,
            sink = %self.target,
            "wrote {} documents to {}",
            self.written,
            self.target
        );

        Ok(WriteSummary {
            documents: self.written,
            target: self.target.clone(),
        })
    }

    /// Stops the writer after a failure elsewhere in the run.
    ///
    /// Everything queued so far is still written out; nothing is rolled back.
    pub async fn abort(mut self) {
        self.state = WriterState::ErrorClosed;
        self.chunks = None;

        if let Some(flush) = self.flush.take()
            && let Err(err) = flush.wait().await
        {
            warn!(error = %err, "target failed while aborting");
        }

        warn!(
            documents = self.written,
            sink = %self.target,
            "transformation aborted, partial output left in place"
        );
    }

    /// Queues `chunk` and updates the state from the resulting flow state.
    async fn push(&mut self, chunk: Bytes) -> TransformResult<FlowState> {
        let flow_state = self.queue(chunk).await?;
        self.state = match flow_state {
            FlowState::Paused => WriterState::Paused,
            _ => WriterState::Streaming,
        };

        Ok(flow_state)
    }

    async fn queue(&mut self, chunk: Bytes) -> TransformResult<FlowState> {
        let len = chunk.len();
        let sent = match &self.chunks {
            Some(chunks) if self.flow.state() != FlowState::Failed => {
                self.flow.enqueue(len);
                chunks.send(chunk).is_ok()
            }
            _ => false,
        };

        if !sent {
            return Err(self.sink_failure().await);
        }

        Ok(self.flow.state())
    }

    /// Collects the error that stopped the flush worker and closes the writer.
    async fn sink_failure(&mut self) -> crate::error::TransformError {
        self.state = WriterState::ErrorClosed;
        self.chunks = None;

        let result = match self.flush.take() {
            Some(flush) => flush.wait().await,
            None => Ok(0),
        };

        match result {
            Err(err) => err,
            Ok(_) => transform_error!(
                ErrorKind::SinkError,
                "Target stopped accepting documents",
                self.target.clone()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use docshift_config::shared::IndentConfig;
    use serde_json::json;

    use super::*;
    use crate::test_utils::sink::{FailingSink, ThrottledSink};

    fn config(indent: IndentConfig, high_water_mark: usize) -> WriterConfig {
        WriterConfig {
            indent,
            high_water_mark,
        }
    }

    fn document(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[tokio::test]
    async fn frames_an_indented_array() {
        let sink = ThrottledSink::new();
        let mut writer = DocumentWriter::new(
            sink.clone(),
            "memory",
            "test",
            &config(IndentConfig::Spaces(2), 1024),
        );

        writer.open(ContainerShape::Array).await.unwrap();
        writer.write(&document(json!({"a": 1}))).await.unwrap();
        writer.write(&document(json!({"b": 2}))).await.unwrap();
        let summary = writer.close().await.unwrap();

        assert_eq!(summary.documents, 2);
        assert_eq!(summary.target, "memory");
        assert_eq!(
            sink.contents_string(),
            "[\n  {\n    \"a\": 1\n  },\n  {\n    \"b\": 2\n  }\n]\n"
        );
    }

    #[tokio::test]
    async fn empty_array_is_valid_json() {
        let sink = ThrottledSink::new();
        let mut writer =
            DocumentWriter::new(sink.clone(), "memory", "test", &WriterConfig::default());

        writer.open(ContainerShape::Array).await.unwrap();
        writer.close().await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&sink.contents_string()).unwrap();
        assert_eq!(parsed, json!([]));
    }

    #[tokio::test]
    async fn single_documents_are_not_bracketed() {
        let sink = ThrottledSink::new();
        let mut writer = DocumentWriter::new(
            sink.clone(),
            "memory",
            "test",
            &config(IndentConfig::None, 1024),
        );

        writer.open(ContainerShape::Single).await.unwrap();
        writer.write(&document(json!({"a": [1, 2]}))).await.unwrap();

        let err = writer.write(&document(json!({"b": 1}))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        writer.close().await.unwrap();
        assert_eq!(sink.contents_string(), "{\"a\":[1,2]}\n");
    }

    #[tokio::test]
    async fn paused_writer_rejects_writes_until_drained() {
        let sink = ThrottledSink::new().with_max_chunk(3);
        let mut writer = DocumentWriter::new(
            sink.clone(),
            "memory",
            "test",
            &config(IndentConfig::None, 1),
        );

        assert_eq!(
            writer.open(ContainerShape::Array).await.unwrap(),
            FlowState::Paused
        );
        writer.drained().await.unwrap();

        for n in 0..10 {
            let state = writer.write(&document(json!({"n": n}))).await.unwrap();
            assert_eq!(state, FlowState::Paused);
            assert_eq!(writer.state(), WriterState::Paused);

            let err = writer.write(&document(json!({"n": n}))).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidState);

            writer.drained().await.unwrap();
            assert_eq!(writer.state(), WriterState::Streaming);
            assert_eq!(writer.buffered(), 0);
        }

        writer.close().await.unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&sink.contents_string()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn sink_errors_surface_on_drain() {
        let mut writer = DocumentWriter::new(
            FailingSink::after(4),
            "broken",
            "test",
            &config(IndentConfig::None, 1),
        );

        writer.open(ContainerShape::Array).await.unwrap();
        writer.drained().await.unwrap();
        writer
            .write(&document(json!({"long": "enough to fail"})))
            .await
            .unwrap();

        let err = writer.drained().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SinkError);
        assert_eq!(writer.state(), WriterState::ErrorClosed);
    }

    #[tokio::test]
    async fn writes_before_open_are_rejected() {
        let mut writer = DocumentWriter::new(
            ThrottledSink::new(),
            "memory",
            "test",
            &WriterConfig::default(),
        );

        let err = writer.write(&document(json!({}))).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
