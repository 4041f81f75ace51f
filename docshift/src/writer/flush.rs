use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::concurrency::flow::FlowControl;
use crate::error::{ErrorKind, TransformError, TransformResult};
use crate::transform_error;

/// Handle to a running flush worker.
#[derive(Debug)]
pub(crate) struct FlushWorkerHandle {
    join_handle: JoinHandle<TransformResult<u64>>,
}

impl FlushWorkerHandle {
    /// Waits for the worker to write out every queued chunk, returning the bytes written.
    pub(crate) async fn wait(self) -> TransformResult<u64> {
        match self.join_handle.await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "flush worker task panicked");
                Err(transform_error!(
                    ErrorKind::SinkError,
                    "Target writer stopped unexpectedly",
                    err.to_string()
                ))
            }
        }
    }
}

/// Worker that owns the sink and writes out chunks queued by a [`super::DocumentWriter`].
///
/// Every chunk is counted out of the shared [`FlowControl`] once it has been written and, when
/// no other chunk is waiting, flushed. The worker stops when the writer drops its sender or the
/// first write fails; a failure moves the flow control to [`super::FlowState::Failed`].
pub(crate) struct FlushWorker<W> {
    sink: W,
    chunks: mpsc::UnboundedReceiver<Bytes>,
    flow: Arc<FlowControl>,
    target: String,
}

impl<W> FlushWorker<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub(crate) fn new(
        sink: W,
        chunks: mpsc::UnboundedReceiver<Bytes>,
        flow: Arc<FlowControl>,
        target: String,
    ) -> Self {
        Self {
            sink,
            chunks,
            flow,
            target,
        }
    }

    /// Starts the worker in a background task.
    pub(crate) fn start(self) -> FlushWorkerHandle {
        let join_handle = tokio::spawn(self.run());
        FlushWorkerHandle { join_handle }
    }

    async fn run(mut self) -> TransformResult<u64> {
        let mut written = 0u64;

        while let Some(chunk) = self.chunks.recv().await {
            if let Err(err) = self.write_chunk(&chunk).await {
                self.flow.fail();
                self.chunks.close();
                return Err(err);
            }

            written += chunk.len() as u64;
            self.flow.dequeue(chunk.len());
        }

        if let Err(err) = self.sink.shutdown().await {
            self.flow.fail();
            return Err(self.sink_error(err));
        }

        debug!(sink = %self.target, bytes = written, "target flushed");

        Ok(written)
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> TransformResult<()> {
        let result = self.sink.write_all(chunk).await;
        if let Err(err) = result {
            return Err(self.sink_error(err));
        }

        if self.chunks.is_empty() {
            let result = self.sink.flush().await;
            if let Err(err) = result {
                return Err(self.sink_error(err));
            }
        }

        Ok(())
    }

    fn sink_error(&self, err: std::io::Error) -> TransformError {
        error!(sink = %self.target, error = %err, "write to target failed");
        transform_error!(
            ErrorKind::SinkError,
            "Failed to write to the target",
            format!("{}: {err}", self.target),
            source: err
        )
    }
}
