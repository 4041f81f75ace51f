use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

use crate::test_utils::sink::ThrottledSink;

/// In-memory source returning one predefined chunk per read.
///
/// When observing a [`ThrottledSink`], every read first records how many bytes the sink had
/// received at that moment, which shows whether the reader waited for the sink.
#[derive(Debug)]
pub struct ChunkedSource {
    chunks: VecDeque<Vec<u8>>,
    observed: Option<ThrottledSink>,
    observations: Arc<Mutex<Vec<usize>>>,
}

impl ChunkedSource {
    /// Creates a source that yields `chunks` in order, one per read.
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            observed: None,
            observations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records the bytes received by `sink` on every read.
    pub fn observing(mut self, sink: ThrottledSink) -> Self {
        self.observed = Some(sink);
        self
    }

    /// Returns a handle to the observations, shared with the source.
    pub fn observations(&self) -> Arc<Mutex<Vec<usize>>> {
        self.observations.clone()
    }
}

impl AsyncRead for ChunkedSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(sink) = &self.observed {
            let received = sink.received();
            self.observations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(received);
        }

        let Some(mut chunk) = self.chunks.pop_front() else {
            return Poll::Ready(Ok(()));
        };

        let len = chunk.len().min(buf.remaining());
        buf.put_slice(&chunk[..len]);

        if len < chunk.len() {
            let rest = chunk.split_off(len);
            self.chunks.push_front(rest);
        }

        Poll::Ready(Ok(()))
    }
}
