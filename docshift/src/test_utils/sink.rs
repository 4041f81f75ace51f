use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

#[derive(Debug, Default)]
struct Inner {
    contents: Vec<u8>,
    writes: u64,
    flushes: u64,
    shut_down: bool,
}

/// In-memory sink that is always behind: every other write is left pending once, and each
/// accepted write takes at most `max_chunk` bytes.
///
/// Clones share the written contents, so a test can keep one clone and hand the other to a
/// writer.
#[derive(Debug, Clone)]
pub struct ThrottledSink {
    inner: Arc<Mutex<Inner>>,
    max_chunk: usize,
    stall_next: bool,
}

impl ThrottledSink {
    /// Creates an empty sink accepting up to 64 bytes per write.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            max_chunk: 64,
            stall_next: true,
        }
    }

    /// Limits every accepted write to `max_chunk` bytes.
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk.max(1);
        self
    }

    /// Returns a copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().contents.clone()
    }

    /// Returns everything written so far as text.
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.lock().contents).into_owned()
    }

    /// Returns the number of bytes accepted so far.
    pub fn received(&self) -> usize {
        self.lock().contents.len()
    }

    /// Returns the number of accepted writes.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    /// Returns the number of flushes.
    pub fn flushes(&self) -> u64 {
        self.lock().flushes
    }

    /// Returns `true` once the sink has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ThrottledSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncWrite for ThrottledSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.stall_next {
            self.stall_next = false;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        self.stall_next = true;
        let len = buf.len().min(self.max_chunk);

        let mut inner = self.lock();
        inner.contents.extend_from_slice(&buf[..len]);
        inner.writes += 1;

        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.lock().flushes += 1;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.lock().shut_down = true;
        Poll::Ready(Ok(()))
    }
}

/// Sink that accepts a fixed number of bytes and then fails every write.
#[derive(Debug, Clone)]
pub struct FailingSink {
    remaining: usize,
}

impl FailingSink {
    /// Creates a sink that fails once `bytes` bytes have been written.
    pub fn after(bytes: usize) -> Self {
        Self { remaining: bytes }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::StorageFull,
                "no space left on target",
            )));
        }

        let len = buf.len().min(self.remaining);
        self.remaining -= len;

        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
