use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, TransformResult};
use crate::identifiers::IdentifierSource;

#[derive(Debug)]
struct Inner {
    prefix: String,
    issued: u64,
    requests: Vec<usize>,
    failures_remaining: usize,
    batch_limit: Option<usize>,
}

/// In-memory identifier source for testing and offline development.
///
/// [`MemoryIdentifierSource`] issues sequential identifiers (`id-1`, `id-2`, ...) and records the
/// size of every fetch it receives, so tests can check how often a coordinator went to the store.
/// Failures and short batches can be scripted ahead of time. Clones share the same counters.
#[derive(Debug, Clone)]
pub struct MemoryIdentifierSource {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryIdentifierSource {
    /// Creates a source issuing identifiers prefixed with `id-`.
    pub fn new() -> Self {
        Self::with_prefix("id-")
    }

    /// Creates a source issuing identifiers prefixed with `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let inner = Inner {
            prefix: prefix.into(),
            issued: 0,
            requests: Vec::new(),
            failures_remaining: 0,
            batch_limit: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Caps every batch at `limit` identifiers regardless of the requested count.
    ///
    /// A limit of zero makes every fetch return an empty batch.
    pub fn with_batch_limit(self, limit: usize) -> Self {
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.batch_limit = Some(limit);
        }

        self
    }

    /// Makes the next `count` fetches fail with a fetch error.
    pub async fn fail_next_fetches(&self, count: usize) {
        let mut inner = self.inner.lock().await;
        inner.failures_remaining = count;
    }

    /// Returns the requested count of every fetch so far, failed ones included.
    pub async fn requests(&self) -> Vec<usize> {
        let inner = self.inner.lock().await;
        inner.requests.clone()
    }

    /// Returns the number of identifiers issued so far.
    pub async fn issued(&self) -> u64 {
        let inner = self.inner.lock().await;
        inner.issued
    }
}

impl Default for MemoryIdentifierSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierSource for MemoryIdentifierSource {
    fn name() -> &'static str {
        "memory"
    }

    async fn fetch_identifiers(&self, count: usize) -> TransformResult<Vec<String>> {
        let mut inner = self.inner.lock().await;
        inner.requests.push(count);

        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            bail!(
                ErrorKind::FetchError,
                "Identifier store is unavailable",
                format!("scripted failure for a fetch of {count} identifiers")
            );
        }

        let count = inner.batch_limit.map_or(count, |limit| count.min(limit));
        let start = inner.issued;
        inner.issued += count as u64;

        info!("issuing {} identifiers from memory", count);

        Ok((start + 1..=inner.issued)
            .map(|n| format!("{}{n}", inner.prefix))
            .collect())
    }
}
