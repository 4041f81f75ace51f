use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, TransformError, TransformResult};
use crate::identifiers::{IdentifierBatch, IdentifierSource};
use crate::transform_error;

/// What a queued request learns when the fetch it waited on settles.
#[derive(Debug)]
enum Wakeup {
    /// An identifier from the new batch, served in queue order.
    Assigned(String),
    /// The batch ran out before this request's turn; try again.
    Retry,
    /// The fetch failed; the error is shared by every queued request.
    Failed(TransformError),
}

/// A request waiting for the in-flight fetch.
#[derive(Debug)]
struct PendingRequest {
    requested: usize,
    tx: oneshot::Sender<Wakeup>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    batch: IdentifierBatch,
    fetch_in_flight: bool,
    pending: VecDeque<PendingRequest>,
    fetches: u64,
}

impl CoordinatorState {
    /// Clears the in-flight flag and settles every queued request with `result`.
    fn settle(&mut self, fetch_size: usize, result: TransformResult<Vec<String>>) {
        self.fetch_in_flight = false;
        let pending = std::mem::take(&mut self.pending);

        let identifiers = match result {
            Ok(identifiers) if identifiers.is_empty() => Err(transform_error!(
                ErrorKind::FetchError,
                "Identifier source returned an empty batch",
                format!("requested {fetch_size} identifiers")
            )),
            other => other,
        };

        match identifiers {
            Ok(identifiers) => {
                info!(
                    requested = fetch_size,
                    received = identifiers.len(),
                    waiting = pending.len(),
                    "identifier batch fetched"
                );
                self.batch.extend(IdentifierBatch::new(identifiers));

                for request in pending {
                    match self.batch.pop() {
                        Some(identifier) => {
                            // A request dropped while waiting never saw its identifier.
                            if let Err(Wakeup::Assigned(identifier)) =
                                request.tx.send(Wakeup::Assigned(identifier))
                            {
                                self.batch.unpop(identifier);
                            }
                        }
                        None => {
                            debug!(
                                requested = request.requested,
                                "identifier batch exhausted before request was served"
                            );
                            let _ = request.tx.send(Wakeup::Retry);
                        }
                    }
                }
            }
            Err(err) => {
                warn!(
                    requested = fetch_size,
                    waiting = pending.len(),
                    error = %err.description(),
                    "identifier fetch failed"
                );

                for request in pending {
                    let _ = request.tx.send(Wakeup::Failed(err.clone()));
                }
            }
        }
    }
}

/// Settles queued requests if the fetch task ends without reporting a result.
struct FetchGuard {
    state: Arc<Mutex<CoordinatorState>>,
    fetch_size: usize,
    settled: bool,
}

impl FetchGuard {
    fn settle(mut self, result: TransformResult<Vec<String>>) {
        self.settled = true;
        lock(&self.state).settle(self.fetch_size, result);
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if !self.settled {
            lock(&self.state).settle(
                self.fetch_size,
                Err(transform_error!(
                    ErrorKind::FetchError,
                    "Identifier fetch was interrupted"
                )),
            );
        }
    }
}

/// Single-flight coordinator for identifier requests.
///
/// Each transformation run owns its own coordinator; clones share the cached batch and the wait
/// list. A request is served from the cached batch without suspending when possible. Otherwise it
/// joins the FIFO wait list, starting a fetch of `batch_size` identifiers if none is in flight.
/// The size of an in-flight fetch is never grown for requests that join later, so they may need
/// another round-trip once the batch runs out.
#[derive(Debug)]
pub struct IdentifierCoordinator<S> {
    source: Arc<S>,
    state: Arc<Mutex<CoordinatorState>>,
}

impl<S> Clone for IdentifierCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S> IdentifierCoordinator<S>
where
    S: IdentifierSource + Send + Sync + 'static,
{
    /// Creates a coordinator with an empty cache fetching from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    /// Returns a cached identifier if one is available, without fetching.
    pub fn try_request_identifier(&self) -> Option<String> {
        lock(&self.state).batch.pop()
    }

    /// Returns a fresh identifier, fetching a batch of `batch_size` from the source if needed.
    ///
    /// Must be called within a tokio runtime, which drives the fetch.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the fetch this request waited on fails. Later calls start a
    /// new fetch.
    pub async fn request_identifier(&self, batch_size: usize) -> TransformResult<String> {
        loop {
            let rx = {
                let mut state = lock(&self.state);

                if let Some(identifier) = state.batch.pop() {
                    return Ok(identifier);
                }

                if !state.fetch_in_flight {
                    state.fetch_in_flight = true;
                    state.fetches += 1;
                    self.spawn_fetch(batch_size.max(1));
                }

                let (tx, rx) = oneshot::channel();
                state.pending.push_back(PendingRequest {
                    requested: batch_size,
                    tx,
                });

                rx
            };

            match rx.await {
                Ok(Wakeup::Assigned(identifier)) => return Ok(identifier),
                Ok(Wakeup::Retry) => continue,
                Ok(Wakeup::Failed(err)) => return Err(err),
                Err(_) => bail!(
                    ErrorKind::InvalidState,
                    "Identifier fetch ended without settling a queued request"
                ),
            }
        }
    }

    /// Returns the number of fetches started so far.
    pub fn fetches(&self) -> u64 {
        lock(&self.state).fetches
    }

    /// Returns the number of identifiers cached and not yet handed out.
    pub fn cached(&self) -> usize {
        lock(&self.state).batch.len()
    }

    fn spawn_fetch(&self, fetch_size: usize) {
        let source = self.source.clone();
        let guard = FetchGuard {
            state: self.state.clone(),
            fetch_size,
            settled: false,
        };

        tokio::spawn(async move {
            debug!(
                source = S::name(),
                count = fetch_size,
                "fetching identifier batch"
            );
            let result = source.fetch_identifiers(fetch_size).await;
            guard.settle(result);
        });
    }
}

fn lock(state: &Mutex<CoordinatorState>) -> MutexGuard<'_, CoordinatorState> {
    // Settling never leaves the state half-updated, so a poisoned lock is still usable.
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
