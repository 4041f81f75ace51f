use std::sync::Mutex;

use tokio::sync::watch;

/// State of the flow-control handshake between a writer and its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// The sink accepts more data; the source may keep producing.
    Streaming,
    /// The sink buffer is full; the source must wait for a drain.
    Paused,
    /// The sink failed; nothing more will be drained.
    Failed,
}

/// Receiver side of the flow-control channel.
pub type FlowRx = watch::Receiver<FlowState>;

#[derive(Debug)]
struct Inner {
    buffered: usize,
}

/// Byte-counting flow control shared by a writer and the task draining its sink.
///
/// The writer calls [`FlowControl::enqueue`] for every chunk it hands to the sink and the sink
/// calls [`FlowControl::dequeue`] once the chunk is written out. Reaching the high-water mark
/// moves the state to [`FlowState::Paused`]; only a complete drain (zero buffered bytes) moves it
/// back to [`FlowState::Streaming`]. The counter and the state change under one lock, so a drain
/// racing with a pause cannot be lost.
#[derive(Debug)]
pub struct FlowControl {
    inner: Mutex<Inner>,
    high_water_mark: usize,
    tx: watch::Sender<FlowState>,
}

impl FlowControl {
    /// Creates a flow control that pauses once `high_water_mark` bytes are buffered.
    pub fn new(high_water_mark: usize) -> Self {
        let (tx, _) = watch::channel(FlowState::Streaming);

        Self {
            inner: Mutex::new(Inner { buffered: 0 }),
            high_water_mark: high_water_mark.max(1),
            tx,
        }
    }

    /// Creates a new receiver subscription.
    pub fn subscribe(&self) -> FlowRx {
        self.tx.subscribe()
    }

    /// Returns the current state.
    pub fn state(&self) -> FlowState {
        *self.tx.borrow()
    }

    /// Returns the number of bytes handed to the sink but not yet written.
    pub fn buffered(&self) -> usize {
        self.lock().buffered
    }

    /// Records `bytes` queued for the sink and returns the resulting state.
    pub fn enqueue(&self, bytes: usize) -> FlowState {
        let mut inner = self.lock();
        inner.buffered += bytes;

        if inner.buffered >= self.high_water_mark && self.state() == FlowState::Streaming {
            self.tx.send_replace(FlowState::Paused);
        }

        self.state()
    }

    /// Records `bytes` written out by the sink, resuming the source once fully drained.
    pub fn dequeue(&self, bytes: usize) {
        let mut inner = self.lock();
        inner.buffered = inner.buffered.saturating_sub(bytes);

        if inner.buffered == 0 && self.state() == FlowState::Paused {
            self.tx.send_replace(FlowState::Streaming);
        }
    }

    /// Marks the sink as failed, releasing anyone waiting for a drain.
    pub fn fail(&self) {
        let _inner = self.lock();
        self.tx.send_replace(FlowState::Failed);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The guarded counter stays consistent even if a holder panicked.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_at_high_water_mark_and_resumes_only_when_drained() {
        let flow = FlowControl::new(10);

        assert_eq!(flow.enqueue(6), FlowState::Streaming);
        assert_eq!(flow.enqueue(6), FlowState::Paused);

        flow.dequeue(6);
        assert_eq!(flow.state(), FlowState::Paused);
        assert_eq!(flow.buffered(), 6);

        flow.dequeue(6);
        assert_eq!(flow.state(), FlowState::Streaming);
        assert_eq!(flow.buffered(), 0);
    }

    #[test]
    fn failure_is_sticky() {
        let flow = FlowControl::new(1);

        assert_eq!(flow.enqueue(1), FlowState::Paused);
        flow.fail();
        flow.dequeue(1);

        assert_eq!(flow.state(), FlowState::Failed);
    }

    #[tokio::test]
    async fn subscribers_observe_the_drain() {
        let flow = FlowControl::new(1);
        let mut rx = flow.subscribe();

        flow.enqueue(4);
        assert_eq!(*rx.borrow_and_update(), FlowState::Paused);

        flow.dequeue(4);
        let state = *rx
            .wait_for(|state| *state != FlowState::Paused)
            .await
            .unwrap();
        assert_eq!(state, FlowState::Streaming);
    }
}
