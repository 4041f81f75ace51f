use tracing::info;

/// Number of documents between two progress reports.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Counts processed documents and logs a progress line at a fixed interval.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    operation: &'static str,
    interval: u64,
    processed: u64,
    reported: u64,
}

impl ProgressTracker {
    /// Creates a tracker reporting every [`PROGRESS_INTERVAL`] documents.
    pub fn new(operation: &'static str) -> Self {
        Self::with_interval(operation, PROGRESS_INTERVAL)
    }

    /// Creates a tracker reporting every `interval` documents.
    pub fn with_interval(operation: &'static str, interval: u64) -> Self {
        Self {
            operation,
            interval: interval.max(1),
            processed: 0,
            reported: 0,
        }
    }

    /// Records one processed document, returning `true` if a report was logged.
    pub fn record(&mut self) -> bool {
        self.processed += 1;

        if self.processed - self.reported < self.interval {
            return false;
        }

        self.report();
        true
    }

    /// Logs the documents processed since the last report, if any, returning `true` if it did.
    pub fn finish(&mut self) -> bool {
        if self.processed == self.reported {
            return false;
        }

        self.report();
        true
    }

    /// Returns the number of documents recorded so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    fn report(&mut self) {
        let batch = self.processed - self.reported;
        self.reported = self.processed;

        info!(
            operation = self.operation,
            batch,
            documents = self.processed,
            "processed {} documents",
            self.processed
        );
    }
}
