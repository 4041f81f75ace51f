/// Outcome of a completed transformation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Number of documents written to the target.
    pub documents: u64,
    /// Human-readable name of the target, usually its path.
    pub target: String,
}
