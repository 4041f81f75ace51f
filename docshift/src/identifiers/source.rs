use std::future::Future;

use crate::error::TransformResult;

/// Trait for remote systems that can generate unique document identifiers.
///
/// Implementations perform one round-trip per call and do not retry; retry policy belongs to the
/// caller. A successful call must return at least one identifier.
pub trait IdentifierSource {
    /// Returns the name of the source, used in logs.
    fn name() -> &'static str;

    /// Fetches up to `count` fresh identifiers.
    fn fetch_identifiers(
        &self,
        count: usize,
    ) -> impl Future<Output = TransformResult<Vec<String>>> + Send;
}
