//! Streaming document transformations.
//!
//! docshift rewrites JSON document collections and CSV files: it strips or assigns document
//! identifiers and converts CSV rows into documents. Sources are decoded incrementally and
//! output is written with backpressure, so memory use stays flat for the streaming operations.

pub mod concurrency;
pub mod csv;
pub mod decoder;
pub mod error;
pub mod identifiers;
mod macros;
pub mod pipeline;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transform;
pub mod types;
pub mod writer;
