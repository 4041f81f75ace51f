//! Common types used throughout the transformation pipeline.

mod document;
mod summary;

pub use document::*;
pub use summary::*;
