//! Identifier allocation backed by a remote document store.
//!
//! [`IdentifierCoordinator`] hands out identifiers from a locally cached [`IdentifierBatch`] and
//! refills it from an [`IdentifierSource`] with at most one fetch in flight. Requests arriving
//! while the cache is empty wait in FIFO order for that fetch to complete.

mod batch;
mod coordinator;
pub mod couch;
pub mod memory;
mod source;

pub use batch::IdentifierBatch;
pub use coordinator::IdentifierCoordinator;
pub use source::IdentifierSource;
