//! Testing utilities for transformation runs.
//!
//! - [`sink`] - in-memory targets that write slowly or fail after a number of bytes
//! - [`source`] - in-memory sources that hand out bytes in fixed chunks and record each read
pub mod sink;
pub mod source;
