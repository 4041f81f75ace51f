//! Concurrency primitives for coordinating the stages of a transformation.
//!
//! The [`flow`] module implements the handshake between the output writer and the task draining
//! its sink: the writer reports when the sink buffer fills up and the source is held back until
//! the sink signals that everything buffered has been written out.

pub mod flow;
