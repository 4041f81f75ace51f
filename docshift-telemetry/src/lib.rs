//! Telemetry setup shared by the docshift binaries and tests.

pub mod tracing;
