//! Bridgeline Telemetry - Structured Logging

pub mod tracer;

pub use tracer::{init_tracing, TelemetryConfig};
