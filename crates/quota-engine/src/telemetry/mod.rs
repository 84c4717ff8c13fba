//! Telemetry for the quota engine
//!
//! Structured logging goes through `tracing` directly at the call sites.
//! This module holds the optional Prometheus metrics:
//!
//! - `metrics` - counters and gauges for loading, edits and validation

pub mod metrics;

pub use metrics::{EngineMetrics, EngineMetricsRegistry};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
