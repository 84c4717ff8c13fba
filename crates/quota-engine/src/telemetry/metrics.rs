//! Prometheus metrics for the quota engine
//!
//! - `edits_total` (counter) - edits by field and outcome (stored/dropped)
//! - `validations_total` (counter) - full-tree validations by result
//! - `validation_duration_seconds` (histogram) - full-tree validation time
//! - `load_failures_total` (counter) - loading failures by stage
//! - `tree_complete` (gauge) - 1 while the tree is complete
//!
//! # Example
//!
//! ```rust,no_run
//! use quota_engine::telemetry::EngineMetricsRegistry;
//!
//! let registry = EngineMetricsRegistry::new().unwrap();
//! let metrics = registry.engine();
//!
//! metrics.record_edit("quota", true);
//! metrics.record_validation(false, 0.002);
//!
//! println!("{}", registry.encode_text().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use super::{Result, TelemetryError};

const NAMESPACE: &str = "quota_engine";

/// Engine metrics registered with a Prometheus registry
#[derive(Clone)]
pub struct EngineMetrics {
    edits_total: CounterVec,
    validations_total: CounterVec,
    validation_duration_seconds: HistogramVec,
    load_failures_total: CounterVec,
    tree_complete: Gauge,
}

impl EngineMetrics {
    /// Create the metrics and register them with the provided registry
    pub fn new(registry: &Registry) -> Result<Self> {
        let edits_total = CounterVec::new(
            Opts::new("edits_total", "Total number of applied edits by outcome")
                .namespace(NAMESPACE),
            &["field", "outcome"],
        )?;

        let validations_total = CounterVec::new(
            Opts::new("validations_total", "Total number of full-tree validations")
                .namespace(NAMESPACE),
            &["result"],
        )?;

        let validation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "validation_duration_seconds",
                "Full-tree validation duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["result"],
        )?;

        let load_failures_total = CounterVec::new(
            Opts::new("load_failures_total", "Total number of loading failures by stage")
                .namespace(NAMESPACE),
            &["stage"],
        )?;

        let tree_complete = Gauge::with_opts(
            Opts::new("tree_complete", "Whether the current value tree is complete")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(edits_total.clone()))?;
        registry.register(Box::new(validations_total.clone()))?;
        registry.register(Box::new(validation_duration_seconds.clone()))?;
        registry.register(Box::new(load_failures_total.clone()))?;
        registry.register(Box::new(tree_complete.clone()))?;

        Ok(Self {
            edits_total,
            validations_total,
            validation_duration_seconds,
            load_failures_total,
            tree_complete,
        })
    }

    /// Record an applied edit; `stored` is false when a partial object was dropped
    pub fn record_edit(&self, field: &str, stored: bool) {
        let outcome = if stored { "stored" } else { "dropped" };
        self.edits_total.with_label_values(&[field, outcome]).inc();
    }

    /// Record a full-tree validation
    pub fn record_validation(&self, complete: bool, duration_secs: f64) {
        let result = if complete { "complete" } else { "incomplete" };
        self.validations_total.with_label_values(&[result]).inc();
        self.validation_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
        self.tree_complete.set(if complete { 1.0 } else { 0.0 });
    }

    /// Record a loading failure at a stage
    pub fn record_load_failure(&self, stage: &str) {
        self.load_failures_total.with_label_values(&[stage]).inc();
    }
}

/// Registry owning the engine metrics
pub struct EngineMetricsRegistry {
    registry: Registry,
    engine: Arc<EngineMetrics>,
}

impl EngineMetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let engine = Arc::new(EngineMetrics::new(&registry)?);
        Ok(Self { registry, engine })
    }

    /// Shared handle for an engine
    pub fn engine(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.engine)
    }

    /// Gather all metric families
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode all metrics in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(TelemetryError::MetricsError)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_encode() {
        let registry = EngineMetricsRegistry::new().unwrap();
        let metrics = registry.engine();

        metrics.record_edit("quota", true);
        metrics.record_edit("quota", false);
        metrics.record_edit("labels", true);
        metrics.record_validation(true, 0.001);
        metrics.record_load_failure("validation_scheme");

        let text = registry.encode_text().unwrap();
        assert!(text.contains("quota_engine_edits_total"));
        assert!(text.contains("outcome=\"dropped\""));
        assert!(text.contains("quota_engine_validations_total"));
        assert!(text.contains("quota_engine_load_failures_total"));
        assert!(text.contains("quota_engine_tree_complete 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = EngineMetricsRegistry::new().unwrap();
        let second = EngineMetricsRegistry::new().unwrap();
        first.engine().record_edit("quota", true);
        assert!(!first.gather().is_empty());
        assert!(second.encode_text().is_ok());
    }
}
