//! # typesense-exporter
//!
//! Prometheus exporter for Typesense. Every scrape polls the upstream
//! `/health`, `/metrics.json` and `/stats.json` endpoints and republishes the
//! values as gauges. A failing upstream call only removes the samples it
//! would have produced; the exposition itself never fails because of it.

pub mod client;
pub mod config;
pub mod error;
pub mod exporter;
pub mod logging;
pub mod metrics;
pub mod server;

pub use client::TypesenseClient;
pub use config::ExporterConfig;
pub use error::ExporterError;
pub use exporter::Exporter;
pub use metrics::{MetricDescriptor, MetricSchema};

/// One emitted data point. Created per scrape and dropped once encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample<'a> {
    pub descriptor: &'a MetricDescriptor,
    /// Positional values for `descriptor.label_names`.
    pub labels: Vec<String>,
    pub value: f64,
}

impl<'a> MetricSample<'a> {
    /// Sample for a descriptor without variable labels.
    pub fn new(descriptor: &'a MetricDescriptor, value: f64) -> Self {
        Self {
            descriptor,
            labels: Vec::new(),
            value,
        }
    }

    /// Sample for a descriptor with exactly one variable label.
    pub fn labelled(descriptor: &'a MetricDescriptor, label: impl Into<String>, value: f64) -> Self {
        Self {
            descriptor,
            labels: vec![label.into()],
            value,
        }
    }

    /// Label values line up with the descriptor's label names.
    pub fn is_well_formed(&self) -> bool {
        self.labels.len() == self.descriptor.label_names.len()
    }

    /// Value of the named label, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Converts a 0-100 percentage to a 0-1 ratio.
pub fn percentage_to_ratio(percentage: f64) -> f64 {
    percentage / 100.0
}

/// Converts milliseconds to seconds.
pub fn ms_to_seconds(ms: f64) -> f64 {
    ms / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentage_to_ratio() {
        assert_eq!(percentage_to_ratio(0.0), 0.0);
        assert_eq!(percentage_to_ratio(50.0), 0.5);
        assert_eq!(percentage_to_ratio(100.0), 1.0);
    }

    #[test]
    fn test_ms_to_seconds() {
        assert_eq!(ms_to_seconds(0.0), 0.0);
        assert_eq!(ms_to_seconds(1500.0), 1.5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_percentage_to_ratio_divides_by_hundred(p in 0.0f64..=100.0) {
            let ratio = percentage_to_ratio(p);
            prop_assert_eq!(ratio, p / 100.0);
            prop_assert!((0.0..=1.0).contains(&ratio));
        }

        #[test]
        fn prop_ms_to_seconds_divides_by_thousand(m in 0.0f64..1e9) {
            let secs = ms_to_seconds(m);
            prop_assert_eq!(secs, m / 1000.0);
            prop_assert!(secs <= m);
        }
    }

    #[test]
    fn test_sample_well_formed() {
        let schema = MetricSchema::new();
        assert!(MetricSample::new(&schema.up, 1.0).is_well_formed());
        assert!(MetricSample::labelled(&schema.cpu_active, "0", 0.5).is_well_formed());
        assert!(!MetricSample::new(&schema.cpu_active, 0.5).is_well_formed());
        assert!(!MetricSample::labelled(&schema.disk_total, "x", 1.0).is_well_formed());
    }

    #[test]
    fn test_sample_label_lookup() {
        let schema = MetricSchema::new();
        let sample = MetricSample::labelled(&schema.endpoint_requests, "search", 12.5);
        assert_eq!(sample.label("endpoint"), Some("search"));
        assert_eq!(sample.label("operation"), None);
    }
}
