//! Per-scrape collection and Prometheus text encoding.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use prometheus::{Encoder, GaugeVec, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::client::{as_number, ApiStats, SystemMetrics, TypesenseClient, CPU_KEY_PREFIX};
use crate::error::ExporterError;
use crate::metrics::MetricSchema;
use crate::{ms_to_seconds, percentage_to_ratio, MetricSample};

/// Label used for the CPU entry that covers all cores.
pub const CPU_AGGREGATE_LABEL: &str = "all";

const CPU_KEY_SUFFIX: &str = "_active_percentage";

/// Maps an upstream CPU key to its `cpu` label value.
///
/// `system_cpu3_active_percentage` becomes `3`, `system_cpu_0` becomes `0`
/// and the core-less `system_cpu_active_percentage` becomes `all`.
pub fn cpu_label(key: &str) -> String {
    let core = key.strip_prefix(CPU_KEY_PREFIX).unwrap_or(key);
    let core = core.strip_suffix(CPU_KEY_SUFFIX).unwrap_or(core);
    let core = core.trim_matches('_');
    if core.is_empty() {
        CPU_AGGREGATE_LABEL.to_string()
    } else {
        core.to_string()
    }
}

/// Samples for one `/metrics.json` snapshot.
pub fn system_samples<'a>(schema: &'a MetricSchema, metrics: &SystemMetrics) -> Vec<MetricSample<'a>> {
    let mut samples = Vec::with_capacity(metrics.cpu_active_percentage.len() + 13);
    let mut seen = HashSet::new();

    for (key, value) in &metrics.cpu_active_percentage {
        let Some(percentage) = as_number(value) else {
            debug!(key = %key, %value, "skipping non-numeric cpu value");
            continue;
        };

        // Distinct upstream keys must stay distinct series.
        let mut label = cpu_label(key);
        if seen.contains(&label) {
            let fallback = key.strip_prefix(CPU_KEY_PREFIX).unwrap_or(key).trim_matches('_');
            let fallback = if fallback.is_empty() || seen.contains(fallback) {
                key.clone()
            } else {
                fallback.to_string()
            };
            warn!(key = %key, %label, %fallback, "cpu label already taken, using raw key");
            label = fallback;
        }
        seen.insert(label.clone());

        samples.push(MetricSample::labelled(
            &schema.cpu_active,
            label,
            percentage_to_ratio(percentage),
        ));
    }

    let fixed = [
        (&schema.disk_total, metrics.system_disk_total_bytes),
        (&schema.disk_used, metrics.system_disk_used_bytes),
        (&schema.memory_total, metrics.system_memory_total_bytes),
        (&schema.memory_used, metrics.system_memory_used_bytes),
        (&schema.network_received, metrics.system_network_received_bytes),
        (&schema.network_sent, metrics.system_network_sent_bytes),
        (&schema.memory_active, metrics.typesense_memory_active_bytes),
        (&schema.memory_allocated, metrics.typesense_memory_allocated_bytes),
        (&schema.memory_fragmentation, metrics.typesense_memory_fragmentation_ratio),
        (&schema.memory_mapped, metrics.typesense_memory_mapped_bytes),
        (&schema.memory_metadata, metrics.typesense_memory_metadata_bytes),
        (&schema.memory_resident, metrics.typesense_memory_resident_bytes),
        (&schema.memory_retained, metrics.typesense_memory_retained_bytes),
    ];
    samples.extend(fixed.into_iter().map(|(d, v)| MetricSample::new(d, v)));

    samples
}

/// Samples for one `/stats.json` snapshot.
pub fn stats_samples<'a>(schema: &'a MetricSchema, stats: &ApiStats) -> Vec<MetricSample<'a>> {
    let mut samples = Vec::new();

    for (endpoint, value) in &stats.latency_ms {
        match as_number(value) {
            Some(ms) => samples.push(MetricSample::labelled(
                &schema.endpoint_latency,
                endpoint.as_str(),
                ms_to_seconds(ms),
            )),
            None => debug!(endpoint = %endpoint, %value, "skipping non-numeric endpoint latency"),
        }
    }

    for (endpoint, value) in &stats.requests_per_second {
        match as_number(value) {
            Some(rps) => samples.push(MetricSample::labelled(
                &schema.endpoint_requests,
                endpoint.as_str(),
                rps,
            )),
            None => debug!(endpoint = %endpoint, %value, "skipping non-numeric endpoint throughput"),
        }
    }

    let operations = [
        ("delete", stats.delete_latency_ms, stats.delete_requests_per_second),
        ("import", stats.import_latency_ms, stats.import_requests_per_second),
        ("search", stats.search_latency_ms, stats.search_requests_per_second),
        ("write", stats.write_latency_ms, stats.write_requests_per_second),
    ];
    for (operation, latency_ms, rps) in operations {
        samples.push(MetricSample::labelled(
            &schema.operation_latency,
            operation,
            ms_to_seconds(latency_ms),
        ));
        samples.push(MetricSample::labelled(&schema.operation_requests, operation, rps));
    }

    samples.push(MetricSample::new(&schema.pending_write_batches, stats.pending_write_batches));
    samples.push(MetricSample::new(&schema.total_requests, stats.total_requests_per_second));

    samples
}

/// Renders samples in the Prometheus text format.
///
/// A throwaway registry is built per call so concurrent scrapes never share
/// gauge state. Samples whose labels do not fit their descriptor are dropped,
/// as is any repeat of a series already set in this call.
pub fn encode(schema: &MetricSchema, samples: &[MetricSample<'_>]) -> Result<String, ExporterError> {
    let registry = Registry::new();
    let mut gauges = HashMap::new();
    let mut written = HashSet::new();

    for descriptor in schema.descriptors() {
        let gauge = GaugeVec::new(descriptor.opts(), descriptor.label_names)?;
        registry.register(Box::new(gauge.clone()))?;
        gauges.insert(descriptor.fq_name(), gauge);
    }

    for sample in samples {
        let name = sample.descriptor.fq_name();
        if !sample.is_well_formed() {
            warn!(metric = %name, labels = ?sample.labels, "label arity mismatch, dropping sample");
            continue;
        }
        let Some(gauge) = gauges.get(&name) else {
            warn!(metric = %name, "sample for unknown descriptor, dropping");
            continue;
        };
        if !written.insert((name.clone(), sample.labels.clone())) {
            warn!(metric = %name, labels = ?sample.labels, value = sample.value, "duplicate series, keeping first value");
            continue;
        }
        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        match gauge.get_metric_with_label_values(&labels) {
            Ok(g) => g.set(sample.value),
            Err(e) => warn!(metric = %name, error = %e, "dropping sample"),
        }
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| ExporterError::Encoding(prometheus::Error::Msg(e.to_string())))
}

/// Scrape orchestrator for a single Typesense instance.
#[derive(Debug, Clone)]
pub struct Exporter {
    client: TypesenseClient,
    schema: MetricSchema,
}

impl Exporter {
    pub fn new(client: TypesenseClient, schema: MetricSchema) -> Self {
        Self { client, schema }
    }

    /// Runs one scrape: liveness first, then system metrics and API stats
    /// concurrently. Always returns at least the `up` sample.
    pub async fn scrape(&self) -> Vec<MetricSample<'_>> {
        let start = Instant::now();

        let mut samples = vec![self.collect_up().await];
        let (system, stats) = tokio::join!(self.collect_metrics(), self.collect_stats());
        samples.extend(system);
        samples.extend(stats);

        debug!(
            samples = samples.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "scrape complete"
        );
        samples
    }

    /// Scrape and encode in one step.
    pub async fn render(&self) -> Result<String, ExporterError> {
        let samples = self.scrape().await;
        encode(&self.schema, &samples)
    }

    /// `typesense_up`: 1 only when `/health` answered `{"ok": true}`.
    pub async fn collect_up(&self) -> MetricSample<'_> {
        let up = match self.client.fetch_health().await {
            Ok(true) => 1.0,
            Ok(false) => {
                warn!("typesense health check reported not ok");
                0.0
            }
            Err(e) => {
                warn!(error = %e, "typesense health check failed");
                0.0
            }
        };
        MetricSample::new(&self.schema.up, up)
    }

    pub async fn collect_metrics(&self) -> Vec<MetricSample<'_>> {
        match self.client.fetch_system_metrics().await {
            Ok(metrics) => system_samples(&self.schema, &metrics),
            Err(e) => {
                warn!(error = %e, "failed to collect system metrics");
                Vec::new()
            }
        }
    }

    pub async fn collect_stats(&self) -> Vec<MetricSample<'_>> {
        match self.client.fetch_api_stats().await {
            Ok(stats) => stats_samples(&self.schema, &stats),
            Err(e) => {
                warn!(error = %e, "failed to collect api stats");
                Vec::new()
            }
        }
    }
}
