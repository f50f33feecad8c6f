//! Fixed catalogue of exported Typesense metrics.

use prometheus::Opts;

pub const NAMESPACE: &str = "typesense";
pub const SUBSYSTEM_SYSTEM: &str = "system";
pub const SUBSYSTEM_APPLICATION: &str = "application";
pub const SUBSYSTEM_API: &str = "api";

pub const LABEL_CPU: &str = "cpu";
pub const LABEL_OPERATION: &str = "operation";
pub const LABEL_ENDPOINT: &str = "endpoint";

/// Static identity of one exported metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    pub namespace: &'static str,
    pub subsystem: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    /// Variable label names; every sample supplies values in this order.
    pub label_names: &'static [&'static str],
    /// Labels with the same value on every sample.
    pub const_labels: &'static [(&'static str, &'static str)],
}

impl MetricDescriptor {
    const fn new(subsystem: &'static str, name: &'static str, help: &'static str) -> Self {
        Self {
            namespace: NAMESPACE,
            subsystem,
            name,
            help,
            label_names: &[],
            const_labels: &[],
        }
    }

    fn labels(mut self, label_names: &'static [&'static str]) -> Self {
        self.label_names = label_names;
        self
    }

    fn unit(mut self, unit: &'static [(&'static str, &'static str)]) -> Self {
        self.const_labels = unit;
        self
    }

    /// Fully-qualified name: `namespace_subsystem_name`, skipping empty parts.
    pub fn fq_name(&self) -> String {
        [self.namespace, self.subsystem, self.name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Options for registering this descriptor with a `prometheus` registry.
    pub fn opts(&self) -> Opts {
        let mut opts = Opts::new(self.name, self.help)
            .namespace(self.namespace)
            .subsystem(self.subsystem);
        for (name, value) in self.const_labels {
            opts = opts.const_label(*name, *value);
        }
        opts
    }
}

const BYTES: &[(&str, &str)] = &[("unit", "bytes")];
const RATIO: &[(&str, &str)] = &[("unit", "ratio")];

/// Every metric family the exporter can emit. Built once at startup and
/// shared read-only by all scrapes.
#[derive(Debug, Clone)]
pub struct MetricSchema {
    pub up: MetricDescriptor,

    // System
    pub cpu_active: MetricDescriptor,
    pub disk_total: MetricDescriptor,
    pub disk_used: MetricDescriptor,
    pub memory_total: MetricDescriptor,
    pub memory_used: MetricDescriptor,
    pub network_received: MetricDescriptor,
    pub network_sent: MetricDescriptor,

    // Typesense process memory
    pub memory_active: MetricDescriptor,
    pub memory_allocated: MetricDescriptor,
    pub memory_fragmentation: MetricDescriptor,
    pub memory_mapped: MetricDescriptor,
    pub memory_metadata: MetricDescriptor,
    pub memory_resident: MetricDescriptor,
    pub memory_retained: MetricDescriptor,

    // API stats
    pub operation_latency: MetricDescriptor,
    pub operation_requests: MetricDescriptor,
    pub endpoint_latency: MetricDescriptor,
    pub endpoint_requests: MetricDescriptor,
    pub pending_write_batches: MetricDescriptor,
    pub total_requests: MetricDescriptor,
}

impl MetricSchema {
    pub fn new() -> Self {
        Self {
            up: MetricDescriptor::new("", "up", "Whether the Typesense health check reported ok."),

            cpu_active: MetricDescriptor::new(
                SUBSYSTEM_SYSTEM,
                "cpu_active_ratio",
                "Ratio of CPU time spent active, per core and across all cores.",
            )
            .labels(&[LABEL_CPU]),
            disk_total: MetricDescriptor::new(SUBSYSTEM_SYSTEM, "disk_total_bytes", "Total disk space in bytes.")
                .unit(BYTES),
            disk_used: MetricDescriptor::new(SUBSYSTEM_SYSTEM, "disk_used_bytes", "Used disk space in bytes.")
                .unit(BYTES),
            memory_total: MetricDescriptor::new(SUBSYSTEM_SYSTEM, "memory_total_bytes", "Total memory in bytes.")
                .unit(BYTES),
            memory_used: MetricDescriptor::new(SUBSYSTEM_SYSTEM, "memory_used_bytes", "Used memory in bytes.")
                .unit(BYTES),
            network_received: MetricDescriptor::new(
                SUBSYSTEM_SYSTEM,
                "network_received_bytes",
                "Total bytes received by the network interface.",
            )
            .unit(BYTES),
            network_sent: MetricDescriptor::new(
                SUBSYSTEM_SYSTEM,
                "network_sent_bytes",
                "Total bytes sent by the network interface.",
            )
            .unit(BYTES),

            memory_active: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_active_bytes",
                "Active memory of the Typesense process in bytes.",
            )
            .unit(BYTES),
            memory_allocated: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_allocated_bytes",
                "Allocated memory of the Typesense process in bytes.",
            )
            .unit(BYTES),
            memory_fragmentation: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_fragmentation_ratio",
                "Memory fragmentation ratio of the Typesense process.",
            )
            .unit(RATIO),
            memory_mapped: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_mapped_bytes",
                "Mapped memory of the Typesense process in bytes.",
            )
            .unit(BYTES),
            memory_metadata: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_metadata_bytes",
                "Allocator metadata memory in bytes.",
            )
            .unit(BYTES),
            memory_resident: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_resident_bytes",
                "Resident memory of the Typesense process in bytes.",
            )
            .unit(BYTES),
            memory_retained: MetricDescriptor::new(
                SUBSYSTEM_APPLICATION,
                "memory_retained_bytes",
                "Retained memory of the Typesense process in bytes.",
            )
            .unit(BYTES),

            operation_latency: MetricDescriptor::new(
                SUBSYSTEM_API,
                "operation_latency_seconds",
                "Average latency of the operation in seconds.",
            )
            .labels(&[LABEL_OPERATION]),
            operation_requests: MetricDescriptor::new(
                SUBSYSTEM_API,
                "operation_requests_per_second",
                "Requests per second for the operation.",
            )
            .labels(&[LABEL_OPERATION]),
            endpoint_latency: MetricDescriptor::new(
                SUBSYSTEM_API,
                "endpoint_latency_seconds",
                "Average latency of the endpoint in seconds.",
            )
            .labels(&[LABEL_ENDPOINT]),
            endpoint_requests: MetricDescriptor::new(
                SUBSYSTEM_API,
                "endpoint_requests_per_second",
                "Requests per second for the endpoint.",
            )
            .labels(&[LABEL_ENDPOINT]),
            pending_write_batches: MetricDescriptor::new(
                SUBSYSTEM_API,
                "pending_write_batches",
                "Number of write batches waiting to be applied.",
            ),
            total_requests: MetricDescriptor::new(
                SUBSYSTEM_API,
                "requests_per_second",
                "Total requests per second across all operations.",
            ),
        }
    }

    /// All descriptors, for registration with an output sink.
    pub fn descriptors(&self) -> Vec<&MetricDescriptor> {
        vec![
            &self.up,
            &self.cpu_active,
            &self.disk_total,
            &self.disk_used,
            &self.memory_total,
            &self.memory_used,
            &self.network_received,
            &self.network_sent,
            &self.memory_active,
            &self.memory_allocated,
            &self.memory_fragmentation,
            &self.memory_mapped,
            &self.memory_metadata,
            &self.memory_resident,
            &self.memory_retained,
            &self.operation_latency,
            &self.operation_requests,
            &self.endpoint_latency,
            &self.endpoint_requests,
            &self.pending_write_batches,
            &self.total_requests,
        ]
    }

}

impl Default for MetricSchema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_descriptor_count() {
        assert_eq!(MetricSchema::new().descriptors().len(), 21);
    }

    #[test]
    fn test_names_prefixed() {
        for d in MetricSchema::new().descriptors() {
            assert!(d.fq_name().starts_with("typesense_"), "{}", d.fq_name());
        }
    }

    #[test]
    fn test_names_unique() {
        let schema = MetricSchema::new();
        let names: Vec<String> = schema.descriptors().iter().map(|d| d.fq_name()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_fq_name_skips_empty_subsystem() {
        let schema = MetricSchema::new();
        assert_eq!(schema.up.fq_name(), "typesense_up");
        assert_eq!(schema.disk_total.fq_name(), "typesense_system_disk_total_bytes");
        assert_eq!(schema.total_requests.fq_name(), "typesense_api_requests_per_second");
    }

    #[test]
    fn test_label_cardinality() {
        let schema = MetricSchema::new();
        assert_eq!(schema.cpu_active.label_names, &[LABEL_CPU]);
        assert_eq!(schema.operation_latency.label_names, &[LABEL_OPERATION]);
        assert_eq!(schema.operation_requests.label_names, &[LABEL_OPERATION]);
        assert_eq!(schema.endpoint_latency.label_names, &[LABEL_ENDPOINT]);
        assert_eq!(schema.endpoint_requests.label_names, &[LABEL_ENDPOINT]);

        let labelled = schema
            .descriptors()
            .into_iter()
            .filter(|d| !d.label_names.is_empty())
            .count();
        assert_eq!(labelled, 5);
    }

    #[test]
    fn test_byte_gauges_carry_unit() {
        let schema = MetricSchema::new();
        for d in schema.descriptors() {
            if d.name.ends_with("_bytes") {
                assert_eq!(d.const_labels, &[("unit", "bytes")], "{}", d.fq_name());
            }
        }
        assert_eq!(schema.memory_fragmentation.const_labels, &[("unit", "ratio")]);
    }

    #[test]
    fn test_opts_match_fq_name() {
        let schema = MetricSchema::new();
        let opts = schema.memory_resident.opts();
        assert_eq!(opts.fq_name(), schema.memory_resident.fq_name());
        assert_eq!(opts.const_labels.get("unit").map(String::as_str), Some("bytes"));
    }
}
