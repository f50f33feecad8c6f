//! HTTP client for the Typesense diagnostic endpoints.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::config::ExporterConfig;
use crate::error::ExporterError;

pub const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

pub const PATH_HEALTH: &str = "health";
pub const PATH_METRICS: &str = "metrics.json";
pub const PATH_STATS: &str = "stats.json";

/// Keys in `/metrics.json` with this prefix are per-core CPU percentages.
pub const CPU_KEY_PREFIX: &str = "system_cpu";

/// Body of `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Body of `GET /metrics.json`.
///
/// Typesense reports every value as a string. Fixed fields that are absent
/// or `null` decode as zero; a fixed field that is present but not numeric fails the
/// whole response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemMetrics {
    /// Per-core CPU utilisation in percent, keyed by the upstream field name.
    /// Filled from a second pass over the body since the keys vary by host.
    #[serde(skip)]
    pub cpu_active_percentage: BTreeMap<String, Value>,

    #[serde(default, deserialize_with = "loose_f64")]
    pub system_disk_total_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub system_disk_used_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub system_memory_total_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub system_memory_used_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub system_network_received_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub system_network_sent_bytes: f64,

    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_active_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_allocated_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_fragmentation_ratio: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_mapped_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_metadata_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_resident_bytes: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub typesense_memory_retained_bytes: f64,
}

/// Body of `GET /stats.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiStats {
    #[serde(default, deserialize_with = "loose_f64")]
    pub delete_latency_ms: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub delete_requests_per_second: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub import_latency_ms: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub import_requests_per_second: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub search_latency_ms: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub search_requests_per_second: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub write_latency_ms: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub write_requests_per_second: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub pending_write_batches: f64,
    #[serde(default, deserialize_with = "loose_f64")]
    pub total_requests_per_second: f64,

    /// Endpoint (e.g. `GET /collections/:collection/documents/search`) to
    /// average latency in milliseconds.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub latency_ms: BTreeMap<String, Value>,
    /// Endpoint to requests per second.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requests_per_second: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

/// `null` reads as zero, the same as an absent field.
fn loose_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a numeric string, got {s:?}"))),
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, Value>, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a dynamic-map value as a number. Accepts JSON numbers and numeric
/// strings; anything else, including non-finite values, is `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Client for a single Typesense instance
#[derive(Clone)]
pub struct TypesenseClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl fmt::Debug for TypesenseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypesenseClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl TypesenseClient {
    pub fn new(config: &ExporterConfig) -> Result<Self, ExporterError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get(&self, path: &'static str) -> Result<Vec<u8>, ExporterError> {
        let url = self.endpoint(path);
        debug!(%url, "fetching");

        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ExporterError::UpstreamStatus { path, status });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    fn decode<T: DeserializeOwned>(path: &'static str, body: &[u8]) -> Result<T, ExporterError> {
        serde_json::from_slice(body).map_err(|source| {
            debug!(path, body = %String::from_utf8_lossy(body), "undecodable response");
            ExporterError::Parse { path, source }
        })
    }

    /// Probe `/health`; `Ok(false)` means reachable but not ready.
    pub async fn fetch_health(&self) -> Result<bool, ExporterError> {
        let body = self.get(PATH_HEALTH).await?;
        let health: HealthResponse = Self::decode(PATH_HEALTH, &body)?;
        Ok(health.ok)
    }

    pub async fn fetch_system_metrics(&self) -> Result<SystemMetrics, ExporterError> {
        let body = self.get(PATH_METRICS).await?;
        parse_system_metrics(&body)
    }

    pub async fn fetch_api_stats(&self) -> Result<ApiStats, ExporterError> {
        let body = self.get(PATH_STATS).await?;
        Self::decode(PATH_STATS, &body)
    }
}

/// Decodes a `/metrics.json` body, collecting the per-core CPU keys.
pub fn parse_system_metrics(body: &[u8]) -> Result<SystemMetrics, ExporterError> {
    let mut metrics: SystemMetrics = TypesenseClient::decode(PATH_METRICS, body)?;
    let raw: serde_json::Map<String, Value> = TypesenseClient::decode(PATH_METRICS, body)?;

    metrics.cpu_active_percentage = raw
        .into_iter()
        .filter(|(key, _)| key.starts_with(CPU_KEY_PREFIX))
        .collect();

    Ok(metrics)
}
