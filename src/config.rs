use std::fmt;
use std::time::Duration;

use crate::error::ExporterError;

pub const ENV_API_KEY: &str = "TYPESENSE_API_KEY";
pub const ENV_URL: &str = "TYPESENSE_URL";
pub const ENV_PORT: &str = "EXPORTER_PORT";
pub const ENV_INSECURE_SKIP_VERIFY: &str = "INSECURE_SKIP_VERIFY";
pub const ENV_TIMEOUT_SECONDS: &str = "TYPESENSE_TIMEOUT_SECONDS";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

pub const DEFAULT_PORT: u16 = 9101;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Exporter configuration
#[derive(Clone)]
pub struct ExporterConfig {
    /// Typesense API key sent with every upstream request
    pub api_key: String,
    /// Typesense base URL, e.g. `https://typesense.internal:8108`
    pub url: String,
    /// Port the exporter listens on
    pub port: u16,
    /// Skip TLS certificate verification for the upstream connection
    pub insecure_skip_verify: bool,
    /// Per-request timeout for upstream calls
    pub timeout: Duration,
    pub log_format: LogFormat,
}

impl ExporterConfig {
    /// Minimal config for the given upstream; everything else at defaults.
    pub fn new(api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: url.into(),
            port: DEFAULT_PORT,
            insecure_skip_verify: false,
            timeout: DEFAULT_TIMEOUT,
            log_format: LogFormat::default(),
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ExporterError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExporterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ExporterError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required(ENV_API_KEY)?, required(ENV_URL)?);

        if let Some(port) = lookup(ENV_PORT) {
            config.port = port
                .parse()
                .map_err(|_| ExporterError::Config(format!("{ENV_PORT} is not a valid port: {port}")))?;
        }

        if let Some(value) = lookup(ENV_INSECURE_SKIP_VERIFY) {
            config.insecure_skip_verify = value == "true";
        }

        if let Some(secs) = lookup(ENV_TIMEOUT_SECONDS) {
            let secs: u64 = secs.parse().map_err(|_| {
                ExporterError::Config(format!("{ENV_TIMEOUT_SECONDS} is not a whole number: {secs}"))
            })?;
            if secs == 0 {
                return Err(ExporterError::Config(format!(
                    "{ENV_TIMEOUT_SECONDS} must be greater than zero"
                )));
            }
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.log_format = match format.to_ascii_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ExporterError::Config(format!(
                        "{ENV_LOG_FORMAT} must be text or json, got {other}"
                    )))
                }
            };
        }

        Ok(config)
    }
}

impl fmt::Debug for ExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExporterConfig")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .field("port", &self.port)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout", &self.timeout)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExporterConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_URL, "http://localhost:8108"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.url, "http://localhost:8108");
        assert_eq!(config.port, 9101);
        assert!(!config.insecure_skip_verify);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_missing_api_key() {
        let err = ExporterConfig::from_lookup(lookup_from(&[(ENV_URL, "http://localhost:8108")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));
    }

    #[test]
    fn test_missing_url() {
        let err = ExporterConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "secret")])).unwrap_err();
        assert!(matches!(err, ExporterError::Config(msg) if msg.contains(ENV_URL)));
    }

    #[test]
    fn test_overrides() {
        let config = ExporterConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_URL, "https://ts.internal"),
            (ENV_PORT, "9200"),
            (ENV_INSECURE_SKIP_VERIFY, "true"),
            (ENV_TIMEOUT_SECONDS, "2"),
            (ENV_LOG_FORMAT, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9200);
        assert!(config.insecure_skip_verify);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_insecure_requires_literal_true() {
        for value in ["1", "yes", "TRUE", ""] {
            let config = ExporterConfig::from_lookup(lookup_from(&[
                (ENV_API_KEY, "secret"),
                (ENV_URL, "http://localhost:8108"),
                (ENV_INSECURE_SKIP_VERIFY, value),
            ]))
            .unwrap();
            assert!(!config.insecure_skip_verify, "{value:?} should not enable");
        }
    }

    #[test]
    fn test_invalid_port() {
        let result = ExporterConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_URL, "http://localhost:8108"),
            (ENV_PORT, "not-a-port"),
        ]));
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = ExporterConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "secret"),
            (ENV_URL, "http://localhost:8108"),
            (ENV_TIMEOUT_SECONDS, "0"),
        ]));
        assert!(matches!(result, Err(ExporterError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ExporterConfig::new("super-secret-key", "http://localhost:8108");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("http://localhost:8108"));
    }
}
