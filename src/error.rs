use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned {status} for /{path}")]
    UpstreamStatus {
        path: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("Failed to decode /{path}: {source}")]
    Parse {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metric encoding error: {0}")]
    Encoding(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
