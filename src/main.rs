use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use typesense_exporter::{logging, server, Exporter, ExporterConfig, MetricSchema, TypesenseClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExporterConfig::from_env().context("invalid configuration")?;
    logging::init(config.log_format).map_err(|e| anyhow::anyhow!(e))?;

    if config.insecure_skip_verify {
        warn!("TLS certificate verification is disabled for the upstream connection");
    }

    let client = TypesenseClient::new(&config).context("failed to build http client")?;
    info!(url = %client.base_url(), "using typesense");

    if let Err(e) = client.fetch_health().await {
        warn!(error = %e, "can't connect to typesense");
    }

    let exporter = Arc::new(Exporter::new(client, MetricSchema::new()));
    server::serve(exporter, config.port).await?;
    Ok(())
}
