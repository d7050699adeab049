use anyhow::Result;
use opsdesk_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    telemetry::init(&config.telemetry);

    info!("Starting Opsdesk Core Service");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config).await
}
