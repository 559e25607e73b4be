//! Storefront HTTP server binary.

use storefront_server::{lifecycle, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_server=info,storefront_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting storefront server");
    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        session_ttl = config.checkout.session_ttl,
        sweep_interval = config.checkout.sweep_interval,
        "Configuration loaded"
    );

    lifecycle::run(config).await
}
