//! Server lifecycle: storage setup, sweep workers, HTTP serving and graceful
//! shutdown.

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{CheckoutStore, NoCoordination, PostgresStorefront, RedisSweepLock, SweepWorker};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Run the server until a shutdown signal arrives.
///
/// Spawns two sweep workers: the primary, coordinated through a Redis lease,
/// and the uncoordinated fallback on a coarser interval. If Redis is
/// unreachable at startup the primary is skipped and the fallback carries the
/// load alone; the server still starts.
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail, or the
/// listener cannot bind.
pub async fn run(config: Config) -> anyhow::Result<()> {
    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    let store = Arc::new(PostgresStorefront::new(pool));
    store.migrate().await?;
    info!("Database ready");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut worker_handles = Vec::new();

    match RedisSweepLock::connect(
        &config.redis.url,
        &config.redis.sweep_lock_key,
        Duration::from_secs(config.redis.sweep_lease),
    )
    .await
    {
        Ok(lock) => {
            let primary = SweepWorker::new(
                Arc::clone(&store) as Arc<dyn CheckoutStore>,
                Arc::new(lock),
                Duration::from_secs(config.checkout.sweep_interval),
                config.checkout.sweep_batch_limit,
                "primary",
            );
            worker_handles.push(primary.spawn(shutdown_tx.subscribe()));
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, running without the coordinated sweeper");
        }
    }

    // The fallback always runs. It depends on nothing but the database and
    // keeps holds from leaking when Redis or the primary worker is down.
    let fallback = SweepWorker::new(
        Arc::clone(&store) as Arc<dyn CheckoutStore>,
        Arc::new(NoCoordination),
        Duration::from_secs(config.checkout.fallback_sweep_interval),
        config.checkout.sweep_batch_limit,
        "fallback",
    );
    worker_handles.push(fallback.spawn(shutdown_tx.subscribe()));

    let session_ttl =
        chrono::Duration::seconds(i64::try_from(config.checkout.session_ttl).unwrap_or(i64::MAX));
    let state = AppState::new(
        Arc::clone(&store) as Arc<dyn storefront_core::InventoryStore>,
        Arc::clone(&store) as Arc<dyn storefront_core::CartStore>,
        store as Arc<dyn CheckoutStore>,
        session_ttl,
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping sweep workers");
    let _ = shutdown_tx.send(());
    for handle in worker_handles {
        if tokio::time::timeout(Duration::from_secs(config.server.shutdown_timeout), handle)
            .await
            .is_err()
        {
            warn!("Sweep worker did not stop within the shutdown timeout");
        }
    }
    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
