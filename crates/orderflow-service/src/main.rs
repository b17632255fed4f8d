//! Orderflow Service - order ingest, consumer loops and query API
//!
//! This is the main entry point for the orderflow service.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use orderflow_log::{EventLog, RocksLog};
use orderflow_service::{create_router, spawn_aggregation, spawn_consumers, AppState, ServiceConfig};
use orderflow_store::{RocksStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let instance_id = Uuid::new_v4();
    tracing::info!(instance_id = %instance_id, "Starting Orderflow Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        topic = %config.log_topic,
        group = %config.consumer_group,
        workers = config.consumer_workers,
        aggregate_interval_secs = ?config.aggregate_interval_seconds,
        "Service configuration loaded"
    );

    // Failure to open either is fatal.
    tracing::info!(path = %config.log_dir().display(), "Opening RocksDB log");
    let log: Arc<dyn EventLog> = Arc::new(RocksLog::open(config.log_dir())?);

    tracing::info!(path = %config.store_dir().display(), "Opening RocksDB store");
    let store: Arc<dyn Store> = Arc::new(RocksStore::open(config.store_dir())?);

    let partitions = log.create_topic(&config.log_topic, config.log_partitions)?;
    tracing::info!(topic = %config.log_topic, partitions, "Topic ready");

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(Arc::clone(&log), Arc::clone(&store), config.clone());
    let consumers = spawn_consumers(&log, &store, &config, &shutdown_rx)?;
    let schedule = spawn_aggregation(&state.aggregator, &config, &shutdown_rx);

    // Create the router
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let each consumer loop finish the record it is applying.
    tracing::info!("HTTP server stopped, draining consumer loops");
    let _ = shutdown_tx.send(true);

    for (worker, result) in futures::future::join_all(consumers)
        .await
        .into_iter()
        .enumerate()
    {
        match result {
            Ok(stats) => tracing::info!(
                worker,
                applied = stats.applied,
                dropped = stats.dropped,
                failed = stats.failed,
                "Consumer loop finished"
            ),
            Err(e) => tracing::error!(worker, error = %e, "Consumer loop panicked"),
        }
    }
    if let Some(schedule) = schedule {
        if let Err(e) = schedule.await {
            tracing::error!(error = %e, "Aggregation schedule panicked");
        }
    }

    tracing::info!(instance_id = %instance_id, "Orderflow Service stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
