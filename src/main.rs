//! pulsewatch - HTTP uptime monitor.
//!
//! Periodically probes configured endpoints, tracks up/down state, records
//! incidents, and serves a live status API.

mod config;
mod db;
mod monitor;
mod notify;
mod probe;
mod snapshot;
mod web;

use config::Config;
use db::Store;
use notify::WebhookNotifier;
use snapshot::SnapshotStore;
use web::Server;

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulsewatch=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = Config::path_from_env();
    let cfg = Config::load(&config_path)?;
    tracing::info!("Loaded {} targets from {}", cfg.targets.len(), config_path);

    // The pipeline must keep running even with the store unavailable;
    // persistence, hydration, and the history endpoints just degrade.
    let store = match Store::new(&cfg.database.path) {
        Ok(store) => {
            tracing::info!("Using database at {}", cfg.database.path);
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::error!("Database unavailable, running without persistence: {}", e);
            None
        }
    };

    // One HTTP client shared by all workers and the notifier.
    let client = probe::build_client(&cfg.monitoring.user_agent)?;
    let notifier = cfg
        .notify
        .webhook_url
        .clone()
        .map(|url| WebhookNotifier::new(client.clone(), url));

    let snapshots = Arc::new(SnapshotStore::new());
    let (shutdown, _) = broadcast::channel(1);

    let handles = monitor::start_pipeline(
        &cfg.pipeline_config(),
        &cfg.monitor_targets(),
        client,
        store.clone(),
        Arc::clone(&snapshots),
        notifier,
        &shutdown,
    );

    // SIGINT stops every pipeline stage and the web server.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
                let _ = shutdown.send(());
            }
        });
    }

    let server = Server::new(cfg.server.http_port, store, snapshots);
    server.start(shutdown.subscribe()).await?;

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
