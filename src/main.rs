//! StatusBoard server entry point.

use statusboard::config::ServerConfig;
use statusboard::probe::build_probes;
use statusboard::scheduler::{Sampler, Scheduler};
use statusboard::store::Store;
use statusboard::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("statusboard=info".parse()?))
        .init();

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting StatusBoard on port {}...", cfg.http_port);
    tracing::info!(
        "Keeping {}h / {} samples of history per service",
        cfg.history_hours,
        cfg.history_max_points
    );

    let store = Arc::new(Store::new(cfg.history_limits()));

    let probes = build_probes(&cfg.probes);
    for registered in &probes {
        if !registered.probe.is_configured() {
            tracing::warn!("{} is not configured and will report as down", registered.id);
        }
    }

    let sampler = Arc::new(Sampler::new(store.clone(), probes, cfg.probes.timeout));

    // Start scheduler
    let scheduler = Scheduler::new(sampler.clone(), cfg.sample_interval);
    scheduler.start().await;

    // Start web server
    let server = Server::new(cfg, store, sampler);
    server.start(shutdown_signal()).await?;

    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
