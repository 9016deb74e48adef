//! Haven intake service.
//!
//! Wires the in-memory store, the HTTP stage adapters, the decision engine
//! and the execution handlers into one lifecycle orchestrator, and exposes
//! intake and read endpoints over HTTP.

use clap::Parser;
use haven_clients::{HttpClassifier, HttpRiskScorer, HttpSimulator, StageEndpoint};
use haven_dispatch::HandlerRegistry;
use haven_orchestrator::LifecycleOrchestrator;
use haven_storage::memory::InMemoryHavenStorage;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;

use api::AppState;
use config::ServiceConfig;

/// Haven service CLI.
#[derive(Parser)]
#[command(name = "havend")]
#[command(about = "Haven - resident request lifecycle service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HAVEN_CONFIG")]
    config: Option<String>,

    /// Listen address override
    #[arg(short, long, env = "HAVEN_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "HAVEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "HAVEN_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen.parse()?;
    }

    let storage = Arc::new(InMemoryHavenStorage::new());
    let timeout = config.stages.call_timeout();
    let classifier = Arc::new(HttpClassifier::new(StageEndpoint::new(
        config.stages.classification_url.clone(),
        timeout,
    ))?);
    let risk_scorer = Arc::new(HttpRiskScorer::new(StageEndpoint::new(
        config.stages.risk_url.clone(),
        timeout,
    ))?);
    let simulator = Arc::new(HttpSimulator::new(StageEndpoint::new(
        config.stages.simulation_url.clone(),
        timeout,
    ))?);

    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        storage.clone(),
        classifier,
        risk_scorer,
        simulator,
        HandlerRegistry::with_defaults(),
        config.weights,
        config.retry.policy(),
    ));

    let state = AppState {
        orchestrator,
        storage,
    };

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    tracing::info!(addr = %config.server.listen_addr, "haven service listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
    }
}
