//! cadence-api - Main entry point
//!
//! Content-marketing backend: organization onboarding, keyword discovery
//! and content calendar scheduling over HTTP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cadence_api::config::ServiceConfig;
use cadence_api::{build_router, AppState, Collaborators};
use cadence_common::config::TomlConfig;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cadence-api
#[derive(Parser, Debug)]
#[command(name = "cadence-api")]
#[command(about = "Content calendar and keyword discovery service")]
#[command(version)]
struct Args {
    /// Configuration file (overrides CADENCE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5780
    #[arg(short, long, env = "CADENCE_BIND")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "CADENCE_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        toml_config.bind_address = Some(bind);
    }
    if let Some(database) = args.database {
        toml_config.database.path = Some(database);
    }

    // RUST_LOG wins over [logging] level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cadence-api v{}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::resolve(toml_config);
    config.validate().context("Invalid configuration")?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = cadence_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let collaborators =
        Collaborators::from_config(&config).context("Failed to build external clients")?;
    let policy = config.scheduling_policy();
    info!(
        window_days = policy.window_days,
        min_batch = policy.min_batch,
        "Scheduling policy"
    );

    let state = AppState::new(pool.clone(), collaborators, policy, config.max_lock_wait_ms());
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
