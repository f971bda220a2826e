use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pvz::config::{Config, Overrides};
use pvz::AppState;

#[derive(Parser, Debug)]
#[command(name = "pvz")]
#[command(author, version, about = "Pickup point intake service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pvz.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the listen port
    #[arg(short, long, env = "PVZ_PORT")]
    port: Option<u16>,

    /// Database connection string
    #[arg(long, env = "PVZ_DATABASE_URL")]
    database_url: Option<String>,

    /// Token signing secret
    #[arg(long, env = "PVZ_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Secret mixed into password hashes
    #[arg(long, env = "PVZ_PASSWORD_SECRET", hide_env_values = true)]
    password_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?.apply(Overrides {
        database_url: cli.database_url,
        jwt_secret: cli.jwt_secret,
        password_secret: cli.password_secret,
        port: cli.port,
    });

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pvz v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    // Initialize database
    let db = pvz::db::init(&config.database).await?;

    // Create app state
    let mut state = AppState::new(config.clone(), db);
    if config.metrics.enabled {
        let handle = pvz::api::metrics::init_metrics()
            .context("Failed to install Prometheus recorder")?;
        state = state.with_metrics(handle);
    }
    let state = Arc::new(state);

    let app = pvz::api::create_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
