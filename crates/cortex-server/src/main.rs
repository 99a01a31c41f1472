//! cortex-server - REST API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use cortex_core::CortexConfig;
use cortex_server::{create_pipeline, create_server, AppState};
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
}

/// Load configuration from `CORTEX_CONFIG` if set, otherwise from the environment.
fn load_config() -> anyhow::Result<CortexConfig> {
    let config = match std::env::var("CORTEX_CONFIG") {
        Ok(path) => CortexConfig::from_file(&path)
            .with_context(|| format!("failed to read config file {}", path))?
            .with_env_overrides()?,
        Err(_) => CortexConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("cortex_server=debug".parse()?),
        )
        .init();

    // Get configuration from environment
    let host = std::env::var("CORTEX_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("CORTEX_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("CORTEX_PORT must be a valid port number")?;

    let config = load_config()?;
    let pipeline = create_pipeline(&config).await?;
    let state = AppState::new(pipeline, config);
    let app = create_server(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting cortex-server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("Server stopped cleanly");
    Ok(())
}
