//! vpnator installer service entry point.
//!
//! Initialises tracing, loads configuration from environment variables
//! (prefixed with `VPNATOR_`), and starts the WebSocket endpoint that
//! accepts install requests.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::{any, get};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use vpnator_server::endpoint::{self, ServerState};
use vpnator_server::install::SshConnector;

/// Server configuration loaded from environment variables via `envy`.
///
/// Each field maps to `VPNATOR_<FIELD>`:
///   - `VPNATOR_LISTEN_ADDR`   (default `0.0.0.0:8080`)
///   - `VPNATOR_ARTIFACT_DIR`  (default `.`, where captured output lands)
#[derive(Debug, Deserialize)]
struct Config {
    /// Socket address to bind the HTTP server to.
    #[serde(default = "default_listen_addr")]
    listen_addr: String,

    /// Directory the save-output captures are written to.
    #[serde(default = "default_artifact_dir")]
    artifact_dir: PathBuf,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Minimal health-check handler for container probes.
async fn health() -> StatusCode {
    StatusCode::OK
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("vpnator-server starting");

    // 2. Load configuration from VPNATOR_* env vars.
    let config: Config = envy::prefixed("VPNATOR_")
        .from_env()
        .context("failed to load config from VPNATOR_* env vars")?;

    tracing::info!(
        listen_addr  = %config.listen_addr,
        artifact_dir = %config.artifact_dir.display(),
        "configuration loaded",
    );

    // 3. Compose the router:
    //    - `/ws`     → install request endpoint (one session per client)
    //    - `/health` → container health-check probe
    let state = Arc::new(ServerState {
        connector: SshConnector,
        artifact_dir: config.artifact_dir,
    });
    let router = axum::Router::new()
        .route("/ws", any(endpoint::ws_handler))
        .route("/health", get(health))
        .with_state(state);

    // 4. Bind and serve until Ctrl-C.
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;

    tracing::info!("installer ready — ws://{}/ws", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("vpnator-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl-C handler");
    tracing::info!("received shutdown signal");
}
