//! podpipe-server - Podcast Publishing Pipeline Service
//!
//! Accepts an uploaded recording plus metadata, loudness-normalizes it,
//! uploads the result to a file-hosting service, and creates a draft post
//! on a content-management system, streaming progress to the caller.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use podpipe_common::config::{resolve_encryption_key, ServiceConfig};
use podpipe_server::services::SecretStore;
use podpipe_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting podpipe-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration (env > TOML > defaults) and create work dirs
    let config = ServiceConfig::load()?;
    config.ensure_directories()?;

    // Key resolution logs its own warning when it falls back to a
    // generated key
    let (key, _source) = resolve_encryption_key(&config)?;
    let secrets = SecretStore::new(config.credentials_path(), &key);
    info!("Credentials configured: {}", secrets.is_configured());

    // One HTTP client shared by every outbound call; the request timeout
    // bounds login, upload and publish calls alike
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), Arc::new(secrets), http);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
