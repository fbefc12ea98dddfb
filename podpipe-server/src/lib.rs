//! podpipe-server library interface
//!
//! Exposes the application state and router for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use podpipe_common::config::ServiceConfig;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::secret_store::SecretStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Service configuration (read-only after startup)
    pub config: Arc<ServiceConfig>,
    /// Encrypted credentials store
    pub secrets: Arc<SecretStore>,
    /// Shared HTTP client for the remote storage and CMS collaborators
    pub http: reqwest::Client,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<ServiceConfig>, secrets: Arc<SecretStore>, http: reqwest::Client) -> Self {
        Self {
            config,
            secrets,
            http,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::health_routes())
        .merge(api::credentials::credentials_routes())
        // Upload size is unbounded: the whole recording streams through
        .merge(api::upload::upload_routes().layer(DefaultBodyLimit::disable()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
