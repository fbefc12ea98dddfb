//! Credentials management API
//!
//! GET /credentials (passwords-stripped status), POST /credentials (save),
//! POST /credentials/test (live probe of both services, nothing persisted).

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{CredentialsBundle, CredentialsStatus, ServiceAccount};
use crate::services::{CmsClient, StorageClient};
use crate::AppState;

/// POST /credentials request. Sections are optional at the wire level so a
/// partial bundle can be rejected with a 400 and a message instead of a
/// deserialization error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveCredentialsRequest {
    pub remote_storage: Option<ServiceAccount>,
    pub cms: Option<ServiceAccount>,
    pub public_base_url: Option<String>,
}

/// POST /credentials response
#[derive(Debug, Serialize)]
pub struct SaveCredentialsResponse {
    pub success: bool,
    pub message: String,
}

/// POST /credentials/test request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCredentialsRequest {
    pub remote_storage: Option<ServiceAccount>,
    pub cms: Option<ServiceAccount>,
}

/// Per-service probe outcome
#[derive(Debug, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub message: String,
}

/// POST /credentials/test response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCredentialsResponse {
    pub success: bool,
    pub tests: TestReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub remote_storage: TestOutcome,
    pub cms: TestOutcome,
}

/// GET /credentials
///
/// Reports whether a bundle is stored; URLs and usernames only.
pub async fn credentials_status(State(state): State<AppState>) -> Json<CredentialsStatus> {
    match state.secrets.load() {
        Some(bundle) => Json(CredentialsStatus::from_bundle(&bundle)),
        None => Json(CredentialsStatus::not_configured()),
    }
}

/// POST /credentials
///
/// Persists the full bundle; 400 when any section is missing.
pub async fn save_credentials(
    State(state): State<AppState>,
    Json(request): Json<SaveCredentialsRequest>,
) -> ApiResult<Json<SaveCredentialsResponse>> {
    let (Some(remote_storage), Some(cms), Some(public_base_url)) =
        (request.remote_storage, request.cms, request.public_base_url)
    else {
        return Err(ApiError::BadRequest(
            "Missing required credentials".to_string(),
        ));
    };

    let bundle = CredentialsBundle {
        remote_storage,
        cms,
        public_base_url,
    };
    state.secrets.save(&bundle)?;

    info!("Credentials bundle saved");
    Ok(Json(SaveCredentialsResponse {
        success: true,
        message: "Credentials saved successfully".to_string(),
    }))
}

/// POST /credentials/test
///
/// Probes both services with the candidate bundle without persisting it.
pub async fn test_credentials(
    State(state): State<AppState>,
    Json(request): Json<TestCredentialsRequest>,
) -> ApiResult<Json<TestCredentialsResponse>> {
    let (Some(remote_storage), Some(cms)) = (request.remote_storage, request.cms) else {
        return Err(ApiError::BadRequest(
            "Missing required credentials".to_string(),
        ));
    };

    let storage_outcome = probe_outcome(
        StorageClient::new(state.http.clone())
            .probe(&remote_storage)
            .await,
    );
    let cms_outcome = probe_outcome(CmsClient::new(state.http.clone()).probe(&cms).await);

    let success = storage_outcome.success && cms_outcome.success;
    Ok(Json(TestCredentialsResponse {
        success,
        tests: TestReport {
            remote_storage: storage_outcome,
            cms: cms_outcome,
        },
    }))
}

fn probe_outcome(result: Result<(), crate::error::PipelineError>) -> TestOutcome {
    match result {
        Ok(()) => TestOutcome {
            success: true,
            message: "Connected successfully".to_string(),
        },
        Err(e) => TestOutcome {
            success: false,
            message: e
                .detail()
                .map(String::from)
                .unwrap_or_else(|| e.to_string()),
        },
    }
}

/// Build credentials routes
pub fn credentials_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/credentials",
            get(credentials_status).post(save_credentials),
        )
        .route("/credentials/test", post(test_credentials))
}
