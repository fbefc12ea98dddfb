//! Remote file-hosting client
//!
//! Talks to a FileBrowser-compatible API: password login returning a
//! session token, container creation, token-authenticated upload, and a
//! deterministic public download URL.

use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use podpipe_common::events::ProgressSender;

use crate::error::PipelineError;
use crate::models::ServiceAccount;
use crate::pipeline::UploadStorage;

pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Login only; used to test candidate credentials without persisting
    pub async fn probe(&self, account: &ServiceAccount) -> Result<(), PipelineError> {
        self.login(account).await.map(|_| ())
    }

    /// Authenticate and return the session token
    async fn login(&self, account: &ServiceAccount) -> Result<String, PipelineError> {
        let url = format!("{}/api/login", base_url(account));
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "username": account.username,
                "password": account.password,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::Upload {
                message: "login request failed".to_string(),
                detail: Some(e.to_string()),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PipelineError::Upload {
                message: format!("login rejected ({})", status),
                detail: Some(body),
            });
        }

        // The service returns the raw token as the response body
        Ok(body.trim().to_string())
    }

    /// Create the destination container. Any failure is swallowed: the
    /// container usually already exists, and the service does not
    /// distinguish that from other creation failures.
    async fn ensure_container(&self, account: &ServiceAccount, token: &str, container: &str) {
        let url = format!("{}/api/resources/{}", base_url(account), container);
        match self.http.post(&url).header("X-Auth", token).send().await {
            Ok(response) => {
                debug!(container, status = %response.status(), "Container create attempted");
            }
            Err(e) => {
                debug!(container, error = %e, "Container create attempt failed");
            }
        }
    }

    async fn stream_file(
        &self,
        file_path: &Path,
        filename: &str,
        container: &str,
        account: &ServiceAccount,
        token: &str,
    ) -> Result<(), PipelineError> {
        let file = tokio::fs::File::open(file_path).await?;
        let length = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(filename.to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| PipelineError::Upload {
                message: "building upload body failed".to_string(),
                detail: Some(e.to_string()),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!(
            "{}/api/resources/{}/{}",
            base_url(account),
            container,
            filename
        );
        let response = self
            .http
            .post(&url)
            .header("X-Auth", token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Upload {
                message: "transfer failed".to_string(),
                detail: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upload {
                message: format!("transfer rejected ({})", status),
                detail: Some(body),
            });
        }

        info!(filename, container, bytes = length, "File uploaded to storage");
        Ok(())
    }
}

impl UploadStorage for StorageClient {
    async fn upload(
        &self,
        file_path: &Path,
        filename: &str,
        container: &str,
        account: &ServiceAccount,
        progress: &ProgressSender,
    ) -> Result<String, PipelineError> {
        progress.status("Logging in to file storage...");
        let token = self.login(account).await?;

        self.ensure_container(account, &token, container).await;

        progress.status("Uploading to file storage...");
        self.stream_file(file_path, filename, container, account, &token)
            .await?;

        Ok(public_download_url(account, container, filename))
    }
}

/// Account URL without a trailing slash
fn base_url(account: &ServiceAccount) -> &str {
    account.url.trim_end_matches('/')
}

/// Deterministic public download URL for an uploaded file
fn public_download_url(account: &ServiceAccount, container: &str, filename: &str) -> String {
    format!(
        "{}/api/public/dl/{}/{}",
        base_url(account),
        container,
        filename
    )
}
