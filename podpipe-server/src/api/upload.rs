//! Job submission endpoint
//!
//! POST /upload accepts a multipart form (`file`, `date`, `title`), stages
//! the file into the uploads work directory, spawns the pipeline for the
//! job, and answers with the job's progress stream over Server-Sent
//! Events. The stream carries one JSON object per event and ends with a
//! `[DONE]` marker after the terminal event.

use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Router,
};
use chrono::Utc;
use futures::stream::Stream;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use podpipe_common::events::ProgressSender;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{JobRequest, Pipeline};
use crate::services::{AudioNormalizer, CmsClient, StorageClient};
use crate::AppState;

/// Audio containers accepted by extension
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a", "aac"];

/// POST /upload
///
/// The response stream stays open until the job's terminal event; a client
/// that disconnects early does not cancel the job.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = Uuid::new_v4();

    let mut source_path: Option<PathBuf> = None;
    let mut date: Option<String> = None;
    let mut title: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Malformed multipart request: {}", e))
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                if !is_audio_upload(original_name.as_deref(), content_type.as_deref()) {
                    return Err(ApiError::BadRequest(format!(
                        "Only audio uploads are accepted ({})",
                        AUDIO_EXTENSIONS.join(", ")
                    )));
                }

                let destination = staged_path(
                    &state.config.uploads_dir,
                    original_name.as_deref().unwrap_or("upload"),
                );
                let mut file = tokio::fs::File::create(&destination).await?;
                while let Some(chunk) = field.chunk().await.map_err(|e| {
                    ApiError::BadRequest(format!("Upload interrupted: {}", e))
                })? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                source_path = Some(destination);
            }
            Some("date") => {
                date = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable date field: {}", e))
                })?);
            }
            Some("title") => {
                title = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable title field: {}", e))
                })?);
            }
            _ => {}
        }
    }

    info!(
        job_id = %job_id,
        file = ?source_path,
        "Job submitted"
    );

    // Credentials are loaded once per job and read-only from here on
    let credentials = state.secrets.load();

    let pipeline = Pipeline::new(
        AudioNormalizer::new(state.config.ffmpeg_path.clone()),
        StorageClient::new(state.http.clone()),
        CmsClient::new(state.http.clone()),
        state.config.output_dir.clone(),
    );
    let job = JobRequest {
        source_path,
        date,
        title,
    };

    let (progress, mut rx) = ProgressSender::channel();
    tokio::spawn(async move {
        pipeline.run(job, credentials, progress).await;
        info!(job_id = %job_id, "Job finished");
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
            }
            if terminal {
                yield Ok(Event::default().data("[DONE]"));
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}

/// Accept by extension or by a declared audio content type
fn is_audio_upload(filename: Option<&str>, content_type: Option<&str>) -> bool {
    if let Some(ct) = content_type {
        if ct.starts_with("audio/") {
            return true;
        }
    }
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Staging path namespaced by submission time so concurrent jobs never
/// share a source file. Only the final path component of the client-sent
/// name is kept.
fn staged_path(uploads_dir: &Path, original_name: &str) -> PathBuf {
    let base = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    uploads_dir.join(format!("{}-{}", Utc::now().timestamp_millis(), base))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload", post(submit_job))
}
