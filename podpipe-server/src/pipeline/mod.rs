//! Publishing pipeline orchestrator
//!
//! One instance runs one submitted job through
//! Validating → Normalizing → Uploading → Publishing → Cleanup, pushing a
//! progress event at each transition and exactly one terminal event at the
//! end. A failure in any state skips the remaining stages; cleanup runs on
//! both paths so no temporary file outlives its job.
//!
//! The three stages sit behind seam traits so tests can substitute
//! counting fakes for the external collaborators.

pub mod naming;

use chrono::{Datelike, NaiveDate};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use podpipe_common::events::{DraftPost, JobSummary, PipelineEvent, ProgressSender};

use crate::error::PipelineError;
use crate::models::{CredentialsBundle, ServiceAccount};

/// Loudness-normalize an input recording into a compressed output file
pub trait Normalize {
    fn normalize(
        &self,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<(), PipelineError>> + Send;
}

/// Upload a file to remote storage, returning its public download URL
pub trait UploadStorage {
    fn upload(
        &self,
        file_path: &Path,
        filename: &str,
        container: &str,
        account: &ServiceAccount,
        progress: &ProgressSender,
    ) -> impl Future<Output = Result<String, PipelineError>> + Send;
}

/// Create a draft post embedding the media URL
pub trait PublishDraft {
    fn publish(
        &self,
        title: &str,
        media_url: &str,
        date: NaiveDate,
        account: &ServiceAccount,
        progress: &ProgressSender,
    ) -> impl Future<Output = Result<DraftPost, PipelineError>> + Send;
}

/// One submitted job. Fields are optional because multipart submissions
/// may omit them; validation turns absences into terminal events.
#[derive(Debug)]
pub struct JobRequest {
    /// Uploaded source file, exclusively owned by this job
    pub source_path: Option<PathBuf>,
    /// Recording date as submitted (`YYYY-MM-DD`)
    pub date: Option<String>,
    /// Free-text recording title
    pub title: Option<String>,
}

/// Pipeline over concrete stage implementations
pub struct Pipeline<N, U, P> {
    normalizer: N,
    storage: U,
    publisher: P,
    output_dir: PathBuf,
}

impl<N, U, P> Pipeline<N, U, P>
where
    N: Normalize,
    U: UploadStorage,
    P: PublishDraft,
{
    pub fn new(normalizer: N, storage: U, publisher: P, output_dir: PathBuf) -> Self {
        Self {
            normalizer,
            storage,
            publisher,
            output_dir,
        }
    }

    /// Run the job to completion.
    ///
    /// Consumes the progress sender: the channel closes right after the
    /// terminal event, so the transport can rely on end-of-stream.
    pub async fn run(
        &self,
        job: JobRequest,
        credentials: Option<CredentialsBundle>,
        progress: ProgressSender,
    ) {
        let mut artifact: Option<PathBuf> = None;
        let result = self
            .execute(&job, credentials, &progress, &mut artifact)
            .await;

        // Cleanup runs on both paths, before the terminal event, and its
        // own failures never mask the pipeline outcome.
        cleanup(job.source_path.as_deref(), artifact.as_deref()).await;

        match result {
            Ok(summary) => {
                info!(filename = %summary.output_filename, "Job completed");
                progress.send_lossy(PipelineEvent::Completed { summary });
            }
            Err(e) => {
                error!(error = %e, "Job failed");
                progress.send_lossy(PipelineEvent::Failed {
                    error: e.to_string(),
                    details: e.detail().map(String::from),
                });
            }
        }
    }

    async fn execute(
        &self,
        job: &JobRequest,
        credentials: Option<CredentialsBundle>,
        progress: &ProgressSender,
        artifact: &mut Option<PathBuf>,
    ) -> Result<JobSummary, PipelineError> {
        // Validating: everything here fails before any external call
        let credentials = credentials.ok_or(PipelineError::Config)?;

        let source = job
            .source_path
            .as_deref()
            .filter(|p| p.exists())
            .ok_or_else(|| PipelineError::Validation("No file uploaded".to_string()))?;

        let (raw_date, title) = match (job.date.as_deref(), job.title.as_deref()) {
            (Some(d), Some(t)) if !d.trim().is_empty() && !t.trim().is_empty() => (d.trim(), t),
            _ => {
                return Err(PipelineError::Validation(
                    "Date and title are required".to_string(),
                ))
            }
        };
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            PipelineError::Validation(format!("Unrecognized date: {}", raw_date))
        })?;

        // Normalizing
        let filename = naming::derived_filename(date, title);
        let output_path = self.output_dir.join(&filename);
        progress.status("Processing audio: applying compression...");
        // Track the artifact before the transform runs: a failed transform
        // may still leave a partial output behind for cleanup.
        *artifact = Some(output_path.clone());
        self.normalizer.normalize(source, &output_path).await?;
        progress.status("Audio processing complete: normalized to -14 LUFS");

        // Uploading
        let container = date.year().to_string();
        let storage_url = self
            .storage
            .upload(
                &output_path,
                &filename,
                &container,
                &credentials.remote_storage,
                progress,
            )
            .await?;
        progress.status("File uploaded to storage");

        let podcast_url = format!(
            "{}/{}/{}",
            credentials.public_base_url.trim_end_matches('/'),
            container,
            filename
        );
        progress.status(format!("Podcast URL generated: {}", podcast_url));

        // Publishing
        let post = self
            .publisher
            .publish(title, &podcast_url, date, &credentials.cms, progress)
            .await?;
        progress.status("Draft post created");

        Ok(JobSummary {
            message: "File processed, uploaded, and draft post created".to_string(),
            output_filename: filename,
            storage_url,
            podcast_url,
            post,
        })
    }
}

/// Best-effort removal of the job's temporary files
async fn cleanup(source: Option<&Path>, artifact: Option<&Path>) {
    for path in [source, artifact].into_iter().flatten() {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "Removed temporary file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not remove temporary file"),
        }
    }
}
