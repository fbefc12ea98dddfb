//! Pipeline event types and the per-job progress channel
//!
//! Every submitted job gets its own one-way progress channel. The pipeline
//! pushes `PipelineEvent`s into it as phases advance; the transport layer
//! (SSE) is the only consumer and owns the wire encoding. Sends are lossy:
//! a client that disconnected mid-job must never fail or cancel the job.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Progress events emitted by the publishing pipeline.
///
/// Serialized with an internal `type` tag so clients can match on the
/// variant without probing for ad-hoc marker fields. Exactly one terminal
/// event (`Completed` or `Failed`) is emitted per job, and nothing after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PipelineEvent {
    /// Phase-transition progress notice
    Status { message: String },

    /// Terminal success, carrying everything the caller needs to follow up
    Completed {
        #[serde(flatten)]
        summary: JobSummary,
    },

    /// Terminal failure with a human-readable message and, where the
    /// failure originated upstream, the upstream-provided detail
    Failed {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl PipelineEvent {
    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Status { .. } => "status",
            PipelineEvent::Completed { .. } => "completed",
            PipelineEvent::Failed { .. } => "failed",
        }
    }

    /// Whether this event ends the job's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::Completed { .. } | PipelineEvent::Failed { .. }
        )
    }
}

/// Result summary carried by the terminal `Completed` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub message: String,
    /// Derived artifact filename (`{date}_{sanitized_title}.mp3`)
    pub output_filename: String,
    /// Direct download URL on the file-hosting service
    pub storage_url: String,
    /// Public podcast URL built from the configured base URL
    pub podcast_url: String,
    /// Created draft post
    pub post: DraftPost,
}

/// Draft post created on the content-management system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPost {
    pub post_id: u64,
    pub edit_link: String,
    pub preview_link: String,
}

/// Sending half of a job's progress channel.
///
/// Wraps an unbounded mpsc sender; `send_lossy` suppresses the
/// closed-channel error so a disconnected consumer is a no-op, not a fault.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ProgressSender {
    /// Create a progress channel for one job
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event, ignoring a disconnected receiver
    pub fn send_lossy(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Progress receiver dropped, event discarded");
        }
    }

    /// Emit a `Status` progress notice
    pub fn status(&self, message: impl Into<String>) {
        self.send_lossy(PipelineEvent::Status {
            message: message.into(),
        });
    }
}
