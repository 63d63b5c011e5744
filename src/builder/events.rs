//! Pipeline event types for JSON output.
//!
//! These events are emitted when using `--message-format json`, one JSON
//! object per line. The human renderer consumes the same stream.
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::builder::stage::{PipelineStage, StageStatus};

/// An event emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum PipelineEvent {
    #[serde(rename = "pipeline-started")]
    PipelineStarted {
        variant: String,
        build_type: String,
        application_id: String,
        abis: Vec<String>,
    },

    #[serde(rename = "stage-started")]
    StageStarted { stage: PipelineStage },

    #[serde(rename = "stage-finished")]
    StageFinished {
        stage: PipelineStage,
        /// `succeeded`, `fresh`, `failed` or `skipped`
        status: String,
        /// Failure or skip reason
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        duration_ms: u64,
    },

    /// The signed artifact is in place.
    #[serde(rename = "artifact")]
    Artifact {
        path: PathBuf,
        sha256: String,
        fresh: bool,
    },

    #[serde(rename = "deployed")]
    Deployed { channel: String, path: PathBuf },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note", "help")
        level: String,
        message: String,
    },

    #[serde(rename = "pipeline-finished")]
    PipelineFinished { success: bool, duration_ms: u64 },
}

impl PipelineEvent {
    pub fn stage_finished(stage: PipelineStage, status: &StageStatus, duration: Duration) -> Self {
        let detail = match status {
            StageStatus::Failed(reason) => Some(reason.to_string()),
            StageStatus::Skipped(reason) => Some(reason.to_string()),
            _ => None,
        };
        PipelineEvent::StageFinished {
            stage,
            status: status.label().to_string(),
            detail,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        PipelineEvent::Diagnostic {
            level: "warning".into(),
            message: message.into(),
        }
    }

    pub fn finished(success: bool, duration: Duration) -> Self {
        PipelineEvent::PipelineFinished {
            success,
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receives pipeline events as they happen.
pub trait EventSink {
    fn emit(&mut self, event: &PipelineEvent);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &PipelineEvent) {}
}

impl EventSink for Vec<PipelineEvent> {
    fn emit(&mut self, event: &PipelineEvent) {
        self.push(event.clone());
    }
}
