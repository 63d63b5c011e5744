//! Pipeline stages and their states.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::process::{CapturedRun, RunStatus};

/// A step of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Resolve,
    Compile,
    Package,
    Sign,
    Deploy,
}

impl PipelineStage {
    /// Every stage in execution order.
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Resolve,
        PipelineStage::Compile,
        PipelineStage::Package,
        PipelineStage::Sign,
        PipelineStage::Deploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Resolve => "resolve",
            PipelineStage::Compile => "compile",
            PipelineStage::Package => "package",
            PipelineStage::Sign => "sign",
            PipelineStage::Deploy => "deploy",
        }
    }

    /// Stages that must have succeeded before this one may run.
    pub fn predecessors(&self) -> &'static [PipelineStage] {
        match self {
            PipelineStage::Resolve => &[],
            PipelineStage::Compile => &[PipelineStage::Resolve],
            PipelineStage::Package => &[PipelineStage::Compile],
            PipelineStage::Sign => &[PipelineStage::Package],
            PipelineStage::Deploy => &[PipelineStage::Sign],
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum FailureReason {
    /// The tool exited non-zero (`None`: killed by a signal)
    ExitCode { code: Option<i32> },
    Timeout { after_secs: u64 },
    Cancelled,
    /// The tool could not be started
    Spawn { message: String },
    /// The tool succeeded but did not produce its output
    MissingOutput { path: PathBuf },
    /// Drydock itself failed (I/O, bookkeeping)
    Internal { message: String },
}

impl FailureReason {
    /// Map a supervised run that did not succeed.
    pub fn from_run(run: &CapturedRun) -> Self {
        match run.status {
            RunStatus::Exited(code) => FailureReason::ExitCode { code },
            RunStatus::TimedOut(after) => FailureReason::Timeout {
                after_secs: after.as_secs(),
            },
            RunStatus::Cancelled => FailureReason::Cancelled,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ExitCode { code: Some(code) } => write!(f, "exit code {}", code),
            FailureReason::ExitCode { code: None } => write!(f, "terminated by signal"),
            FailureReason::Timeout { after_secs } => write!(f, "timed out after {}s", after_secs),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::Spawn { message } => write!(f, "could not start: {}", message),
            FailureReason::MissingOutput { path } => {
                write!(f, "expected output missing: {}", path.display())
            }
            FailureReason::Internal { message } => write!(f, "{}", message),
        }
    }
}

/// Why a stage did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum SkipReason {
    PredecessorFailed { stage: PipelineStage },
    Cancelled,
    NotRequested,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PredecessorFailed { stage } => write!(f, "{} failed", stage),
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::NotRequested => write!(f, "not requested"),
        }
    }
}

/// State of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    /// A still-valid result from an earlier run was reused
    Fresh,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl StageStatus {
    /// Succeeded or Fresh: dependents may run.
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Succeeded | StageStatus::Fresh)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Fresh => "fresh",
            StageStatus::Failed(_) => "failed",
            StageStatus::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Failed(reason) => write!(f, "failed ({})", reason),
            StageStatus::Skipped(reason) => write!(f, "skipped ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Decide whether `stage` may run given its predecessors' states.
///
/// Returns the skip reason when it may not.
pub fn gate(stage: PipelineStage, status_of: impl Fn(PipelineStage) -> StageStatus) -> Option<SkipReason> {
    for pred in stage.predecessors() {
        match status_of(*pred) {
            s if s.is_success() => {}
            StageStatus::Skipped(SkipReason::Cancelled) => return Some(SkipReason::Cancelled),
            StageStatus::Failed(FailureReason::Cancelled) => return Some(SkipReason::Cancelled),
            StageStatus::Skipped(SkipReason::PredecessorFailed { stage }) => {
                return Some(SkipReason::PredecessorFailed { stage })
            }
            _ => return Some(SkipReason::PredecessorFailed { stage: *pred }),
        }
    }
    None
}

/// One external process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    /// Command line, secrets redacted
    pub command: String,
    pub exit_code: Option<i32>,
    /// Tail of the output, secrets redacted
    pub captured_output: String,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl ExecutionRecord {
    pub fn from_run(command: String, run: &CapturedRun) -> Self {
        ExecutionRecord {
            command,
            exit_code: run.exit_code(),
            captured_output: run.output.clone(),
            duration: run.duration,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Final state of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub records: Vec<ExecutionRecord>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

/// A stage failed. Carries the tool's output verbatim.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
#[error("{stage} stage failed: {reason}")]
#[diagnostic(code(drydock::stage::failed), help("Run with --verbose to see every command line"))]
pub struct StageExecutionError {
    pub stage: PipelineStage,
    pub reason: FailureReason,
    pub command: Option<String>,
    pub output: String,
}

impl StageExecutionError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string());
        if let Some(cmd) = &self.command {
            diag = diag.with_context(format!("command: {}", cmd));
        }
        if !self.output.trim().is_empty() {
            diag = diag.with_context(format!("output:\n{}", self.output.trim_end()));
        }
        diag.with_suggestion(suggestions::STAGE_FAILED)
    }
}
