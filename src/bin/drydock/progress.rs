//! Terminal rendering of pipeline events.
//!
//! Human output goes to stderr: one spinner while a stage runs, then a
//! right-aligned status line like cargo's. JSON output writes one event
//! per line to stdout.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use drydock::builder::events::{EventSink, PipelineEvent};
use drydock::builder::stage::PipelineStage;

/// Status words and their colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Building,
    Compiled,
    Created,
    Deployed,
    Finished,
    Fresh,
    Packaged,
    Removed,
    Resolved,
    Signed,
    Skipped,
    Warning,
    Error,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Building => "Building",
            Status::Compiled => "Compiled",
            Status::Created => "Created",
            Status::Deployed => "Deployed",
            Status::Finished => "Finished",
            Status::Fresh => "Fresh",
            Status::Packaged => "Packaged",
            Status::Removed => "Removed",
            Status::Resolved => "Resolved",
            Status::Signed => "Signed",
            Status::Skipped => "Skipped",
            Status::Warning => "warning",
            Status::Error => "error",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Building | Status::Resolved => "\x1b[1;36m",
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
            _ => "\x1b[1;32m",
        }
    }

    fn for_stage(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Resolve => Status::Resolved,
            PipelineStage::Compile => Status::Compiled,
            PipelineStage::Package => Status::Packaged,
            PipelineStage::Sign => Status::Signed,
            PipelineStage::Deploy => Status::Deployed,
        }
    }
}

/// Print a status line to stderr.
pub fn status(color: bool, status: Status, message: impl std::fmt::Display) {
    if color {
        eprintln!("{}{:>12}\x1b[0m {}", status.color_code(), status.as_str(), message);
    } else {
        eprintln!("{:>12} {}", status.as_str(), message);
    }
}

fn stage_verb(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Resolve => "Checking previous build",
        PipelineStage::Compile => "Compiling native code",
        PipelineStage::Package => "Packaging",
        PipelineStage::Sign => "Signing",
        PipelineStage::Deploy => "Uploading",
    }
}

/// Spinners and status lines.
pub struct HumanSink {
    color: bool,
    verbose: bool,
    spinner: Option<ProgressBar>,
}

impl HumanSink {
    pub fn new(color: bool, verbose: bool) -> Self {
        HumanSink {
            color,
            verbose,
            spinner: None,
        }
    }

    fn start_spinner(&mut self, message: &'static str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl EventSink for HumanSink {
    fn emit(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::PipelineStarted {
                variant,
                build_type,
                application_id,
                abis,
            } => status(
                self.color,
                Status::Building,
                format!("{} ({}, {}) [{}]", variant, build_type, application_id, abis.join(", ")),
            ),
            PipelineEvent::StageStarted { stage } => self.start_spinner(stage_verb(*stage)),
            PipelineEvent::StageFinished {
                stage,
                status: label,
                detail,
                duration_ms,
            } => {
                self.clear_spinner();
                let elapsed = format!("{:.2}s", *duration_ms as f64 / 1000.0);
                match label.as_str() {
                    "fresh" => status(self.color, Status::Fresh, stage),
                    "failed" => status(
                        self.color,
                        Status::Error,
                        format!("{} failed: {}", stage, detail.as_deref().unwrap_or("unknown")),
                    ),
                    "skipped" => {
                        if self.verbose {
                            status(
                                self.color,
                                Status::Skipped,
                                format!("{} ({})", stage, detail.as_deref().unwrap_or("")),
                            );
                        }
                    }
                    // reported by the deployed event
                    _ if *stage == PipelineStage::Deploy => {}
                    _ => status(self.color, Status::for_stage(*stage), format!("in {}", elapsed)),
                }
            }
            PipelineEvent::Artifact { path, fresh, .. } => {
                let note = if *fresh { " (up to date)" } else { "" };
                status(self.color, Status::Finished, format!("{}{}", path.display(), note));
            }
            PipelineEvent::Deployed { channel, path } => status(
                self.color,
                Status::Deployed,
                format!("{} to channel `{}`", path.display(), channel),
            ),
            PipelineEvent::Diagnostic { level, message } => {
                let s = if level == "error" { Status::Error } else { Status::Warning };
                self.clear_spinner();
                status(self.color, s, message);
            }
            PipelineEvent::PipelineFinished { .. } => self.clear_spinner(),
        }
    }
}

impl Drop for HumanSink {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

/// One JSON object per line on stdout.
pub struct JsonSink;

impl EventSink for JsonSink {
    fn emit(&mut self, event: &PipelineEvent) {
        println!("{}", event.to_json());
    }
}
