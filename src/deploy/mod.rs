//! Store upload of signed artifacts.
//!
//! The only way to reach the uploader is through a [`DeploymentRequest`],
//! and the only way to build one is from a [`SignedArtifact`], which only
//! the pipeline executor can produce after a successful Sign stage.

use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::executor::SignedArtifact;
use crate::builder::stage::{ExecutionRecord, FailureReason};
use crate::util::cancel::CancelToken;
use crate::util::diagnostic::Diagnostic;
use crate::util::hash::sha256_file;
use crate::util::process::{ProcessBuilder, RunOptions};
use crate::util::secret::Secret;

/// Where and how to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    /// Located uploader program
    pub uploader: PathBuf,
    pub subcommand: String,
    pub channel: String,
    pub app_id: String,
    pub app_secret: Secret,
}

/// A single upload of one signed artifact. Never persisted.
#[derive(Debug)]
pub struct DeploymentRequest {
    artifact: PathBuf,
    sha256: String,
    config: DeployConfig,
}

impl DeploymentRequest {
    pub fn new(artifact: &SignedArtifact, config: &DeployConfig) -> Self {
        DeploymentRequest {
            artifact: artifact.path().to_path_buf(),
            sha256: artifact.sha256().to_string(),
            config: config.clone(),
        }
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    pub fn app_id(&self) -> &str {
        &self.config.app_id
    }

    fn command(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.config.uploader)
            .arg(&self.config.subcommand)
            .arg("--app-id")
            .arg(&self.config.app_id)
            .arg("--app-secret")
            .secret_arg(&self.config.app_secret)
            .arg("--apk")
            .arg(&self.artifact)
            .arg("--channel")
            .arg(&self.config.channel)
    }
}

/// A completed upload.
#[derive(Debug, Clone)]
pub struct DeployResult {
    pub channel: String,
    pub artifact: PathBuf,
    pub record: ExecutionRecord,
}

/// The upload did not complete.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum DeployError {
    #[error("artifact changed since it was signed: {}", .path.display())]
    #[diagnostic(code(drydock::deploy::artifact_changed), help("Rebuild before deploying"))]
    ArtifactChanged { path: PathBuf },

    #[error("could not start uploader: {message}")]
    #[diagnostic(code(drydock::deploy::spawn), help("Pass -P tool.uploader=<path>"))]
    Spawn { message: String },

    #[error("upload failed: {reason}")]
    #[diagnostic(code(drydock::deploy::failed))]
    Failed {
        reason: FailureReason,
        record: ExecutionRecord,
    },
}

impl DeployError {
    /// The stage failure this error maps to.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            DeployError::ArtifactChanged { path } => FailureReason::MissingOutput { path: path.clone() },
            DeployError::Spawn { message } => FailureReason::Spawn {
                message: message.clone(),
            },
            DeployError::Failed { reason, .. } => reason.clone(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            DeployError::Failed { record, .. } => {
                let diag = diag.with_context(format!("command: {}", record.command));
                if record.captured_output.trim().is_empty() {
                    diag
                } else {
                    diag.with_context(format!("output:\n{}", record.captured_output.trim_end()))
                }
            }
            DeployError::ArtifactChanged { .. } => diag.with_suggestion("help: Rebuild before deploying"),
            DeployError::Spawn { .. } => diag.with_suggestion("help: Pass -P tool.uploader=<path>"),
        }
    }
}

/// Runs the uploader.
#[derive(Debug, Clone)]
pub struct DeploymentDispatcher {
    options: RunOptions,
    cancel: CancelToken,
}

impl DeploymentDispatcher {
    pub fn new(options: RunOptions, cancel: CancelToken) -> Self {
        DeploymentDispatcher { options, cancel }
    }

    pub fn deploy(&self, request: &DeploymentRequest) -> Result<DeployResult, DeployError> {
        let current = sha256_file(&request.artifact).ok();
        if current.as_deref() != Some(request.sha256.as_str()) {
            return Err(DeployError::ArtifactChanged {
                path: request.artifact.clone(),
            });
        }

        let cmd = request.command();
        let command = cmd.display_command();
        tracing::info!(
            "uploading {} to channel `{}`",
            request.artifact.display(),
            request.channel()
        );

        let run = cmd.run(self.options, &self.cancel).map_err(|e| DeployError::Spawn {
            message: format!("{:#}", e),
        })?;
        let record = ExecutionRecord::from_run(command, &run);

        if run.success() {
            Ok(DeployResult {
                channel: request.channel().to_string(),
                artifact: request.artifact.clone(),
                record,
            })
        } else {
            Err(DeployError::Failed {
                reason: FailureReason::from_run(&run),
                record,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn signed(dir: &Path) -> SignedArtifact {
        let path = dir.join("game-release.apk");
        std::fs::write(&path, b"signed").unwrap();
        let sha = sha256_file(&path).unwrap();
        SignedArtifact::new(path, sha, "release")
    }

    fn config(uploader: PathBuf) -> DeployConfig {
        DeployConfig {
            uploader,
            subcommand: "upload-quest-build".into(),
            channel: "alpha".into(),
            app_id: "1234".into(),
            app_secret: Secret::new("topsecret"),
        }
    }

    #[test]
    fn test_deploy_success_redacts_secret() {
        let tmp = TempDir::new().unwrap();
        let uploader = script(tmp.path(), "uploader", "echo \"$@\"");
        let artifact = signed(tmp.path());
        let request = DeploymentRequest::new(&artifact, &config(uploader));

        let result = DeploymentDispatcher::new(RunOptions::default(), CancelToken::new())
            .deploy(&request)
            .unwrap();
        assert_eq!(result.channel, "alpha");
        assert!(result.record.command.contains("upload-quest-build --app-id 1234 --app-secret ****"));
        assert!(!result.record.command.contains("topsecret"));
        assert!(result.record.captured_output.contains("--channel alpha"));
        assert!(!result.record.captured_output.contains("topsecret"));
    }

    #[test]
    fn test_deploy_failure_keeps_output() {
        let tmp = TempDir::new().unwrap();
        let uploader = script(tmp.path(), "uploader", "echo 'invalid app secret' >&2; exit 3");
        let artifact = signed(tmp.path());
        let request = DeploymentRequest::new(&artifact, &config(uploader));

        let err = DeploymentDispatcher::new(RunOptions::default(), CancelToken::new())
            .deploy(&request)
            .unwrap_err();
        assert_eq!(err.failure_reason(), FailureReason::ExitCode { code: Some(3) });
        assert!(err.to_diagnostic().format(false).contains("invalid app secret"));
    }

    #[test]
    fn test_deploy_rejects_modified_artifact() {
        let tmp = TempDir::new().unwrap();
        let uploader = script(tmp.path(), "uploader", "exit 0");
        let artifact = signed(tmp.path());
        std::fs::write(artifact.path(), b"tampered").unwrap();
        let request = DeploymentRequest::new(&artifact, &config(uploader));

        let err = DeploymentDispatcher::new(RunOptions::default(), CancelToken::new())
            .deploy(&request)
            .unwrap_err();
        assert!(matches!(err, DeployError::ArtifactChanged { .. }));
    }
}
