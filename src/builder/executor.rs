//! Pipeline executor.
//!
//! Runs `Resolve -> Compile -> Package -> Sign -> (Deploy)` strictly in
//! order. A stage only runs when its predecessor succeeded or was reused;
//! otherwise it is skipped with the reason.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::builder::cmake::CMakeBuilder;
use crate::builder::events::{EventSink, PipelineEvent};
use crate::builder::fingerprint::{self, BuildFingerprint, Freshness};
use crate::builder::plan::BuildPlan;
use crate::builder::stage::{
    gate, ExecutionRecord, FailureReason, PipelineStage, SkipReason, StageExecutionError,
    StageOutcome, StageStatus,
};
use crate::deploy::{DeployError, DeployResult, DeploymentDispatcher, DeploymentRequest};
use crate::util::cancel::CancelToken;
use crate::util::config::Config;
use crate::util::fs::{
    ensure_dir, leftover_temp_files, persist, remove_file_if_exists, temp_file_beside,
};
use crate::util::hash::sha256_file;
use crate::util::process::{ProcessBuilder, RunOptions};

/// Environment variables apksigner reads the passwords from.
const KS_PASS_ENV: &str = "DRYDOCK_KS_PASS";
const KEY_PASS_ENV: &str = "DRYDOCK_KEY_PASS";

/// A signed artifact produced by this invocation.
///
/// Only the executor creates these; a deployment needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    path: PathBuf,
    sha256: String,
    variant: String,
}

impl SignedArtifact {
    pub(crate) fn new(path: PathBuf, sha256: String, variant: impl Into<String>) -> Self {
        SignedArtifact {
            path,
            sha256,
            variant: variant.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }
}

/// Everything a pipeline run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub outcomes: Vec<StageOutcome>,
    pub artifact: Option<SignedArtifact>,
    pub deploy: Option<DeployResult>,
    pub deploy_error: Option<DeployError>,
    pub duration: Duration,
}

impl PipelineReport {
    pub fn status(&self, stage: PipelineStage) -> Option<&StageStatus> {
        self.outcomes
            .iter()
            .find(|o| o.stage == stage)
            .map(|o| &o.status)
    }

    pub fn outcome(&self, stage: PipelineStage) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    /// No stage failed or was skipped for any reason but not being requested.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| {
            o.status.is_success() || o.status == StageStatus::Skipped(SkipReason::NotRequested)
        })
    }

    pub fn was_cancelled(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(
                o.status,
                StageStatus::Failed(FailureReason::Cancelled)
                    | StageStatus::Skipped(SkipReason::Cancelled)
            )
        })
    }

    /// The first failed stage, with its last command and output.
    pub fn error(&self) -> Option<StageExecutionError> {
        self.outcomes.iter().find_map(|o| match &o.status {
            StageStatus::Failed(reason) => {
                let last = o.records.last();
                Some(StageExecutionError {
                    stage: o.stage,
                    reason: reason.clone(),
                    command: last.map(|r| r.command.clone()),
                    output: last.map(|r| r.captured_output.clone()).unwrap_or_default(),
                })
            }
            _ => None,
        })
    }
}

/// Result of running one stage.
struct StageRun {
    status: StageStatus,
    records: Vec<ExecutionRecord>,
}

impl StageRun {
    fn done(records: Vec<ExecutionRecord>) -> Self {
        StageRun {
            status: StageStatus::Succeeded,
            records,
        }
    }

    fn failed(reason: FailureReason, records: Vec<ExecutionRecord>) -> Self {
        StageRun {
            status: StageStatus::Failed(reason),
            records,
        }
    }
}

fn internal(err: anyhow::Error) -> FailureReason {
    FailureReason::Internal {
        message: format!("{:#}", err),
    }
}

/// Remove a partial output left by a failed tool.
///
/// A removal failure is logged and appended to the last record's output.
fn discard_partial(path: &Path, records: &mut [ExecutionRecord]) {
    let Err(e) = remove_file_if_exists(path) else {
        return;
    };
    tracing::warn!("partial output left behind: {:#}", e);
    if let Some(last) = records.last_mut() {
        let output = &mut last.captured_output;
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&format!("drydock: {:#}\n", e));
    }
}

/// Mutable bookkeeping of one run.
#[derive(Default)]
struct RunState {
    statuses: BTreeMap<PipelineStage, StageStatus>,
    outcomes: Vec<StageOutcome>,
    inputs: Option<String>,
    artifact: Option<SignedArtifact>,
    deploy: Option<DeployResult>,
    deploy_error: Option<DeployError>,
}

impl RunState {
    fn status(&self, stage: PipelineStage) -> StageStatus {
        self.statuses
            .get(&stage)
            .cloned()
            .unwrap_or(StageStatus::Pending)
    }
}

/// Runs a [`BuildPlan`].
pub struct PipelineExecutor<'a> {
    plan: &'a BuildPlan,
    config: &'a Config,
    cancel: CancelToken,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(plan: &'a BuildPlan, config: &'a Config, cancel: CancelToken) -> Self {
        PipelineExecutor {
            plan,
            config,
            cancel,
        }
    }

    /// Run every stage, reporting progress to `sink`.
    pub fn run(&self, sink: &mut dyn EventSink) -> PipelineReport {
        let start = Instant::now();
        let variant = &self.plan.variant;
        sink.emit(&PipelineEvent::PipelineStarted {
            variant: variant.name().to_string(),
            build_type: variant.build_type().to_string(),
            application_id: variant.application_id().to_string(),
            abis: variant.abi_filters().iter().map(|a| a.to_string()).collect(),
        });

        let mut state = RunState::default();
        let mut reuse = false;

        for stage in PipelineStage::ALL {
            let stage_start = Instant::now();
            let skip = gate(stage, |s| state.status(s));
            let run = if let Some(skip) = skip {
                StageRun {
                    status: StageStatus::Skipped(skip),
                    records: Vec::new(),
                }
            } else if stage == PipelineStage::Deploy && !self.plan.deploy_requested() {
                StageRun {
                    status: StageStatus::Skipped(SkipReason::NotRequested),
                    records: Vec::new(),
                }
            } else if self.cancel.is_cancelled() {
                StageRun {
                    status: StageStatus::Skipped(SkipReason::Cancelled),
                    records: Vec::new(),
                }
            } else if reuse && stage != PipelineStage::Deploy {
                StageRun {
                    status: StageStatus::Fresh,
                    records: Vec::new(),
                }
            } else {
                tracing::info!("{} `{}`", stage, variant.name());
                sink.emit(&PipelineEvent::StageStarted { stage });
                state.statuses.insert(stage, StageStatus::Running);
                match stage {
                    PipelineStage::Resolve => {
                        let (run, fresh) = self.resolve(&mut state);
                        reuse = fresh;
                        run
                    }
                    PipelineStage::Compile => self.compile(),
                    PipelineStage::Package => self.package(),
                    PipelineStage::Sign => self.sign(&mut state),
                    PipelineStage::Deploy => self.deploy(&mut state),
                }
            };

            let duration = stage_start.elapsed();
            tracing::debug!("{} finished: {}", stage, run.status);
            sink.emit(&PipelineEvent::stage_finished(stage, &run.status, duration));

            if stage == PipelineStage::Sign && run.status.is_success() {
                if let Some(artifact) = &state.artifact {
                    sink.emit(&PipelineEvent::Artifact {
                        path: artifact.path().to_path_buf(),
                        sha256: artifact.sha256().to_string(),
                        fresh: run.status == StageStatus::Fresh,
                    });
                }
            }
            if stage == PipelineStage::Deploy {
                if let Some(result) = &state.deploy {
                    sink.emit(&PipelineEvent::Deployed {
                        channel: result.channel.clone(),
                        path: result.artifact.clone(),
                    });
                }
            }

            state.statuses.insert(stage, run.status.clone());
            state.outcomes.push(StageOutcome {
                stage,
                status: run.status,
                records: run.records,
                duration,
            });
        }

        let report = PipelineReport {
            outcomes: state.outcomes,
            artifact: state.artifact,
            deploy: state.deploy,
            deploy_error: state.deploy_error,
            duration: start.elapsed(),
        };
        sink.emit(&PipelineEvent::finished(report.success(), report.duration));
        report
    }

    fn run_options(&self, stage: PipelineStage) -> RunOptions {
        RunOptions {
            timeout: self.config.stage_timeout(stage),
            capture_limit: self.config.capture_limit(),
        }
    }

    /// Run one tool invocation and record it.
    fn run_tool(
        &self,
        stage: PipelineStage,
        cmd: ProcessBuilder,
        records: &mut Vec<ExecutionRecord>,
    ) -> Result<(), FailureReason> {
        let command = cmd.display_command();
        match cmd.run(self.run_options(stage), &self.cancel) {
            Ok(run) => {
                records.push(ExecutionRecord::from_run(command, &run));
                if run.success() {
                    Ok(())
                } else {
                    Err(FailureReason::from_run(&run))
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                records.push(ExecutionRecord {
                    command,
                    exit_code: None,
                    captured_output: message.clone(),
                    duration: Duration::ZERO,
                });
                Err(FailureReason::Spawn { message })
            }
        }
    }

    /// Prepare the output directory and decide whether the previous
    /// artifact can be reused.
    fn resolve(&self, state: &mut RunState) -> (StageRun, bool) {
        let layout = &self.plan.layout;
        let prepared = (|| -> Result<String> {
            ensure_dir(layout.root())?;
            for leftover in leftover_temp_files(&layout.outputs()) {
                remove_file_if_exists(&leftover)?;
            }
            fingerprint::compute_inputs(self.plan)
        })();

        let inputs = match prepared {
            Ok(inputs) => inputs,
            Err(e) => return (StageRun::failed(internal(e), Vec::new()), false),
        };

        let fresh = match fingerprint::check(self.plan, &inputs) {
            Freshness::Fresh { artifact_sha256 } => {
                tracing::info!("`{}` is up to date", self.plan.variant.name());
                state.artifact = Some(SignedArtifact::new(
                    layout.artifact(),
                    artifact_sha256,
                    self.plan.variant.name(),
                ));
                true
            }
            Freshness::Stale => {
                if let Err(e) = remove_file_if_exists(&layout.fingerprint_file()) {
                    return (StageRun::failed(internal(e), Vec::new()), false);
                }
                false
            }
        };

        state.inputs = Some(inputs);
        (StageRun::done(Vec::new()), fresh)
    }

    fn compile(&self) -> StageRun {
        let mut records = Vec::new();
        for abi in self.plan.variant.abi_filters() {
            let cmake = CMakeBuilder::new(self.plan, *abi);
            if let Err(e) = ensure_dir(cmake.library_dir()) {
                return StageRun::failed(internal(e), records);
            }
            tracing::debug!("compiling {} in {}", abi, cmake.build_dir().display());

            for cmd in [cmake.configure_command(), cmake.build_command()] {
                if let Err(reason) = self.run_tool(PipelineStage::Compile, cmd, &mut records) {
                    return StageRun::failed(reason, records);
                }
            }
        }
        StageRun::done(records)
    }

    fn package(&self) -> StageRun {
        let unsigned = self.plan.layout.unsigned_package();
        let mut records = Vec::new();

        let prepared = remove_file_if_exists(&unsigned).and_then(|_| ensure_dir(&self.plan.layout.intermediates()));
        if let Err(e) = prepared {
            return StageRun::failed(internal(e), records);
        }

        let cmd = ProcessBuilder::new(&self.plan.packager.program)
            .args(&self.plan.packager.args)
            .cwd(&self.plan.project_root);

        if let Err(reason) = self.run_tool(PipelineStage::Package, cmd, &mut records) {
            discard_partial(&unsigned, &mut records);
            return StageRun::failed(reason, records);
        }

        if !unsigned.is_file() {
            return StageRun::failed(FailureReason::MissingOutput { path: unsigned }, records);
        }
        StageRun::done(records)
    }

    fn sign(&self, state: &mut RunState) -> StageRun {
        let layout = &self.plan.layout;
        let identity = self.plan.variant.signing();
        let artifact = layout.artifact();
        let mut records = Vec::new();

        let temp = match temp_file_beside(&artifact) {
            Ok(temp) => temp,
            Err(e) => return StageRun::failed(internal(e), records),
        };

        let cmd = ProcessBuilder::new(&self.plan.tools.apksigner)
            .arg("sign")
            .arg("--ks")
            .arg(identity.keystore())
            .arg("--ks-key-alias")
            .arg(identity.alias())
            .arg("--ks-pass")
            .arg(format!("env:{}", KS_PASS_ENV))
            .arg("--key-pass")
            .arg(format!("env:{}", KEY_PASS_ENV))
            .arg("--out")
            .arg(temp.path())
            .arg(layout.unsigned_package())
            .secret_env(KS_PASS_ENV, identity.store_password())
            .secret_env(KEY_PASS_ENV, identity.key_password())
            .cwd(&self.plan.project_root);

        // The temp file is deleted on drop if signing fails
        if let Err(reason) = self.run_tool(PipelineStage::Sign, cmd, &mut records) {
            return StageRun::failed(reason, records);
        }

        let written = std::fs::metadata(temp.path())
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            return StageRun::failed(FailureReason::MissingOutput { path: artifact }, records);
        }

        let finished = persist(temp, &artifact).and_then(|_| {
            let sha256 = sha256_file(&artifact)?;
            let fp = BuildFingerprint {
                inputs: state.inputs.clone().unwrap_or_default(),
                artifact_sha256: sha256.clone(),
            };
            fp.save(&layout.fingerprint_file())?;
            Ok(sha256)
        });

        match finished {
            Ok(sha256) => {
                tracing::info!("signed {}", artifact.display());
                state.artifact = Some(SignedArtifact::new(
                    artifact,
                    sha256,
                    self.plan.variant.name(),
                ));
                StageRun::done(records)
            }
            Err(e) => StageRun::failed(internal(e), records),
        }
    }

    fn deploy(&self, state: &mut RunState) -> StageRun {
        let (Some(config), Some(artifact)) = (&self.plan.deploy, &state.artifact) else {
            return StageRun::failed(
                FailureReason::Internal {
                    message: "no signed artifact to deploy".into(),
                },
                Vec::new(),
            );
        };

        let request = DeploymentRequest::new(artifact, config);
        let dispatcher =
            DeploymentDispatcher::new(self.run_options(PipelineStage::Deploy), self.cancel.clone());

        match dispatcher.deploy(&request) {
            Ok(result) => {
                let records = vec![result.record.clone()];
                state.deploy = Some(result);
                StageRun::done(records)
            }
            Err(err) => {
                let records = match &err {
                    DeployError::Failed { record, .. } => vec![record.clone()],
                    _ => Vec::new(),
                };
                let reason = err.failure_reason();
                state.deploy_error = Some(err);
                StageRun::failed(reason, records)
            }
        }
    }
}
