//! Implementation of `drydock build` and `drydock deploy`.

use anyhow::Result;

use crate::builder::events::{EventSink, PipelineEvent};
use crate::builder::executor::{PipelineExecutor, PipelineReport};
use crate::builder::plan::BuildPlan;
use crate::core::workspace::Workspace;
use crate::ops::resolve::{resolve_build, ResolveOptions};
use crate::util::cancel::CancelToken;
use crate::util::context::GlobalContext;
use crate::util::diagnostic::Diagnostic;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub resolve: ResolveOptions,

    /// Override every stage timeout (seconds)
    pub stage_timeout: Option<u64>,
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct BuildResult {
    pub plan: BuildPlan,
    pub report: PipelineReport,
    pub warnings: Vec<Diagnostic>,
}

impl BuildResult {
    /// Turn a failed run into an error carrying the tool output.
    pub fn check(&self) -> Result<()> {
        if let Some(err) = &self.report.deploy_error {
            return Err(err.clone().into());
        }
        match self.report.error() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// Resolve the variant and run the pipeline.
///
/// Resolution problems are returned as an error before anything runs.
/// Stage failures are reported in the [`BuildResult`]; see
/// [`BuildResult::check`].
pub fn build(
    ws: &Workspace,
    ctx: &GlobalContext,
    opts: &BuildOptions,
    cancel: CancelToken,
    sink: &mut dyn EventSink,
) -> Result<BuildResult> {
    let resolved = resolve_build(ws, ctx, &opts.resolve)?;
    for warning in &resolved.warnings {
        sink.emit(&PipelineEvent::warning(warning.message.clone()));
    }

    let mut config = ctx.config_for(ws.root());
    if let Some(secs) = opts.stage_timeout {
        config = config.with_uniform_timeout(secs);
    }

    let report = PipelineExecutor::new(&resolved.plan, &config, cancel).run(sink);

    Ok(BuildResult {
        plan: resolved.plan,
        report,
        warnings: resolved.warnings,
    })
}
