//! `drydock build` and `drydock deploy` commands

use anyhow::Result;

use crate::cli::{BuildArgs, MessageFormat};
use crate::progress::{HumanSink, JsonSink};
use drydock::ops::{build, BuildOptions};
use drydock::util::diagnostic::emit;
use drydock::util::{CancelToken, GlobalContext};

pub fn execute(args: BuildArgs, ctx: &GlobalContext, deploy: bool) -> Result<()> {
    let ws = super::workspace(ctx)?;
    let cancel = CancelToken::from_ctrlc()?;

    let opts = BuildOptions {
        resolve: super::resolve_options(&args.variant, deploy),
        stage_timeout: args.stage_timeout,
    };

    let result = match args.message_format {
        MessageFormat::Json => build(&ws, ctx, &opts, cancel, &mut JsonSink)?,
        MessageFormat::Human => {
            let mut sink = HumanSink::new(ctx.color(), ctx.is_verbose());
            build(&ws, ctx, &opts, cancel, &mut sink)?
        }
    };

    if args.message_format == MessageFormat::Human {
        if let Some(err) = result.report.error() {
            emit(&err.to_diagnostic(), ctx.color());
        } else if let Some(err) = &result.report.deploy_error {
            emit(&err.to_diagnostic(), ctx.color());
        }
    }

    result.check()
}
