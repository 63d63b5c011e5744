//! `drydock init` command

use anyhow::Result;

use crate::cli::InitArgs;
use crate::progress::{status, Status};
use drydock::ops::{init_project, InitOptions};
use drydock::util::GlobalContext;

pub fn execute(args: InitArgs, ctx: &GlobalContext) -> Result<()> {
    let path = match args.path {
        Some(p) if p.is_absolute() => p,
        Some(p) => ctx.cwd().join(p),
        None => ctx.cwd().to_path_buf(),
    };

    let opts = InitOptions {
        name: args.name,
        application_id: args.application_id,
    };
    let manifest = init_project(&path, &opts)?;

    status(ctx.color(), Status::Created, manifest.display());
    Ok(())
}
