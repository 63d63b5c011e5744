//! `drydock clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use crate::progress::{status, Status};
use drydock::ops::clean;
use drydock::util::GlobalContext;

pub fn execute(args: CleanArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = super::workspace(ctx)?;

    match clean(&ws, args.variant.as_deref())? {
        Some(removed) => status(ctx.color(), Status::Removed, removed.display()),
        None => eprintln!("nothing to clean"),
    }

    Ok(())
}
