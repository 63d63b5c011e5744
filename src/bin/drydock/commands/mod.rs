//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod init;
pub mod resolve;
pub mod toolchain;

use anyhow::Result;

use crate::cli::VariantArgs;
use drydock::core::Workspace;
use drydock::ops::ResolveOptions;
use drydock::util::GlobalContext;

/// Load the workspace containing the current directory.
pub fn workspace(ctx: &GlobalContext) -> Result<Workspace> {
    let manifest_path = ctx.find_manifest()?;
    Workspace::new(&manifest_path)
}

pub fn resolve_options(args: &VariantArgs, deploy: bool) -> ResolveOptions {
    ResolveOptions {
        variant: args.variant(),
        properties: args.properties.clone(),
        properties_file: args.properties_file.clone(),
        deploy,
        debug_keystore: args.debug_keystore.clone(),
    }
}
