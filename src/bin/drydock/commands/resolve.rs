//! `drydock resolve` command
//!
//! Prints every setting of a variant with the source that supplied it.

use anyhow::Result;

use crate::cli::ResolveArgs;
use drydock::ops::resolve_build;
use drydock::resolver::keys;
use drydock::util::diagnostic::emit;
use drydock::util::secret::REDACTED;
use drydock::util::GlobalContext;

pub fn execute(args: ResolveArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = super::workspace(ctx)?;
    let opts = super::resolve_options(&args.variant, args.deploy);
    let resolved = resolve_build(&ws, ctx, &opts)?;

    for warning in &resolved.warnings {
        emit(warning, ctx.color());
    }

    let plan = &resolved.plan;
    let variant = &plan.variant;

    println!("Variant: {} ({})", variant.name(), variant.build_type());
    println!("  application id: {}", variant.application_id());
    println!(
        "  version:        {} (code {})",
        variant.version_name(),
        variant.version_code()
    );
    println!(
        "  abis:           {}",
        variant
            .abi_filters()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  artifact:       {}", plan.artifact_path().display());
    println!();

    println!("Settings:");
    for key in keys::DISPLAYED {
        match resolved.sources.lookup(key, variant.name()) {
            Some(value) => println!(
                "  {:<22} {:<32} {}",
                key,
                value.payload.render(),
                value.describe_origin()
            ),
            None => println!("  {:<22} (unset)", key),
        }
    }
    for key in keys::SECRET {
        if let Some(value) = resolved.sources.lookup(key, variant.name()) {
            println!("  {:<22} {:<32} {}", key, REDACTED, value.describe_origin());
        }
    }
    println!();

    let signing = variant.signing();
    println!("Signing: {} identity", signing.kind());
    println!("  keystore: {}", signing.keystore().display());
    println!("  alias:    {}", signing.alias());

    Ok(())
}
