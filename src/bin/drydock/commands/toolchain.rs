//! `drydock toolchain` command

use anyhow::Result;

use crate::cli::ResolveArgs;
use drydock::builder::toolchain::ToolchainRole;
use drydock::ops::resolve_build;
use drydock::util::GlobalContext;

pub fn execute(args: ResolveArgs, ctx: &GlobalContext) -> Result<()> {
    let ws = super::workspace(ctx)?;
    let opts = super::resolve_options(&args.variant, args.deploy);
    let resolved = resolve_build(&ws, ctx, &opts)?;

    let plan = &resolved.plan;
    let toolchain = plan.variant.native_toolchain();

    println!("Toolchain chain:");
    println!();
    for (i, file) in toolchain.files().iter().enumerate() {
        let role = match file.role {
            ToolchainRole::PackageManager => "package manager",
            ToolchainRole::Ndk => "ndk",
        };
        println!("  {}. {:<16} {}", i + 1, role, file.path.display());
    }
    println!();

    println!("  NDK:      {}", toolchain.ndk_root().display());
    if let Some(rev) = toolchain.ndk_revision() {
        println!("    Revision: {}", rev);
    }
    if let Some(baseline) = toolchain.vcpkg_baseline() {
        println!("  vcpkg:    baseline {}", baseline);
    }
    if toolchain.is_chained() {
        println!("  Triplet:  {}", toolchain.triplet());
    }
    println!(
        "  ABIs:     {}",
        toolchain
            .abis()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  STL:      {}", toolchain.stl());
    println!("  Platform: {}", toolchain.android_platform());
    println!("  Target:   {}", toolchain.build_target());
    println!();

    println!("Tools:");
    println!("  cmake:     {}", plan.tools.cmake.display());
    println!("  apksigner: {}", plan.tools.apksigner.display());
    println!("  packager:  {}", plan.tools.packager.display());
    if let Some(uploader) = &plan.tools.uploader {
        println!("  uploader:  {}", uploader.display());
    }

    Ok(())
}
