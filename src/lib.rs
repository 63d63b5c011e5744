//! Drydock - build variant resolution and release pipeline for native
//! Android apps.
//!
//! This crate provides the core library functionality for drydock:
//! layered configuration, variant and toolchain resolution, signing, and
//! the staged compile/package/sign/deploy pipeline.

pub mod builder;
pub mod core;
pub mod deploy;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test fixtures for drydock unit tests.
///
/// Only compiled for tests. Provides throwaway projects with a fake NDK
/// and shell-script tools.
#[cfg(all(test, unix))]
pub mod test_support;

pub use core::{manifest::Manifest, variant::ResolvedVariant, workspace::Workspace};

pub use resolver::VariantResolver;
pub use util::context::GlobalContext;
