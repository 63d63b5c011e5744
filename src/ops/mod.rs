//! High-level operations.
//!
//! This module contains the implementation of drydock commands.

pub mod drydock_build;
pub mod drydock_clean;
pub mod drydock_init;
pub mod resolve;

pub use drydock_build::{build, BuildOptions, BuildResult};
pub use drydock_clean::clean;
pub use drydock_init::{init_project, InitOptions};
pub use resolve::{
    collect_sources, resolve_build, ResolutionError, ResolutionProblem, ResolveOptions,
    ResolvedBuild,
};
