//! Toolchain, signing and pipeline execution.
//!
//! This module turns resolved variant settings into a native toolchain
//! chain and a signing identity, plans the build, and runs the staged
//! pipeline that drives CMake, the packager and apksigner.

pub mod cmake;
pub mod events;
pub mod executor;
pub mod fingerprint;
pub mod plan;
pub mod signing;
pub mod stage;
pub mod toolchain;

pub use events::{EventSink, PipelineEvent};
pub use executor::{PipelineExecutor, PipelineReport, SignedArtifact};
pub use plan::{BuildPlan, OutputLayout};
pub use signing::{SigningIdentity, SigningResolver};
pub use stage::{PipelineStage, StageStatus};
pub use toolchain::{NativeToolchainSpec, ToolchainChainBuilder};
