//! Core data structures for drydock.
//!
//! This module contains the foundational types used throughout drydock:
//! - ABIs and STL selections
//! - Config values with provenance, and revision layers
//! - The Drydock.toml manifest
//! - Variant settings and the resolved variant
//! - Workspace management

pub mod abi;
pub mod config_value;
pub mod manifest;
pub mod revision;
pub mod variant;
pub mod workspace;

pub use abi::{Abi, Stl};
pub use config_value::{ConfigPayload, ConfigSourceSet, ConfigValue, Provenance};
pub use manifest::{Manifest, MANIFEST_NAME};
pub use revision::{RevisionLayer, RevisionStore};
pub use variant::{BuildType, ResolvedVariant, VariantSettings};
pub use workspace::{find_manifest, Workspace};
