//! Build types, resolved variant settings and the immutable resolved variant.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::builder::signing::SigningIdentity;
use crate::builder::toolchain::NativeToolchainSpec;
use crate::core::abi::{Abi, Stl};

/// Whether a variant is built for development or for release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Debug,
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "debug",
            BuildType::Release => "release",
        }
    }

    /// `CMAKE_BUILD_TYPE` value.
    pub fn cmake_build_type(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, BuildType::Release)
    }

    /// The build type a variant name implies, if it is one of the builtins.
    pub fn from_variant_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            other => Err(format!("unknown build type `{}`; expected debug or release", other)),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Programs the pipeline invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPrograms {
    pub cmake: String,
    pub apksigner: String,
    pub uploader: String,
}

/// Deployment settings. The secret is looked up separately and never
/// stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploySettings {
    pub app_id: Option<String>,
    pub channel: String,
    pub subcommand: String,
}

/// Output of the variant resolver: one effective value per setting.
///
/// ABI and STL names are kept raw; the toolchain builder validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSettings {
    pub name: String,
    pub build_type: BuildType,
    pub application_id: String,
    pub version_code: u32,
    pub version_name: String,
    pub abi_filters: Vec<String>,
    pub stl: String,
    pub min_sdk: u32,
    pub target_sdk: u32,
    pub compile_sdk: u32,
    pub build_target: String,
    pub ndk_root: Option<PathBuf>,
    pub ndk_version: Option<String>,
    pub vcpkg_root: Option<PathBuf>,
    pub vcpkg_enabled: bool,
    pub triplet: Option<String>,
    pub tools: ToolPrograms,
    pub deploy: DeploySettings,
}

/// Immutable snapshot of everything one build needs.
///
/// Assembled once per invocation from the resolver, toolchain builder and
/// signing resolver outputs.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedVariant {
    settings: VariantSettings,
    native_toolchain: NativeToolchainSpec,
    signing: SigningIdentity,
}

impl ResolvedVariant {
    pub fn assemble(
        settings: VariantSettings,
        native_toolchain: NativeToolchainSpec,
        signing: SigningIdentity,
    ) -> Self {
        ResolvedVariant {
            settings,
            native_toolchain,
            signing,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn build_type(&self) -> BuildType {
        self.settings.build_type
    }

    pub fn application_id(&self) -> &str {
        &self.settings.application_id
    }

    pub fn version_code(&self) -> u32 {
        self.settings.version_code
    }

    pub fn version_name(&self) -> &str {
        &self.settings.version_name
    }

    /// Validated, non-empty ABI set.
    pub fn abi_filters(&self) -> &[Abi] {
        self.native_toolchain.abis()
    }

    pub fn stl(&self) -> Stl {
        self.native_toolchain.stl()
    }

    pub fn settings(&self) -> &VariantSettings {
        &self.settings
    }

    pub fn native_toolchain(&self) -> &NativeToolchainSpec {
        &self.native_toolchain
    }

    pub fn signing(&self) -> &SigningIdentity {
        &self.signing
    }

    pub fn tools(&self) -> &ToolPrograms {
        &self.settings.tools
    }
}
