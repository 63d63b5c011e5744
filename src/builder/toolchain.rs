//! Native toolchain chain construction.
//!
//! Turns resolved variant settings into the ordered list of CMake toolchain
//! files for the compile stage. The NDK toolchain is always present. When
//! vcpkg is chained it is loaded first and the NDK toolchain becomes its
//! chainload file:
//!
//! ```text
//! CMAKE_TOOLCHAIN_FILE            = <vcpkg>/scripts/buildsystems/vcpkg.cmake
//! VCPKG_CHAINLOAD_TOOLCHAIN_FILE  = <ndk>/build/cmake/android.toolchain.cmake
//! VCPKG_TARGET_TRIPLET            = arm64-android
//! ```
//!
//! Every path is checked here so that a broken environment is reported
//! before any compiler runs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::abi::{Abi, Stl};
use crate::core::manifest::PackageManagerPolicy;
use crate::core::variant::VariantSettings;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::ndk::{revision_matches, NdkInstall};
use crate::util::vcpkg::VcpkgInstall;

/// What a toolchain file provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainRole {
    PackageManager,
    Ndk,
}

/// One entry of the toolchain chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainFile {
    pub role: ToolchainRole,
    pub path: PathBuf,
}

/// Validated native toolchain for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeToolchainSpec {
    files: Vec<ToolchainFile>,
    triplet: String,
    abis: Vec<Abi>,
    stl: Stl,
    platform: u32,
    build_target: String,
    ndk_root: PathBuf,
    ndk_revision: Option<String>,
    vcpkg_baseline: Option<String>,
}

impl NativeToolchainSpec {
    /// Toolchain files in load order.
    pub fn files(&self) -> &[ToolchainFile] {
        &self.files
    }

    /// The file passed as `CMAKE_TOOLCHAIN_FILE`.
    pub fn primary(&self) -> &Path {
        // files is never empty: the NDK toolchain is always present
        self.files
            .first()
            .map(|f| f.path.as_path())
            .unwrap_or(self.ndk_root.as_path())
    }

    /// The NDK toolchain when it is chain-loaded by vcpkg.
    pub fn chainload(&self) -> Option<&Path> {
        if self.is_chained() {
            self.files
                .iter()
                .find(|f| f.role == ToolchainRole::Ndk)
                .map(|f| f.path.as_path())
        } else {
            None
        }
    }

    pub fn is_chained(&self) -> bool {
        self.files
            .iter()
            .any(|f| f.role == ToolchainRole::PackageManager)
    }

    pub fn triplet(&self) -> &str {
        &self.triplet
    }

    pub fn abis(&self) -> &[Abi] {
        &self.abis
    }

    pub fn stl(&self) -> Stl {
        self.stl
    }

    /// `ANDROID_PLATFORM` value.
    pub fn android_platform(&self) -> String {
        format!("android-{}", self.platform)
    }

    pub fn build_target(&self) -> &str {
        &self.build_target
    }

    pub fn ndk_root(&self) -> &Path {
        &self.ndk_root
    }

    pub fn ndk_revision(&self) -> Option<&str> {
        self.ndk_revision.as_deref()
    }

    pub fn vcpkg_baseline(&self) -> Option<&str> {
        self.vcpkg_baseline.as_deref()
    }
}

/// Problems that prevent a toolchain from being built.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum ToolchainError {
    #[error("`{setting}` is not configured")]
    #[diagnostic(code(drydock::toolchain::missing_environment), help("Set {env} or pass -P {setting}=<path>"))]
    MissingEnvironment {
        setting: &'static str,
        env: &'static str,
    },

    #[error("{what} not found: {}", .path.display())]
    #[diagnostic(code(drydock::toolchain::missing_path))]
    MissingPath { what: String, path: PathBuf },

    #[error("unsupported ABI `{name}`")]
    #[diagnostic(code(drydock::toolchain::unsupported_abi), help("Supported ABIs: arm64-v8a, armeabi-v7a, x86_64, x86"))]
    UnsupportedAbi { name: String },

    #[error("no ABIs selected")]
    #[diagnostic(code(drydock::toolchain::empty_abi_set), help("Set abi_filters to at least one ABI"))]
    EmptyAbiSet,

    #[error("unsupported STL `{name}`")]
    #[diagnostic(code(drydock::toolchain::unsupported_stl), help("Use c++_shared, c++_static, system or none"))]
    UnsupportedStl { name: String },

    #[error("vcpkg triplet `{triplet}` cannot serve ABIs {}", .abis.join(", "))]
    #[diagnostic(
        code(drydock::toolchain::incompatible_chainload),
        help("A vcpkg chain builds for one triplet; select a single ABI or pass -P vcpkg=false")
    )]
    IncompatibleChainload { triplet: String, abis: Vec<String> },

    #[error("NDK at {} is revision {found}, but {pinned} is pinned", .root.display())]
    #[diagnostic(code(drydock::toolchain::ndk_version_mismatch), help("Install NDK {pinned} or point ANDROID_NDK_HOME at it"))]
    NdkVersionMismatch {
        root: PathBuf,
        pinned: String,
        found: String,
    },

    #[error("cannot determine NDK revision at {}: {message}", .root.display())]
    #[diagnostic(code(drydock::toolchain::ndk_revision))]
    UnreadableNdkRevision { root: PathBuf, message: String },

    #[error("vcpkg is required by the `{policy}` policy but is not available")]
    #[diagnostic(code(drydock::toolchain::package_manager_required))]
    PackageManagerRequired { policy: PackageManagerPolicy },

    #[error("{tool} program `{program}` not found")]
    #[diagnostic(code(drydock::toolchain::missing_tool), help("Install it, or pass -P tool.{tool}=<path>"))]
    MissingTool { tool: String, program: String },
}

impl ToolchainError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ToolchainError::MissingEnvironment { setting, .. } if *setting == "ndk_root" => {
                diag.with_suggestion(suggestions::NDK_ROOT)
            }
            ToolchainError::MissingEnvironment { env, setting } => {
                diag.with_suggestion(format!("Set {} or pass -P {}=<path>", env, setting))
            }
            ToolchainError::PackageManagerRequired { .. } => {
                diag.with_suggestion(suggestions::VCPKG_ROOT)
            }
            ToolchainError::IncompatibleChainload { abis, .. } => diag
                .with_context(format!("selected ABIs: {}", abis.join(", ")))
                .with_suggestion("Select a single ABI with -P abi_filters=<abi>")
                .with_suggestion("Build without vcpkg with -P vcpkg=false"),
            ToolchainError::UnsupportedAbi { .. } => {
                diag.with_context(format!("supported: {}", Abi::supported_names()))
            }
            ToolchainError::MissingTool { tool, .. } => {
                diag.with_suggestion(format!("Pass -P tool.{}=<path>", tool))
            }
            _ => diag,
        }
    }
}

/// Builds [`NativeToolchainSpec`]s under a project policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolchainChainBuilder {
    policy: PackageManagerPolicy,
}

impl ToolchainChainBuilder {
    pub fn new(policy: PackageManagerPolicy) -> Self {
        ToolchainChainBuilder { policy }
    }

    /// Validate settings and build the chain. Every problem is reported.
    pub fn build(&self, settings: &VariantSettings) -> Result<NativeToolchainSpec, Vec<ToolchainError>> {
        let mut errors = Vec::new();

        let abis = parse_abis(&settings.abi_filters, &mut errors);

        let stl = match settings.stl.parse::<Stl>() {
            Ok(stl) => Some(stl),
            Err(_) => {
                errors.push(ToolchainError::UnsupportedStl {
                    name: settings.stl.clone(),
                });
                None
            }
        };

        let (ndk_toolchain, ndk_revision) = self.check_ndk(settings, &mut errors);

        let triplet = settings
            .triplet
            .clone()
            .or_else(|| abis.first().map(|abi| abi.vcpkg_triplet().to_string()));

        let chained = settings.vcpkg_enabled && settings.vcpkg_root.is_some();
        let required = match self.policy {
            PackageManagerPolicy::Optional => false,
            PackageManagerPolicy::Required => true,
            PackageManagerPolicy::RequiredForRelease => settings.build_type.is_release(),
        };
        if required && !chained {
            errors.push(ToolchainError::PackageManagerRequired {
                policy: self.policy,
            });
        } else if !chained {
            tracing::debug!("building `{}` without vcpkg", settings.name);
        }

        let mut vcpkg_toolchain = None;
        let mut vcpkg_baseline = None;
        if let (true, Some(root)) = (chained, &settings.vcpkg_root) {
            let vcpkg = VcpkgInstall::new(root);
            if !root.is_dir() {
                errors.push(ToolchainError::MissingPath {
                    what: "vcpkg root".into(),
                    path: root.clone(),
                });
            } else {
                let file = vcpkg.toolchain_file();
                if file.is_file() {
                    vcpkg_toolchain = Some(file);
                } else {
                    errors.push(ToolchainError::MissingPath {
                        what: "vcpkg toolchain file".into(),
                        path: file,
                    });
                }
                if let Some(triplet) = &triplet {
                    if vcpkg.triplet_file(triplet).is_none() {
                        errors.push(ToolchainError::MissingPath {
                            what: format!("vcpkg triplet `{}`", triplet),
                            path: root.join("triplets").join(format!("{}.cmake", triplet)),
                        });
                    }
                }
                vcpkg_baseline = vcpkg.baseline();
            }

            if let Some(triplet) = &triplet {
                let incompatible = abis.len() > 1
                    || abis.first().is_some_and(|abi| !triplet_matches_abi(triplet, *abi));
                if incompatible {
                    errors.push(ToolchainError::IncompatibleChainload {
                        triplet: triplet.clone(),
                        abis: abis.iter().map(|a| a.to_string()).collect(),
                    });
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        match (stl, ndk_toolchain, triplet) {
            (Some(stl), Some(ndk_toolchain), Some(triplet)) => {
                let mut files = Vec::new();
                if let Some(path) = vcpkg_toolchain {
                    files.push(ToolchainFile {
                        role: ToolchainRole::PackageManager,
                        path,
                    });
                }
                files.push(ToolchainFile {
                    role: ToolchainRole::Ndk,
                    path: ndk_toolchain,
                });

                Ok(NativeToolchainSpec {
                    files,
                    triplet,
                    abis,
                    stl,
                    platform: settings.min_sdk,
                    build_target: settings.build_target.clone(),
                    ndk_root: settings.ndk_root.clone().unwrap_or_default(),
                    ndk_revision,
                    vcpkg_baseline,
                })
            }
            _ => Err(vec![ToolchainError::EmptyAbiSet]),
        }
    }

    fn check_ndk(
        &self,
        settings: &VariantSettings,
        errors: &mut Vec<ToolchainError>,
    ) -> (Option<PathBuf>, Option<String>) {
        let Some(root) = &settings.ndk_root else {
            errors.push(ToolchainError::MissingEnvironment {
                setting: "ndk_root",
                env: "ANDROID_NDK_HOME",
            });
            return (None, None);
        };
        if !root.is_dir() {
            errors.push(ToolchainError::MissingPath {
                what: "NDK root".into(),
                path: root.clone(),
            });
            return (None, None);
        }

        let ndk = NdkInstall::new(root);
        let toolchain = ndk.toolchain_file();
        let toolchain = if toolchain.is_file() {
            Some(toolchain)
        } else {
            errors.push(ToolchainError::MissingPath {
                what: "NDK toolchain file".into(),
                path: toolchain,
            });
            None
        };

        let revision = match ndk.revision() {
            Ok(rev) => rev,
            Err(e) => {
                if settings.ndk_version.is_some() {
                    errors.push(ToolchainError::UnreadableNdkRevision {
                        root: root.clone(),
                        message: format!("{:#}", e),
                    });
                }
                None
            }
        };

        if let Some(pinned) = &settings.ndk_version {
            match &revision {
                Some(found) if !revision_matches(pinned, found) => {
                    errors.push(ToolchainError::NdkVersionMismatch {
                        root: root.clone(),
                        pinned: pinned.clone(),
                        found: found.to_string(),
                    });
                }
                Some(_) => {}
                None if errors
                    .iter()
                    .any(|e| matches!(e, ToolchainError::UnreadableNdkRevision { .. })) => {}
                None => errors.push(ToolchainError::UnreadableNdkRevision {
                    root: root.clone(),
                    message: "source.properties has no Pkg.Revision".into(),
                }),
            }
        }

        (toolchain, revision.map(|r| r.to_string()))
    }
}

/// Parse ABI names into a set in enumeration order.
fn parse_abis(names: &[String], errors: &mut Vec<ToolchainError>) -> Vec<Abi> {
    if names.is_empty() {
        errors.push(ToolchainError::EmptyAbiSet);
        return Vec::new();
    }
    let mut abis = BTreeSet::new();
    for name in names {
        match name.parse::<Abi>() {
            Ok(abi) => {
                abis.insert(abi);
            }
            Err(_) => errors.push(ToolchainError::UnsupportedAbi { name: name.clone() }),
        }
    }
    abis.into_iter().collect()
}

/// A triplet serves an ABI when their architecture components agree
/// (`arm64-android-static` serves `arm64-v8a`).
fn triplet_matches_abi(triplet: &str, abi: Abi) -> bool {
    let arch = |t: &str| t.split('-').next().unwrap_or_default().to_string();
    arch(triplet) == arch(abi.vcpkg_triplet())
}
