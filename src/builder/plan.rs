//! Build plan generation.
//!
//! A BuildPlan is everything the executor needs to run the pipeline for one
//! variant: the resolved variant, where each stage writes, the located tool
//! programs and the expanded packager command. It is built before any
//! external process is launched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::core::abi::Abi;
use crate::core::variant::{BuildType, ResolvedVariant};
use crate::deploy::DeployConfig;

/// Per-variant output directories.
///
/// ```text
/// build/drydock/<variant>/
///   native/<abi>/          CMake build trees
///   libs/<abi>/            shared libraries handed to the packager
///   intermediates/         unsigned package
///   outputs/<name>.apk     signed artifact
///   .fingerprint.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLayout {
    root: PathBuf,
    artifact_stem: String,
}

impl OutputLayout {
    pub fn new(variant_dir: impl Into<PathBuf>, project: &str, variant: &str, build_type: BuildType) -> Self {
        OutputLayout {
            root: variant_dir.into(),
            artifact_stem: artifact_stem(project, variant, build_type),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn native_dir(&self, abi: Abi) -> PathBuf {
        self.root.join("native").join(abi.as_str())
    }

    pub fn libs_root(&self) -> PathBuf {
        self.root.join("libs")
    }

    pub fn libs_dir(&self, abi: Abi) -> PathBuf {
        self.libs_root().join(abi.as_str())
    }

    pub fn intermediates(&self) -> PathBuf {
        self.root.join("intermediates")
    }

    pub fn unsigned_package(&self) -> PathBuf {
        self.intermediates()
            .join(format!("{}-unsigned.apk", self.artifact_stem))
    }

    pub fn outputs(&self) -> PathBuf {
        self.root.join("outputs")
    }

    /// Canonical path of the signed artifact.
    pub fn artifact(&self) -> PathBuf {
        self.outputs().join(format!("{}.apk", self.artifact_stem))
    }

    pub fn fingerprint_file(&self) -> PathBuf {
        self.root.join(".fingerprint.json")
    }
}

/// `<project>-<variant>`, with the build type appended when the variant
/// name does not already say it.
fn artifact_stem(project: &str, variant: &str, build_type: BuildType) -> String {
    if variant == build_type.as_str() {
        format!("{}-{}", project, variant)
    } else {
        format!("{}-{}-{}", project, variant, build_type)
    }
}

/// Located tool programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub cmake: PathBuf,
    pub apksigner: PathBuf,
    pub packager: PathBuf,
    /// Only located when deployment is requested
    pub uploader: Option<PathBuf>,
}

/// The packager invocation with every placeholder expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// A complete build plan for one variant.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub variant: ResolvedVariant,
    pub layout: OutputLayout,
    pub project_root: PathBuf,
    pub source_dir: PathBuf,
    /// Excluded from the source hash
    pub build_dir: PathBuf,
    pub tools: ToolPaths,
    pub packager: PackagerCommand,
    /// Present when deployment was requested
    #[serde(skip)]
    pub deploy: Option<DeployConfig>,
}

impl BuildPlan {
    pub fn deploy_requested(&self) -> bool {
        self.deploy.is_some()
    }

    /// The artifact this plan produces.
    pub fn artifact_path(&self) -> PathBuf {
        self.layout.artifact()
    }
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is a valid regex"));

/// Placeholders understood by the packager template.
pub const PLACEHOLDERS: &[&str] = &[
    "output",
    "native_libs",
    "application_id",
    "version_code",
    "version_name",
    "min_sdk",
    "target_sdk",
    "compile_sdk",
    "build_type",
    "variant",
    "source_dir",
];

/// Values for the packager template placeholders.
pub fn template_vars(
    variant: &ResolvedVariant,
    layout: &OutputLayout,
    source_dir: &Path,
) -> BTreeMap<&'static str, String> {
    let settings = variant.settings();
    BTreeMap::from([
        ("output", layout.unsigned_package().display().to_string()),
        ("native_libs", layout.libs_root().display().to_string()),
        ("application_id", variant.application_id().to_string()),
        ("version_code", variant.version_code().to_string()),
        ("version_name", variant.version_name().to_string()),
        ("min_sdk", settings.min_sdk.to_string()),
        ("target_sdk", settings.target_sdk.to_string()),
        ("compile_sdk", settings.compile_sdk.to_string()),
        ("build_type", variant.build_type().to_string()),
        ("variant", variant.name().to_string()),
        ("source_dir", source_dir.display().to_string()),
    ])
}

/// Expand `{name}` placeholders in each argument.
///
/// Returns the unknown placeholder names when any argument uses one.
pub fn expand_template(
    args: &[String],
    vars: &BTreeMap<&'static str, String>,
) -> Result<Vec<String>, Vec<String>> {
    let re = &*PLACEHOLDER_RE;

    let mut unknown = Vec::new();
    let expanded = args
        .iter()
        .map(|arg| {
            re.replace_all(arg, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match vars.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        if !unknown.iter().any(|u| u == name) {
                            unknown.push(name.to_string());
                        }
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
        })
        .collect();

    if unknown.is_empty() {
        Ok(expanded)
    } else {
        Err(unknown)
    }
}
