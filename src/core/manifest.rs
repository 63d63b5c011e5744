//! Drydock.toml manifest parsing and schema.
//!
//! The manifest describes one application: where its native sources live,
//! the project defaults, per-variant overrides, the pinned revision layers,
//! tool programs and deployment settings.
//!
//! ```toml
//! [project]
//! name = "choppyengine"
//! active-revision = "ndk-29"
//!
//! [defaults]
//! application_id = "com.omixlab.choppyengine"
//! build_target = "choppyengine"
//!
//! [variant.release]
//! version_name = "1.0"
//!
//! [[revision]]
//! name = "ndk-29"
//! ndk_version = "29.0.13113456"
//!
//! [tools.packager]
//! program = "./scripts/package.sh"
//! args = ["{output}", "{native_libs}"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::config_value::{ConfigPayload, ConfigValue};
use crate::core::revision::{RevisionLayer, RevisionStore};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Drydock.toml";

/// Whether a package-manager root must be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageManagerPolicy {
    /// Missing root silently builds without the package manager
    #[default]
    Optional,
    /// Missing root is an error for every variant
    Required,
    /// Missing root is an error for release builds only
    RequiredForRelease,
}

impl PackageManagerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManagerPolicy::Optional => "optional",
            PackageManagerPolicy::Required => "required",
            PackageManagerPolicy::RequiredForRelease => "required-for-release",
        }
    }
}

impl FromStr for PackageManagerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optional" => Ok(PackageManagerPolicy::Optional),
            "required" => Ok(PackageManagerPolicy::Required),
            "required-for-release" => Ok(PackageManagerPolicy::RequiredForRelease),
            other => Err(format!(
                "unknown package-manager policy `{}`; expected optional, required or required-for-release",
                other
            )),
        }
    }
}

impl fmt::Display for PackageManagerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project metadata from the [project] section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectMetadata {
    /// Project name, used in artifact file names
    pub name: String,

    /// Native source directory (contains CMakeLists.txt)
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Build output root
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Name of the revision layer that contributes overrides
    #[serde(default)]
    pub active_revision: Option<String>,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

/// Project policies from the [policy] section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Policy {
    pub package_manager: PackageManagerPolicy,
}

/// Packaging command template from [tools.packager].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagerTemplate {
    /// Program to run (path relative to the project root, or a name on PATH)
    pub program: String,

    /// Arguments; placeholders such as `{output}` are expanded per build
    #[serde(default)]
    pub args: Vec<String>,
}

/// The parsed Drydock.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub project: ProjectMetadata,

    pub policy: Policy,

    /// Flattened [defaults] settings
    pub defaults: Vec<(String, ConfigPayload)>,

    /// Flattened [variant.<name>] settings
    pub variants: BTreeMap<String, Vec<(String, ConfigPayload)>>,

    /// [[revision]] layers with the active pointer applied
    pub revisions: RevisionStore,

    /// Flattened [tools] program settings (`tool.<name>`)
    pub tools: Vec<(String, ConfigPayload)>,

    pub packager: Option<PackagerTemplate>,

    /// Flattened [deploy] settings (`deploy.<name>`)
    pub deploy: Vec<(String, ConfigPayload)>,

    /// The directory containing this manifest
    pub manifest_dir: PathBuf,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    project: ProjectMetadata,

    #[serde(default)]
    policy: Policy,

    #[serde(default)]
    defaults: toml::Table,

    #[serde(default)]
    variant: BTreeMap<String, toml::Table>,

    #[serde(default)]
    revision: Vec<RawRevision>,

    #[serde(default)]
    tools: RawTools,

    #[serde(default)]
    deploy: toml::Table,
}

#[derive(Debug, Deserialize)]
struct RawRevision {
    name: String,

    #[serde(flatten)]
    settings: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
struct RawTools {
    #[serde(default)]
    packager: Option<PackagerTemplate>,

    #[serde(flatten)]
    programs: toml::Table,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        if raw.project.name.trim().is_empty() {
            bail!("[project] name must not be empty in {}", path.display());
        }

        let defaults = flatten_settings(&raw.defaults, None).context("in [defaults]")?;

        let mut variants = BTreeMap::new();
        for (name, table) in &raw.variant {
            let settings = flatten_settings(table, None)
                .with_context(|| format!("in [variant.{}]", name))?;
            variants.insert(name.clone(), settings);
        }

        let mut revisions = RevisionStore::new();
        for raw_rev in &raw.revision {
            let mut layer = RevisionLayer::new(raw_rev.name.clone());
            for (key, payload) in flatten_settings(&raw_rev.settings, None)
                .with_context(|| format!("in revision `{}`", raw_rev.name))?
            {
                layer = layer.with_setting(key, payload);
            }
            revisions.push(layer)?;
        }
        if let Some(active) = &raw.project.active_revision {
            revisions.set_active(active)?;
        }

        let tools = flatten_settings(&raw.tools.programs, Some("tool")).context("in [tools]")?;
        let deploy = flatten_settings(&raw.deploy, Some("deploy")).context("in [deploy]")?;

        Ok(Manifest {
            project: raw.project,
            policy: raw.policy,
            defaults,
            variants,
            revisions,
            tools,
            packager: raw.tools.packager,
            deploy,
            manifest_dir,
        })
    }

    /// Get the project name.
    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// Absolute native source directory.
    pub fn source_dir(&self) -> PathBuf {
        self.manifest_dir.join(&self.project.source_dir)
    }

    /// Absolute build output root.
    pub fn build_dir(&self) -> PathBuf {
        self.manifest_dir.join(&self.project.build_dir)
    }

    /// Declared variant sections.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Every manifest setting as a default-tier config value.
    ///
    /// Revision layers are not included; see [`RevisionStore::active_values`].
    pub fn config_values(&self) -> Vec<ConfigValue> {
        let mut values = Vec::new();
        let sections = [
            ("[defaults]", &self.defaults),
            ("[tools]", &self.tools),
            ("[deploy]", &self.deploy),
        ];
        for (section, settings) in sections {
            for (key, payload) in settings {
                values.push(
                    ConfigValue::default_value(key.clone(), payload.clone())
                        .with_origin(format!("{} {}", MANIFEST_NAME, section)),
                );
            }
        }
        for (variant, settings) in &self.variants {
            for (key, payload) in settings {
                values.push(
                    ConfigValue::default_value(key.clone(), payload.clone())
                        .for_variant(variant.clone())
                        .with_origin(format!("{} [variant.{}]", MANIFEST_NAME, variant)),
                );
            }
        }
        values
    }
}

/// Flatten a settings table into dotted keys. Dashes in keys become
/// underscores so `min-sdk` and `min_sdk` name the same setting.
fn flatten_settings(table: &toml::Table, prefix: Option<&str>) -> Result<Vec<(String, ConfigPayload)>> {
    let mut out = Vec::new();
    for (key, value) in table {
        let key = key.replace('-', "_");
        let full = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key,
        };
        match value {
            toml::Value::Table(inner) => out.extend(flatten_settings(inner, Some(&full))?),
            other => match ConfigPayload::from_toml(other) {
                Some(payload) => out.push((full, payload)),
                None => bail!("unsupported value for `{}`: {}", full, other),
            },
        }
    }
    Ok(out)
}

/// Generate a starter Drydock.toml.
pub fn generate_default_manifest(name: &str, application_id: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
source-dir = "."

[defaults]
application_id = "{application_id}"
build_target = "{name}"
version_name = "1.0"

[[revision]]
name = "initial"
ndk_version = "29.0.13113456"

[tools.packager]
program = "./scripts/package-apk.sh"
args = ["{{output}}", "{{native_libs}}", "{{application_id}}", "{{version_code}}", "{{version_name}}"]
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[project]
name = "choppyengine"
source-dir = "engine"
active-revision = "ndk-27"

[policy]
package-manager = "required-for-release"

[defaults]
application_id = "com.omixlab.choppyengine"
build_target = "choppyengine"
abi_filters = ["arm64-v8a", "x86_64"]
min-sdk = 32

[variant.release]
version_name = "1.0"

[variant.staging]
build_type = "release"

[[revision]]
name = "ndk-27"
ndk_version = "27.2.12479018"

[[revision]]
name = "ndk-29"
ndk_version = "29.0.13113456"

[tools]
cmake = "/opt/cmake/bin/cmake"

[tools.packager]
program = "./package.sh"
args = ["{output}"]

[deploy]
channel = "beta"
app-id = "1234"
"#;

    fn parse(src: &str) -> Result<Manifest> {
        Manifest::parse(src, Path::new("/proj/Drydock.toml"))
    }

    #[test]
    fn test_parse_full_manifest() {
        let m = parse(FULL).unwrap();
        assert_eq!(m.name(), "choppyengine");
        assert_eq!(m.source_dir(), PathBuf::from("/proj/engine"));
        assert_eq!(m.build_dir(), PathBuf::from("/proj/build"));
        assert_eq!(m.policy.package_manager, PackageManagerPolicy::RequiredForRelease);
        assert_eq!(m.revisions.active().unwrap().name(), "ndk-27");
        assert_eq!(m.packager.as_ref().unwrap().program, "./package.sh");
        assert_eq!(m.variant_names().collect::<Vec<_>>(), vec!["release", "staging"]);
    }

    #[test]
    fn test_settings_are_flattened_and_normalized() {
        let m = parse(FULL).unwrap();
        assert!(m
            .defaults
            .contains(&("min_sdk".to_string(), ConfigPayload::Int(32))));
        assert!(m.defaults.contains(&(
            "abi_filters".to_string(),
            ConfigPayload::Str("arm64-v8a,x86_64".to_string())
        )));
        assert!(m
            .tools
            .contains(&("tool.cmake".to_string(), ConfigPayload::from("/opt/cmake/bin/cmake"))));
        assert!(m
            .deploy
            .contains(&("deploy.app_id".to_string(), ConfigPayload::from("1234"))));
    }

    #[test]
    fn test_config_values_scope_variant_sections() {
        let m = parse(FULL).unwrap();
        let values = m.config_values();
        let staging = values
            .iter()
            .find(|v| v.key == "build_type")
            .unwrap();
        assert_eq!(staging.variant.as_deref(), Some("staging"));
        assert!(staging.origin.as_deref().unwrap().contains("[variant.staging]"));
    }

    #[test]
    fn test_minimal_manifest_uses_defaults() {
        let m = parse("[project]\nname = \"app\"\n").unwrap();
        assert_eq!(m.source_dir(), PathBuf::from("/proj/."));
        assert!(m.revisions.is_empty());
        assert!(m.packager.is_none());
        assert_eq!(m.policy.package_manager, PackageManagerPolicy::Optional);
    }

    #[test]
    fn test_unknown_active_revision_is_error() {
        let err = parse("[project]\nname = \"app\"\nactive-revision = \"nope\"\n").unwrap_err();
        assert!(format!("{:#}", err).contains("nope"));
    }

    #[test]
    fn test_unknown_section_is_error() {
        assert!(parse("[project]\nname = \"app\"\n[dependencies]\nzlib = \"1\"\n").is_err());
    }

    #[test]
    fn test_generated_manifest_parses() {
        let src = generate_default_manifest("demo", "com.example.demo");
        let m = parse(&src).unwrap();
        assert_eq!(m.name(), "demo");
        assert_eq!(m.packager.unwrap().args[0], "{output}");
    }
}
