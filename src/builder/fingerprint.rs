//! Build fingerprinting for incremental builds.
//!
//! A fingerprint captures every input of the compile, package and sign
//! stages. When the stored fingerprint matches and the artifact on disk
//! still has the recorded hash, those stages are reused.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::plan::BuildPlan;
use crate::util::fs::{read_to_string, write_atomic};
use crate::util::hash::{sha256_file, sha256_tree, Fingerprint};

/// Stored next to the variant outputs after a successful Sign stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFingerprint {
    /// Hash of all build inputs
    pub inputs: String,

    /// Hash of the signed artifact
    pub artifact_sha256: String,
}

impl BuildFingerprint {
    /// Load a stored fingerprint. Unreadable or corrupt files count as absent.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::debug!("ignoring corrupt fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("failed to serialize fingerprint")?;
        write_atomic(path, &content)
    }
}

/// Stands in for the keystore hash when the file cannot be read.
const UNREADABLE_KEYSTORE: &str = "unreadable";

/// Hash every input of a build plan.
pub fn compute_inputs(plan: &BuildPlan) -> Result<String> {
    let variant = &plan.variant;
    let toolchain = variant.native_toolchain();
    let signing = variant.signing();

    let settings = serde_json::to_string(variant.settings()).context("failed to serialize settings")?;
    let tree = sha256_tree(&plan.source_dir, &[plan.build_dir.as_path()])?;
    let keystore = match sha256_file(signing.keystore()) {
        Ok(sha) => sha,
        Err(e) => {
            tracing::debug!("keystore not hashed, treating build as stale: {:#}", e);
            UNREADABLE_KEYSTORE.to_string()
        }
    };

    let mut fp = Fingerprint::new();
    fp.update_str(&settings)
        .update_strs(toolchain.files().iter().map(|f| f.path.to_str().unwrap_or_default()))
        .update_str(toolchain.triplet())
        .update_strs(toolchain.abis().iter().map(|a| a.as_str()))
        .update_str(toolchain.stl().as_str())
        .update_str(&toolchain.android_platform())
        .update_str(toolchain.build_target())
        .update_opt(toolchain.ndk_revision())
        .update_opt(toolchain.vcpkg_baseline())
        .update_str(signing.kind().as_str())
        .update_str(&signing.keystore().display().to_string())
        .update_str(&keystore)
        .update_str(signing.alias())
        .update_str(&plan.tools.cmake.display().to_string())
        .update_str(&plan.tools.apksigner.display().to_string())
        .update_str(&plan.packager.program.display().to_string())
        .update_strs(plan.packager.args.iter().map(String::as_str))
        .update_str(&tree);

    Ok(fp.finish())
}

/// Whether a previous run's artifact can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// The artifact matches; carries its hash
    Fresh { artifact_sha256: String },
    Stale,
}

/// Compare the stored fingerprint with the current inputs.
pub fn check(plan: &BuildPlan, inputs: &str) -> Freshness {
    let Some(stored) = BuildFingerprint::load(&plan.layout.fingerprint_file()) else {
        return Freshness::Stale;
    };
    if stored.inputs != inputs {
        tracing::debug!("inputs changed for `{}`", plan.variant.name());
        return Freshness::Stale;
    }

    let artifact = plan.layout.artifact();
    match sha256_file(&artifact) {
        Ok(sha) if sha == stored.artifact_sha256 => Freshness::Fresh {
            artifact_sha256: sha,
        },
        _ => {
            tracing::debug!("artifact missing or modified: {}", artifact.display());
            Freshness::Stale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".fingerprint.json");
        let fp = BuildFingerprint {
            inputs: "abc".into(),
            artifact_sha256: "def".into(),
        };
        fp.save(&path).unwrap();
        assert_eq!(BuildFingerprint::load(&path), Some(fp));
    }

    #[test]
    fn test_corrupt_fingerprint_is_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".fingerprint.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(BuildFingerprint::load(&path), None);
        assert_eq!(BuildFingerprint::load(&tmp.path().join("missing")), None);
    }
}
