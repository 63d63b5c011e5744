//! Android NDK installation helpers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::{Version, VersionReq};

/// Toolchain file inside an NDK, relative to its root.
pub const NDK_TOOLCHAIN_FILE: &str = "build/cmake/android.toolchain.cmake";

/// An NDK installation directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdkInstall {
    root: PathBuf,
}

impl NdkInstall {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        NdkInstall { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn toolchain_file(&self) -> PathBuf {
        self.root.join(NDK_TOOLCHAIN_FILE)
    }

    pub fn source_properties(&self) -> PathBuf {
        self.root.join("source.properties")
    }

    /// `Pkg.Revision` from source.properties, if the file has one.
    pub fn revision(&self) -> Result<Option<Version>> {
        let path = self.source_properties();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let props = parse_properties(&content);
        let Some(raw) = props.get("Pkg.Revision") else {
            return Ok(None);
        };
        parse_revision(raw)
            .map(Some)
            .with_context(|| format!("invalid Pkg.Revision `{}` in {}", raw, path.display()))
    }
}

/// Parse `key = value` lines.
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// NDK revisions look like `29.0.13113456` or `26.0.10404224-beta1`.
pub fn parse_revision(raw: &str) -> Result<Version> {
    Version::parse(raw.trim()).with_context(|| format!("`{}` is not a semantic version", raw))
}

/// Whether an installed revision satisfies a pinned version.
///
/// A full version must match exactly; a partial one (`29`, `29.0`) matches
/// any revision with that prefix.
pub fn revision_matches(pinned: &str, actual: &Version) -> bool {
    let pinned = pinned.trim();
    if let Ok(exact) = Version::parse(pinned) {
        return exact.major == actual.major
            && exact.minor == actual.minor
            && exact.patch == actual.patch
            && exact.pre == actual.pre;
    }
    VersionReq::parse(&format!("={}", pinned))
        .map(|req| req.matches(actual))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_revision_from_source_properties() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("source.properties"),
            "Pkg.Desc = Android NDK\nPkg.Revision = 29.0.13113456\n",
        )
        .unwrap();

        let ndk = NdkInstall::new(tmp.path());
        assert_eq!(
            ndk.revision().unwrap(),
            Some(Version::new(29, 0, 13113456))
        );
        assert!(ndk.toolchain_file().ends_with("build/cmake/android.toolchain.cmake"));
    }

    #[test]
    fn test_missing_revision_key() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("source.properties"), "Pkg.Desc = NDK\n").unwrap();
        assert_eq!(NdkInstall::new(tmp.path()).revision().unwrap(), None);
    }

    #[test]
    fn test_revision_matches() {
        let actual = Version::new(29, 0, 13113456);
        assert!(revision_matches("29.0.13113456", &actual));
        assert!(revision_matches("29", &actual));
        assert!(revision_matches("29.0", &actual));
        assert!(!revision_matches("27.2.12479018", &actual));
        assert!(!revision_matches("garbage", &actual));

        let beta = parse_revision("26.0.10404224-beta1").unwrap();
        assert!(!revision_matches("26.0.10404224", &beta));
    }
}
