//! Vcpkg integration helpers.
//!
//! Drydock only chain-loads vcpkg's CMake toolchain; it never drives the
//! vcpkg binary itself. This module knows the directory layout needed to
//! validate a checkout before it is handed to CMake.

use std::fs;
use std::path::{Path, PathBuf};

/// Toolchain file inside a vcpkg checkout, relative to its root.
pub const VCPKG_TOOLCHAIN_FILE: &str = "scripts/buildsystems/vcpkg.cmake";

/// A vcpkg checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcpkgInstall {
    root: PathBuf,
}

impl VcpkgInstall {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        VcpkgInstall { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn toolchain_file(&self) -> PathBuf {
        self.root.join(VCPKG_TOOLCHAIN_FILE)
    }

    /// Locate the definition of a triplet, built-in or community.
    pub fn triplet_file(&self, triplet: &str) -> Option<PathBuf> {
        let file = format!("{}.cmake", triplet);
        let triplets = self.root.join("triplets");
        [triplets.join(&file), triplets.join("community").join(&file)]
            .into_iter()
            .find(|p| p.is_file())
    }

    /// Get the path to the vcpkg binary.
    pub fn vcpkg_binary(&self) -> PathBuf {
        let exe = if cfg!(windows) { "vcpkg.exe" } else { "vcpkg" };
        self.root.join(exe)
    }

    /// Commit the checkout is at, when it is a git clone.
    pub fn baseline(&self) -> Option<String> {
        detect_baseline(&self.root)
    }
}

/// Detect baseline from vcpkg's .git directory.
fn detect_baseline(root: &Path) -> Option<String> {
    let git_dir = root.join(".git");
    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();
    if let Some(ref_path) = head.strip_prefix("ref: ") {
        return fs::read_to_string(git_dir.join(ref_path))
            .ok()
            .map(|commit| commit.trim().to_string());
    }
    if head.len() == 40 && head.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(head.to_string());
    }
    None
}

/// Validate that a directory looks like a vcpkg checkout.
pub fn is_valid_vcpkg_root(path: &Path) -> bool {
    // Created by vcpkg bootstrap
    if path.join(".vcpkg-root").exists() {
        return true;
    }
    path.join(VCPKG_TOOLCHAIN_FILE).is_file()
}
