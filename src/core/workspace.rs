//! Workspace - the project root and its output layout.

use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;

use crate::core::manifest::{Manifest, MANIFEST_NAME};
use crate::util::diagnostic::suggestions;

/// Errors locating the project manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `{}` in `{}` or any parent directory\n{}", MANIFEST_NAME, dir.display(), suggestions::NO_MANIFEST)]
    NotFound { dir: PathBuf },
}

/// Search `start` and its ancestors for Drydock.toml.
pub fn find_manifest(start: &Path) -> Result<PathBuf, ManifestError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ManifestError::NotFound {
                dir: start.to_path_buf(),
            });
        }
    }
}

/// A loaded project.
#[derive(Debug)]
pub struct Workspace {
    manifest: Manifest,
    manifest_path: PathBuf,
}

impl Workspace {
    /// Create a workspace from a manifest path.
    pub fn new(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        Ok(Workspace {
            manifest,
            manifest_path: manifest_path.to_path_buf(),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.manifest.manifest_dir
    }

    pub fn name(&self) -> &str {
        self.manifest.name()
    }

    pub fn source_dir(&self) -> PathBuf {
        self.manifest.source_dir()
    }

    /// `<build-dir>/drydock`
    pub fn output_root(&self) -> PathBuf {
        self.manifest.build_dir().join("drydock")
    }

    /// Per-variant output directory. Variants never share one.
    pub fn variant_dir(&self, variant: &str) -> PathBuf {
        self.output_root().join(variant)
    }
}
