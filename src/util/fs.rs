//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Prefix of the temporary files drydock creates next to their destination.
pub const TEMP_PREFIX: &str = ".drydock-tmp-";

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file, if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read file: {}", path.display()))
}

/// Create an empty temporary file in the same directory as `dest`.
///
/// Renaming it onto `dest` afterwards is atomic because both live on the
/// same filesystem. The file is deleted on drop unless persisted.
pub fn temp_file_beside(dest: &Path) -> Result<NamedTempFile> {
    let dir = dest.parent().unwrap_or(Path::new("."));
    ensure_dir(dir)?;
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))
}

/// Atomically replace `dest` with `temp`.
pub fn persist(temp: NamedTempFile, dest: &Path) -> Result<()> {
    temp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to move artifact into place: {}", dest.display()))?;
    Ok(())
}

/// Write a string to a file atomically, creating parent directories if needed.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut temp = temp_file_beside(path)?;
    temp.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    persist(temp, path)
}

/// List leftover temporary files in a directory.
pub fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(TEMP_PREFIX))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default()
}
