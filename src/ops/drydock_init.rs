//! Implementation of `drydock init`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::manifest::{generate_default_manifest, MANIFEST_NAME};
use crate::util::fs::ensure_dir;

/// Options for `drydock init`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Project name (defaults to the directory name)
    pub name: Option<String>,

    /// Application id (defaults to `com.example.<name>`)
    pub application_id: Option<String>,
}

/// Write a starter Drydock.toml into `path`.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<PathBuf> {
    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists", manifest_path.display());
    }

    let name = match &opts.name {
        Some(name) => name.clone(),
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .unwrap_or_else(|| "app".to_string()),
    };
    let application_id = opts.application_id.clone().unwrap_or_else(|| {
        let ident: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("com.example.{}", ident)
    });

    ensure_dir(path)?;
    std::fs::write(&manifest_path, generate_default_manifest(&name, &application_id))?;
    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Manifest;
    use tempfile::TempDir;

    #[test]
    fn test_init_project() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("quest-game");
        let opts = InitOptions {
            name: None,
            application_id: None,
        };

        let path = init_project(&dir, &opts).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.name(), "quest-game");
        assert!(manifest
            .defaults
            .iter()
            .any(|(k, v)| k == "application_id" && v.render() == "com.example.quest_game"));

        assert!(init_project(&dir, &opts).is_err());
    }
}
