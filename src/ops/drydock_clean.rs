//! Implementation of `drydock clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::workspace::Workspace;
use crate::resolver::validate_variant_name;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the outputs of one variant, or of every variant.
///
/// Returns the directory that was removed, if it existed.
pub fn clean(ws: &Workspace, variant: Option<&str>) -> Result<Option<PathBuf>> {
    let dir = match variant {
        Some(v) => {
            validate_variant_name(v)?;
            ws.variant_dir(v)
        }
        None => ws.output_root(),
    };
    if !dir.exists() {
        return Ok(None);
    }
    tracing::info!("removing {}", dir.display());
    remove_dir_all_if_exists(&dir)?;
    Ok(Some(dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(tmp: &TempDir) -> Workspace {
        let manifest = tmp.path().join("Drydock.toml");
        std::fs::write(&manifest, "[project]\nname = \"game\"\n").unwrap();
        Workspace::new(&manifest).unwrap()
    }

    #[test]
    fn test_clean_single_variant() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        std::fs::create_dir_all(ws.variant_dir("debug").join("outputs")).unwrap();
        std::fs::create_dir_all(ws.variant_dir("release")).unwrap();

        let removed = clean(&ws, Some("debug")).unwrap();
        assert_eq!(removed, Some(ws.variant_dir("debug")));
        assert!(!ws.variant_dir("debug").exists());
        assert!(ws.variant_dir("release").exists());
    }

    #[test]
    fn test_clean_refuses_variant_outside_output_root() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        std::fs::create_dir_all(ws.variant_dir("debug")).unwrap();

        for name in ["../..", "..", "debug/../.."] {
            let err = clean(&ws, Some(name)).unwrap_err();
            assert!(err.downcast_ref::<crate::resolver::ConfigError>().is_some());
        }
        assert!(tmp.path().join("Drydock.toml").exists());
        assert!(ws.variant_dir("debug").exists());
    }

    #[test]
    fn test_clean_all_and_nothing_left() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        std::fs::create_dir_all(ws.variant_dir("debug")).unwrap();

        assert!(clean(&ws, None).unwrap().is_some());
        assert!(!ws.output_root().exists());
        assert_eq!(clean(&ws, None).unwrap(), None);
    }
}
