//! Global context for drydock operations.
//!
//! Provides centralized access to the working directory, the tool
//! configuration locations and a snapshot of the process environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::workspace::{find_manifest as ws_find_manifest, ManifestError};
use crate::util::config::{load_config, project_config_path, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global drydock data (~/.drydock/)
    home: PathBuf,

    /// Environment variables visible to configuration resolution
    env: Vec<(String, String)>,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext from the current process.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = directories::BaseDirs::new()
            .map(|b| b.home_dir().join(".drydock"))
            .unwrap_or_else(|| PathBuf::from(".drydock"));

        Ok(GlobalContext {
            cwd,
            home,
            env: std::env::vars().collect(),
            verbose: false,
            color: true,
        })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Replace the environment snapshot.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Use a different global data directory.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        self.home = home;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the drydock home directory (~/.drydock/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Tool configuration for a project: global, then project overrides.
    pub fn config_for(&self, project_root: &Path) -> Config {
        load_config(&self.config_path(), &project_config_path(project_root))
    }

    /// Find Drydock.toml starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        ws_find_manifest(&self.cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let ctx = GlobalContext::with_cwd(PathBuf::from("/tmp/project"))
            .unwrap()
            .with_home(PathBuf::from("/home/me/.drydock"));
        assert_eq!(ctx.cwd(), Path::new("/tmp/project"));
        assert_eq!(ctx.config_path(), PathBuf::from("/home/me/.drydock/config.toml"));
    }

    #[test]
    fn test_config_project_wins() {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&home).unwrap();
        std::fs::create_dir_all(project.join(".drydock")).unwrap();
        std::fs::write(home.join("config.toml"), "[timeouts]\ncompile = 10\nsign = 20\n").unwrap();
        std::fs::write(project.join(".drydock/config.toml"), "[timeouts]\ncompile = 99\n").unwrap();

        let ctx = GlobalContext::with_cwd(project.clone()).unwrap().with_home(home);
        let config = ctx.config_for(&project);
        assert_eq!(config.timeouts.compile, Some(99));
        assert_eq!(config.timeouts.sign, Some(20));
    }

    #[test]
    fn test_env_snapshot() {
        let ctx = GlobalContext::new()
            .unwrap()
            .with_env([("ANDROID_NDK_HOME", "/opt/ndk")]);
        assert_eq!(
            ctx.env_vars(),
            &[("ANDROID_NDK_HOME".to_string(), "/opt/ndk".to_string())]
        );
    }
}
