//! Tool configuration for drydock itself.
//!
//! Drydock supports two configuration file locations:
//! - Global: `~/.drydock/config.toml` - User-wide defaults
//! - Project: `.drydock/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. These files hold
//! knobs for the orchestrator (stage timeouts, capture limits); build
//! settings live in `Drydock.toml` and flow through the config source set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::stage::PipelineStage;
use crate::util::process::DEFAULT_CAPTURE_LIMIT;

/// Default per-stage timeouts in seconds.
const DEFAULT_COMPILE_SECS: u64 = 60 * 60;
const DEFAULT_PACKAGE_SECS: u64 = 10 * 60;
const DEFAULT_SIGN_SECS: u64 = 5 * 60;
const DEFAULT_DEPLOY_SECS: u64 = 30 * 60;

/// Drydock configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-stage timeouts
    pub timeouts: TimeoutConfig,

    /// Captured output settings
    pub output: OutputConfig,
}

/// Per-stage timeouts, in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub compile: Option<u64>,
    pub package: Option<u64>,
    pub sign: Option<u64>,
    pub deploy: Option<u64>,
}

/// Captured output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Bytes of tool output kept per process (tail)
    pub capture_limit: Option<usize>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.timeouts.compile.is_some() {
            self.timeouts.compile = other.timeouts.compile;
        }
        if other.timeouts.package.is_some() {
            self.timeouts.package = other.timeouts.package;
        }
        if other.timeouts.sign.is_some() {
            self.timeouts.sign = other.timeouts.sign;
        }
        if other.timeouts.deploy.is_some() {
            self.timeouts.deploy = other.timeouts.deploy;
        }
        if other.output.capture_limit.is_some() {
            self.output.capture_limit = other.output.capture_limit;
        }
    }

    /// Effective timeout for a stage. `Resolve` runs in-process and has none.
    pub fn stage_timeout(&self, stage: PipelineStage) -> Option<Duration> {
        let secs = match stage {
            PipelineStage::Resolve => return None,
            PipelineStage::Compile => self.timeouts.compile.unwrap_or(DEFAULT_COMPILE_SECS),
            PipelineStage::Package => self.timeouts.package.unwrap_or(DEFAULT_PACKAGE_SECS),
            PipelineStage::Sign => self.timeouts.sign.unwrap_or(DEFAULT_SIGN_SECS),
            PipelineStage::Deploy => self.timeouts.deploy.unwrap_or(DEFAULT_DEPLOY_SECS),
        };
        Some(Duration::from_secs(secs))
    }

    /// Override every stage timeout.
    pub fn with_uniform_timeout(mut self, secs: u64) -> Self {
        self.timeouts = TimeoutConfig {
            compile: Some(secs),
            package: Some(secs),
            sign: Some(secs),
            deploy: Some(secs),
        };
        self
    }

    /// Effective capture limit.
    pub fn capture_limit(&self) -> usize {
        self.output.capture_limit.unwrap_or(DEFAULT_CAPTURE_LIMIT)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.drydock/config.toml)
/// 2. Global config (~/.drydock/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    if project_path.exists() {
        let project = Config::load_or_default(project_path);
        config.merge(project);
    }

    config
}

/// Get the global drydock config directory (~/.drydock).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".drydock"))
}

/// Get the project config path (.drydock/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".drydock").join("config.toml")
}
