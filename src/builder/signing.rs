//! Signing identity selection.
//!
//! Debug builds use the well-known debug keystore. Release builds need all
//! four credentials passed as properties and an existing keystore; they
//! never fall back to the debug identity.

use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::core::config_value::{ConfigSourceSet, Provenance};
use crate::core::variant::BuildType;
use crate::resolver::keys;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::secret::Secret;

pub const DEBUG_KEY_ALIAS: &str = "androiddebugkey";
pub const DEBUG_PASSWORD: &str = "android";

/// `~/.android/debug.keystore`
pub fn default_debug_keystore() -> PathBuf {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_default()
        .join(".android")
        .join("debug.keystore")
}

/// Credentials used to sign the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningIdentity {
    kind: BuildType,
    keystore: PathBuf,
    alias: String,
    #[serde(skip)]
    store_password: Secret,
    #[serde(skip)]
    key_password: Secret,
}

impl SigningIdentity {
    /// The fixed debug identity.
    pub fn debug(keystore: impl Into<PathBuf>) -> Self {
        SigningIdentity {
            kind: BuildType::Debug,
            keystore: keystore.into(),
            alias: DEBUG_KEY_ALIAS.to_string(),
            store_password: Secret::new(DEBUG_PASSWORD),
            key_password: Secret::new(DEBUG_PASSWORD),
        }
    }

    pub fn kind(&self) -> BuildType {
        self.kind
    }

    pub fn is_debug(&self) -> bool {
        self.kind == BuildType::Debug
    }

    pub fn keystore(&self) -> &Path {
        &self.keystore
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn store_password(&self) -> &Secret {
        &self.store_password
    }

    pub fn key_password(&self) -> &Secret {
        &self.key_password
    }

    /// Values to scrub from any captured output.
    pub fn secrets(&self) -> Vec<Secret> {
        vec![self.store_password.clone(), self.key_password.clone()]
    }
}

/// Release signing could not be set up.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
#[error("{}", self.summary())]
#[diagnostic(
    code(drydock::signing::incomplete),
    help("Pass the credentials with -P signing.<field>=<value> or --properties-file")
)]
pub struct SigningError {
    /// Absent or empty credential properties
    pub missing: Vec<String>,
    /// Keystore path that does not exist
    pub keystore_not_found: Option<PathBuf>,
}

impl SigningError {
    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing {}", self.missing.join(", ")));
        }
        if let Some(path) = &self.keystore_not_found {
            parts.push(format!("keystore not found: {}", path.display()));
        }
        format!("release signing identity is incomplete; {}", parts.join("; "))
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error("release signing identity is incomplete");
        for key in &self.missing {
            diag = diag.with_context(format!("missing `{}`", key));
        }
        if let Some(path) = &self.keystore_not_found {
            diag = diag.with_context(format!("keystore not found: {}", path.display()));
        }
        diag.with_suggestion(suggestions::RELEASE_SIGNING)
    }
}

/// Selects the signing identity for a build type.
#[derive(Debug, Clone)]
pub struct SigningResolver {
    project_root: PathBuf,
    debug_keystore: PathBuf,
}

impl SigningResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        SigningResolver {
            project_root: project_root.into(),
            debug_keystore: default_debug_keystore(),
        }
    }

    pub fn with_debug_keystore(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_keystore = path.into();
        self
    }

    pub fn resolve(
        &self,
        build_type: BuildType,
        sources: &ConfigSourceSet,
        variant: &str,
    ) -> Result<SigningIdentity, SigningError> {
        if build_type == BuildType::Debug {
            return Ok(SigningIdentity::debug(&self.debug_keystore));
        }

        let mut missing = Vec::new();
        let mut field = |key: &str| {
            let value = sources
                .lookup_in(key, variant, Provenance::Property)
                .map(|v| v.payload.render())
                .filter(|s| !s.trim().is_empty());
            if value.is_none() {
                missing.push(key.to_string());
            }
            value
        };

        let store_file = field(keys::SIGNING_STORE_FILE);
        let store_password = field(keys::SIGNING_STORE_PASSWORD);
        let alias = field(keys::SIGNING_KEY_ALIAS);
        let key_password = field(keys::SIGNING_KEY_PASSWORD);

        let keystore = store_file.map(|f| self.project_root.join(f.trim()));
        let keystore_not_found = keystore.as_ref().filter(|p| !p.is_file()).cloned();

        match (keystore, store_password, alias, key_password) {
            (Some(keystore), Some(store_password), Some(alias), Some(key_password))
                if keystore_not_found.is_none() =>
            {
                tracing::debug!("release signing with `{}` from {}", alias, keystore.display());
                Ok(SigningIdentity {
                    kind: BuildType::Release,
                    keystore,
                    alias,
                    store_password: Secret::new(store_password),
                    key_password: Secret::new(key_password),
                })
            }
            _ => Err(SigningError {
                missing,
                keystore_not_found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config_value::ConfigValue;
    use tempfile::TempDir;

    fn release_sources(store_file: &str) -> ConfigSourceSet {
        ConfigSourceSet::new()
            .with(ConfigValue::property(keys::SIGNING_STORE_FILE, store_file))
            .with(ConfigValue::property(keys::SIGNING_STORE_PASSWORD, "store-pw"))
            .with(ConfigValue::property(keys::SIGNING_KEY_ALIAS, "upload"))
            .with(ConfigValue::property(keys::SIGNING_KEY_PASSWORD, "key-pw"))
    }

    #[test]
    fn test_debug_identity() {
        let resolver = SigningResolver::new("/proj").with_debug_keystore("/home/me/.android/debug.keystore");
        let id = resolver
            .resolve(BuildType::Debug, &ConfigSourceSet::new(), "debug")
            .unwrap();
        assert!(id.is_debug());
        assert_eq!(id.alias(), DEBUG_KEY_ALIAS);
        assert_eq!(id.store_password().expose(), "android");
        assert!(default_debug_keystore().ends_with(".android/debug.keystore"));
    }

    #[test]
    fn test_release_identity_complete() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("release.jks"), b"jks").unwrap();

        let id = SigningResolver::new(tmp.path())
            .resolve(BuildType::Release, &release_sources("release.jks"), "release")
            .unwrap();
        assert!(!id.is_debug());
        assert_eq!(id.kind(), BuildType::Release);
        assert_eq!(id.keystore(), tmp.path().join("release.jks"));
        assert_eq!(id.alias(), "upload");
        assert_eq!(id.key_password().expose(), "key-pw");
    }

    #[test]
    fn test_release_each_missing_field_is_named() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("release.jks"), b"jks").unwrap();

        for key in [
            keys::SIGNING_STORE_FILE,
            keys::SIGNING_STORE_PASSWORD,
            keys::SIGNING_KEY_ALIAS,
            keys::SIGNING_KEY_PASSWORD,
        ] {
            let mut sources = ConfigSourceSet::new();
            for value in release_sources("release.jks").values() {
                if value.key != key {
                    sources.push(value.clone());
                }
            }
            let err = SigningResolver::new(tmp.path())
                .resolve(BuildType::Release, &sources, "release")
                .unwrap_err();
            assert_eq!(err.missing, vec![key.to_string()]);
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_release_empty_field_counts_as_missing() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("release.jks"), b"jks").unwrap();
        let sources = release_sources("release.jks")
            .with(ConfigValue::property(keys::SIGNING_KEY_PASSWORD, ""));

        let err = SigningResolver::new(tmp.path())
            .resolve(BuildType::Release, &sources, "release")
            .unwrap_err();
        assert_eq!(err.missing, vec![keys::SIGNING_KEY_PASSWORD.to_string()]);
    }

    #[test]
    fn test_release_missing_keystore() {
        let tmp = TempDir::new().unwrap();
        let err = SigningResolver::new(tmp.path())
            .resolve(BuildType::Release, &release_sources("nope.jks"), "release")
            .unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.keystore_not_found, Some(tmp.path().join("nope.jks")));
    }

    #[test]
    fn test_release_ignores_non_property_credentials() {
        let tmp = TempDir::new().unwrap();
        let sources = ConfigSourceSet::new()
            .with(ConfigValue::default_value(keys::SIGNING_KEY_ALIAS, "from-manifest"));
        let err = SigningResolver::new(tmp.path())
            .resolve(BuildType::Release, &sources, "release")
            .unwrap_err();
        assert_eq!(err.missing.len(), 4);
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("release.jks"), b"jks").unwrap();
        let id = SigningResolver::new(tmp.path())
            .resolve(BuildType::Release, &release_sources("release.jks"), "release")
            .unwrap();
        let debug = format!("{:?}", id);
        assert!(!debug.contains("store-pw"));
        assert!(!debug.contains("key-pw"));
    }
}
