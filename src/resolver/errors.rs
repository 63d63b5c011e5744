//! Variant resolution error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// A setting whose effective value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSetting {
    pub key: String,
    pub value: String,
    pub reason: String,
    /// Where the offending value came from
    pub origin: String,
}

/// Every problem found while resolving one variant.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
#[error("{}", self.summary())]
#[diagnostic(
    code(drydock::config::unresolved),
    help("Set missing values in Drydock.toml [defaults], or pass -P <key>=<value>")
)]
pub struct ConfigError {
    pub variant: String,
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidSetting>,
}

impl ConfigError {
    pub fn new(variant: impl Into<String>) -> Self {
        ConfigError {
            variant: variant.into(),
            missing: Vec::new(),
            invalid: Vec::new(),
        }
    }

    pub fn missing(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.missing.contains(&key) {
            self.missing.push(key);
        }
    }

    pub fn invalid(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
        origin: impl Into<String>,
    ) {
        self.invalid.push(InvalidSetting {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
            origin: origin.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// Every setting named by this error, missing first.
    pub fn keys(&self) -> Vec<&str> {
        self.missing
            .iter()
            .map(String::as_str)
            .chain(self.invalid.iter().map(|i| i.key.as_str()))
            .collect()
    }

    fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing settings: {}", self.missing.join(", ")));
        }
        for inv in &self.invalid {
            parts.push(format!(
                "invalid `{}` = `{}` from {}: {}",
                inv.key, inv.value, inv.origin, inv.reason
            ));
        }
        format!(
            "could not resolve variant `{}`; {}",
            self.variant,
            parts.join("; ")
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(format!("could not resolve variant `{}`", self.variant));
        for key in &self.missing {
            diag = diag.with_context(format!("missing `{}`", key));
        }
        for inv in &self.invalid {
            diag = diag.with_context(format!(
                "`{}` = `{}` ({}): {}",
                inv.key, inv.value, inv.origin, inv.reason
            ));
        }
        if self.missing.iter().any(|k| k.starts_with("signing.")) {
            diag = diag.with_suggestion(suggestions::RELEASE_SIGNING);
        }
        diag.with_suggestion("Set the value in Drydock.toml or pass -P <key>=<value>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_every_key() {
        let mut err = ConfigError::new("release");
        err.missing("application_id");
        err.missing("build_target");
        err.missing("application_id");
        err.invalid("min_sdk", "abc", "expected a positive integer", "property (-P)");

        assert_eq!(err.keys(), vec!["application_id", "build_target", "min_sdk"]);

        let msg = err.to_string();
        assert!(msg.contains("missing settings: application_id, build_target"));
        assert!(msg.contains("invalid `min_sdk` = `abc`"));
    }

    #[test]
    fn test_config_error_diagnostic() {
        let mut err = ConfigError::new("debug");
        err.missing("stl");

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("could not resolve variant `debug`"));
        assert!(output.contains("-> missing `stl`"));
        assert!(output.contains("help: consider:"));
    }
}
