//! User-friendly diagnostic messages.
//!
//! Every configuration problem is reported with what is wrong, where the
//! value was expected to come from, and how to supply it.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no manifest file is found.
    pub const NO_MANIFEST: &str = "help: Create a Drydock.toml at the project root";

    /// Suggestion when the NDK cannot be located.
    pub const NDK_ROOT: &str = "Set ANDROID_NDK_HOME to the NDK installation directory";

    /// Suggestion when vcpkg cannot be located.
    pub const VCPKG_ROOT: &str =
        "Set VCPKG_ROOT to a bootstrapped vcpkg checkout, or pass -P vcpkg=false";

    /// Suggestion for missing release credentials.
    pub const RELEASE_SIGNING: &str =
        "Pass the credentials with -P signing.<field>=<value> or --properties-file";

    /// Suggestion when a stage fails.
    pub const STAGE_FAILED: &str = "help: Run with --verbose to see every command line";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
            Severity::Help => write!(f, "help"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Warning,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
                Severity::Help => "\x1b[1;32mhelp\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
                Severity::Help => "help",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("release signing identity is incomplete")
            .with_context("missing `signing.key_alias`")
            .with_context("missing `signing.key_password`")
            .with_suggestion(suggestions::RELEASE_SIGNING);

        let output = diag.format(false);
        assert!(output.contains("error: release signing identity is incomplete"));
        assert!(output.contains("-> missing `signing.key_alias`"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Pass the credentials"));
    }

    #[test]
    fn test_warning_formatting() {
        let diag = Diagnostic::warning("unparsable version code")
            .with_context("`version_code = \"12a\"` in Drydock.toml");
        let output = diag.format(false);
        assert!(output.starts_with("warning: unparsable version code"));
        assert!(output.contains("-> `version_code"));
        assert!(!output.contains("consider:"));
    }
}
