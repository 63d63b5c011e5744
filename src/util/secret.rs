//! Secret values that must never reach logs or stored diagnostics.

use std::fmt;

/// Placeholder written wherever a secret would otherwise appear.
pub const REDACTED: &str = "****";

/// A credential value.
///
/// `Debug` and `Display` never print the value; use [`Secret::expose`] at the
/// single point where it is handed to an external process.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// The raw value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Replace every occurrence of any non-empty secret in `text`.
pub fn redact(text: &str, secrets: &[Secret]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if !secret.is_empty() {
            out = out.replace(secret.expose(), REDACTED);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_formatting_hides_value() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{}", secret), REDACTED);
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_redact_replaces_all_occurrences() {
        let secrets = vec![Secret::new("s3cr3t"), Secret::new("")];
        let text = "pass=s3cr3t again s3cr3t";
        assert_eq!(redact(text, &secrets), "pass=**** again ****");
    }
}
