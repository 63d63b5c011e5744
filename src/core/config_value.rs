//! Configuration values and the source set they are resolved from.
//!
//! Every setting that reaches the variant resolver is a [`ConfigValue`]
//! tagged with where it came from. The source set keeps all of them; picking
//! the effective one is a lookup over provenance tiers, highest first:
//!
//! ```text
//! property  >  environment  >  revision-override  >  default
//! ```
//!
//! Inside one tier a value scoped to the requested variant beats an unscoped
//! one, and a later value beats an earlier one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::core::revision::RevisionStore;

/// Environment variables with a fixed setting name.
///
/// Listed lowest priority first: when both NDK variables are set,
/// `ANDROID_NDK_HOME` wins.
pub const ENV_ALIASES: &[(&str, &str)] = &[
    ("ANDROID_NDK_ROOT", "ndk_root"),
    ("ANDROID_NDK_HOME", "ndk_root"),
    ("VCPKG_ROOT", "vcpkg_root"),
    ("VCPKG_DEFAULT_TRIPLET", "triplet"),
];

/// Prefix for generic environment settings (`DRYDOCK_MIN_SDK` -> `min_sdk`).
pub const ENV_PREFIX: &str = "DRYDOCK_";

/// Where a configuration value came from.
///
/// The derived ordering is lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Default,
    RevisionOverride,
    Environment,
    Property,
}

impl Provenance {
    /// Tiers in lookup order, highest precedence first.
    pub const PRECEDENCE: [Provenance; 4] = [
        Provenance::Property,
        Provenance::Environment,
        Provenance::RevisionOverride,
        Provenance::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Default => "default",
            Provenance::RevisionOverride => "revision-override",
            Provenance::Environment => "environment",
            Provenance::Property => "property",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw payload of a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl ConfigPayload {
    /// Render the payload as the string a property would carry.
    pub fn render(&self) -> String {
        match self {
            ConfigPayload::Str(s) => s.clone(),
            ConfigPayload::Int(n) => n.to_string(),
            ConfigPayload::Bool(b) => b.to_string(),
        }
    }

    /// Interpret the payload as a boolean flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigPayload::Bool(b) => Some(*b),
            ConfigPayload::Int(n) => Some(*n != 0),
            ConfigPayload::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
        }
    }

    /// Convert a TOML value into a payload. Arrays become comma lists.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::String(s) => Some(ConfigPayload::Str(s.clone())),
            toml::Value::Integer(n) => Some(ConfigPayload::Int(*n)),
            toml::Value::Boolean(b) => Some(ConfigPayload::Bool(*b)),
            toml::Value::Array(items) => {
                let parts: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(String::from))
                    .collect();
                parts.map(|p| ConfigPayload::Str(p.join(",")))
            }
            _ => None,
        }
    }
}

impl From<&str> for ConfigPayload {
    fn from(s: &str) -> Self {
        ConfigPayload::Str(s.to_string())
    }
}

impl From<String> for ConfigPayload {
    fn from(s: String) -> Self {
        ConfigPayload::Str(s)
    }
}

impl From<i64> for ConfigPayload {
    fn from(n: i64) -> Self {
        ConfigPayload::Int(n)
    }
}

impl From<bool> for ConfigPayload {
    fn from(b: bool) -> Self {
        ConfigPayload::Bool(b)
    }
}

/// A named setting with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
    pub key: String,
    pub provenance: Provenance,
    pub payload: ConfigPayload,
    /// Restrict this value to one variant
    pub variant: Option<String>,
    /// Human-readable origin (env var name, file section)
    pub origin: Option<String>,
}

impl ConfigValue {
    pub fn new(
        key: impl Into<String>,
        provenance: Provenance,
        payload: impl Into<ConfigPayload>,
    ) -> Self {
        ConfigValue {
            key: key.into(),
            provenance,
            payload: payload.into(),
            variant: None,
            origin: None,
        }
    }

    pub fn default_value(key: impl Into<String>, payload: impl Into<ConfigPayload>) -> Self {
        ConfigValue::new(key, Provenance::Default, payload)
    }

    pub fn property(key: impl Into<String>, payload: impl Into<ConfigPayload>) -> Self {
        ConfigValue::new(key, Provenance::Property, payload)
    }

    pub fn environment(key: impl Into<String>, payload: impl Into<ConfigPayload>) -> Self {
        ConfigValue::new(key, Provenance::Environment, payload)
    }

    /// Scope this value to a single variant.
    pub fn for_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    fn applies_to(&self, variant: &str) -> bool {
        self.variant.as_deref().map_or(true, |v| v == variant)
    }

    /// Describe where the value came from.
    pub fn describe_origin(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{} ({})", self.provenance, origin),
            None => self.provenance.to_string(),
        }
    }
}

/// All configuration values visible to one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct ConfigSourceSet {
    values: Vec<ConfigValue>,
}

impl ConfigSourceSet {
    pub fn new() -> Self {
        ConfigSourceSet::default()
    }

    pub fn push(&mut self, value: ConfigValue) {
        self.values.push(value);
    }

    pub fn with(mut self, value: ConfigValue) -> Self {
        self.push(value);
        self
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = ConfigValue>) {
        self.values.extend(values);
    }

    pub fn values(&self) -> &[ConfigValue] {
        &self.values
    }

    /// Add unscoped defaults.
    pub fn add_defaults<K, P>(&mut self, defaults: impl IntoIterator<Item = (K, P)>, origin: &str)
    where
        K: Into<String>,
        P: Into<ConfigPayload>,
    {
        for (key, payload) in defaults {
            self.push(ConfigValue::default_value(key, payload).with_origin(origin));
        }
    }

    /// Add the active revision layer, if any.
    pub fn add_revisions(&mut self, store: &RevisionStore) {
        self.extend(store.active_values());
    }

    /// Add settings from environment variables.
    ///
    /// Only the aliases in [`ENV_ALIASES`] and variables starting with
    /// [`ENV_PREFIX`] are considered; everything else is ignored.
    pub fn add_environment<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (var, key) in ENV_ALIASES {
            if let Some(value) = vars.get(*var) {
                if !value.is_empty() {
                    self.push(ConfigValue::environment(*key, value.as_str()).with_origin(*var));
                }
            }
        }

        for (var, value) in &vars {
            if let Some(key) = env_setting_name(var) {
                self.push(ConfigValue::environment(key, value.as_str()).with_origin(var.as_str()));
            }
        }
    }

    /// Add a `key=value` property from the command line.
    pub fn add_property_arg(&mut self, arg: &str) -> Result<()> {
        let (key, value) = parse_property(arg)?;
        self.push(ConfigValue::property(key, value).with_origin("-P"));
        Ok(())
    }

    /// Add properties from a `key=value` file (`#`/`!` comments).
    pub fn add_properties_file(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read properties file: {}", path.display()))?;

        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = parse_property(line)
                .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
            self.push(
                ConfigValue::property(key, value)
                    .with_origin(path.display().to_string()),
            );
        }
        Ok(())
    }

    /// Find the effective value of `key` for `variant`.
    pub fn lookup(&self, key: &str, variant: &str) -> Option<&ConfigValue> {
        for tier in Provenance::PRECEDENCE {
            let mut scoped = None;
            let mut unscoped = None;
            for value in &self.values {
                if value.key != key || value.provenance != tier || !value.applies_to(variant) {
                    continue;
                }
                if value.variant.is_some() {
                    scoped = Some(value);
                } else {
                    unscoped = Some(value);
                }
            }
            if let Some(found) = scoped.or(unscoped) {
                return Some(found);
            }
        }
        None
    }

    /// Like [`lookup`](Self::lookup), but only consults one provenance tier.
    pub fn lookup_in(&self, key: &str, variant: &str, tier: Provenance) -> Option<&ConfigValue> {
        self.values
            .iter()
            .filter(|v| v.key == key && v.provenance == tier && v.applies_to(variant))
            .fold(None, |best: Option<&ConfigValue>, v| match best {
                Some(b) if b.variant.is_some() && v.variant.is_none() => Some(b),
                _ => Some(v),
            })
    }
}

/// Split `key=value`. Keys are trimmed; values keep inner whitespace.
pub fn parse_property(arg: &str) -> Result<(String, String)> {
    let Some((key, value)) = arg.split_once('=') else {
        bail!("invalid property `{}`; expected key=value", arg);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid property `{}`; key is empty", arg);
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// `DRYDOCK_SIGNING__KEY_ALIAS` -> `signing.key_alias`.
fn env_setting_name(var: &str) -> Option<String> {
    let rest = var.strip_prefix(ENV_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase().replace("__", "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_property_beats_environment_and_default() {
        let sources = ConfigSourceSet::new()
            .with(ConfigValue::default_value("min_sdk", 32i64))
            .with(ConfigValue::environment("min_sdk", "29"))
            .with(ConfigValue::property("min_sdk", "33"));

        let value = sources.lookup("min_sdk", "release").unwrap();
        assert_eq!(value.provenance, Provenance::Property);
        assert_eq!(value.payload.render(), "33");
    }

    #[test]
    fn test_environment_beats_revision_override() {
        let sources = ConfigSourceSet::new()
            .with(ConfigValue::new("ndk_version", Provenance::RevisionOverride, "27.0.1"))
            .with(ConfigValue::environment("ndk_version", "28.0.1"));

        assert_eq!(
            sources.lookup("ndk_version", "debug").unwrap().payload.render(),
            "28.0.1"
        );
    }

    #[test]
    fn test_variant_scoped_value_wins_within_tier() {
        let sources = ConfigSourceSet::new()
            .with(ConfigValue::default_value("version_name", "1.0-release").for_variant("release"))
            .with(ConfigValue::default_value("version_name", "1.0"));

        assert_eq!(
            sources.lookup("version_name", "release").unwrap().payload.render(),
            "1.0-release"
        );
        assert_eq!(
            sources.lookup("version_name", "debug").unwrap().payload.render(),
            "1.0"
        );
    }

    #[test]
    fn test_later_value_wins_within_tier() {
        let mut sources = ConfigSourceSet::new();
        sources.add_defaults([("stl", "c++_shared")], "built-in");
        sources.add_defaults([("stl", "c++_static")], "Drydock.toml [defaults]");

        let value = sources.lookup("stl", "debug").unwrap();
        assert_eq!(value.payload.render(), "c++_static");
        assert_eq!(value.origin.as_deref(), Some("Drydock.toml [defaults]"));
    }

    #[test]
    fn test_add_environment_maps_aliases_and_prefix() {
        let mut sources = ConfigSourceSet::new();
        sources.add_environment([
            ("ANDROID_NDK_ROOT", "/opt/ndk-old"),
            ("ANDROID_NDK_HOME", "/opt/ndk"),
            ("DRYDOCK_MIN_SDK", "30"),
            ("DRYDOCK_SIGNING__KEY_ALIAS", "upload"),
            ("HOME", "/home/me"),
        ]);

        assert_eq!(sources.lookup("ndk_root", "debug").unwrap().payload.render(), "/opt/ndk");
        assert_eq!(sources.lookup("min_sdk", "debug").unwrap().payload.render(), "30");
        assert_eq!(
            sources.lookup("signing.key_alias", "debug").unwrap().payload.render(),
            "upload"
        );
        assert!(sources.lookup("home", "debug").is_none());
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("version_code=7").unwrap(),
            ("version_code".to_string(), "7".to_string())
        );
        assert_eq!(
            parse_property("signing.store_password=a=b").unwrap().1,
            "a=b"
        );
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }

    #[test]
    fn test_add_properties_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keystore.properties");
        std::fs::write(
            &path,
            "# release keys\nsigning.key_alias=upload\n\nsigning.key_password = pw\n",
        )
        .unwrap();

        let mut sources = ConfigSourceSet::new();
        sources.add_properties_file(&path).unwrap();

        let alias = sources.lookup("signing.key_alias", "release").unwrap();
        assert_eq!(alias.provenance, Provenance::Property);
        assert_eq!(alias.payload.render(), "upload");
        assert_eq!(
            sources.lookup("signing.key_password", "release").unwrap().payload.render(),
            "pw"
        );
    }

    #[test]
    fn test_lookup_in_single_tier() {
        let sources = ConfigSourceSet::new()
            .with(ConfigValue::environment("signing.key_alias", "from-env"))
            .with(ConfigValue::property("signing.key_password", "pw"));

        assert!(sources
            .lookup_in("signing.key_alias", "release", Provenance::Property)
            .is_none());
        assert!(sources
            .lookup_in("signing.key_password", "release", Provenance::Property)
            .is_some());
    }

    #[test]
    fn test_payload_as_bool() {
        assert_eq!(ConfigPayload::from("false").as_bool(), Some(false));
        assert_eq!(ConfigPayload::from("YES").as_bool(), Some(true));
        assert_eq!(ConfigPayload::from(true).as_bool(), Some(true));
        assert_eq!(ConfigPayload::from("maybe").as_bool(), None);
    }
}
