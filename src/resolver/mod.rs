//! Variant resolution.
//!
//! Merges a [`ConfigSourceSet`] into one [`VariantSettings`] per requested
//! variant. Every required setting that has no value, and every value that
//! cannot be interpreted, is collected into a single [`ConfigError`] so the
//! user sees the whole list at once.

pub mod errors;

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::config_value::{ConfigPayload, ConfigSourceSet, ConfigValue};
use crate::core::variant::{BuildType, DeploySettings, ToolPrograms, VariantSettings};
use crate::util::diagnostic::Diagnostic;

pub use errors::{ConfigError, InvalidSetting};

/// Setting names.
pub mod keys {
    pub const APPLICATION_ID: &str = "application_id";
    pub const VERSION_CODE: &str = "version_code";
    pub const VERSION_NAME: &str = "version_name";
    pub const ABI_FILTERS: &str = "abi_filters";
    pub const STL: &str = "stl";
    pub const MIN_SDK: &str = "min_sdk";
    pub const TARGET_SDK: &str = "target_sdk";
    pub const COMPILE_SDK: &str = "compile_sdk";
    pub const BUILD_TARGET: &str = "build_target";
    pub const BUILD_TYPE: &str = "build_type";
    pub const NDK_ROOT: &str = "ndk_root";
    pub const NDK_VERSION: &str = "ndk_version";
    pub const VCPKG_ROOT: &str = "vcpkg_root";
    pub const VCPKG: &str = "vcpkg";
    pub const TRIPLET: &str = "triplet";

    pub const TOOL_CMAKE: &str = "tool.cmake";
    pub const TOOL_APKSIGNER: &str = "tool.apksigner";
    pub const TOOL_UPLOADER: &str = "tool.uploader";

    pub const SIGNING_STORE_FILE: &str = "signing.store_file";
    pub const SIGNING_STORE_PASSWORD: &str = "signing.store_password";
    pub const SIGNING_KEY_ALIAS: &str = "signing.key_alias";
    pub const SIGNING_KEY_PASSWORD: &str = "signing.key_password";

    pub const DEPLOY_APP_ID: &str = "deploy.app_id";
    pub const DEPLOY_APP_SECRET: &str = "deploy.app_secret";
    pub const DEPLOY_CHANNEL: &str = "deploy.channel";
    pub const DEPLOY_SUBCOMMAND: &str = "deploy.subcommand";

    /// Non-secret settings, in display order.
    pub const DISPLAYED: &[&str] = &[
        BUILD_TYPE,
        APPLICATION_ID,
        VERSION_CODE,
        VERSION_NAME,
        ABI_FILTERS,
        STL,
        MIN_SDK,
        TARGET_SDK,
        COMPILE_SDK,
        BUILD_TARGET,
        NDK_ROOT,
        NDK_VERSION,
        VCPKG_ROOT,
        VCPKG,
        TRIPLET,
        TOOL_CMAKE,
        TOOL_APKSIGNER,
        TOOL_UPLOADER,
        SIGNING_STORE_FILE,
        SIGNING_KEY_ALIAS,
        DEPLOY_APP_ID,
        DEPLOY_CHANNEL,
        DEPLOY_SUBCOMMAND,
    ];

    /// Settings whose values are never displayed.
    pub const SECRET: &[&str] = &[SIGNING_STORE_PASSWORD, SIGNING_KEY_PASSWORD, DEPLOY_APP_SECRET];
}

/// Highest versionCode the store accepts.
pub const MAX_VERSION_CODE: i64 = 2_100_000_000;

static APPLICATION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$")
        .expect("application id pattern is a valid regex")
});

static VARIANT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("variant name pattern is a valid regex")
});

/// Key under which a bad variant name is reported.
pub const VARIANT_NAME_KEY: &str = "variant";

/// Check that `name` can be used as a single directory component.
///
/// Variant names become directories under the output root, so anything
/// other than letters, digits, `_` and `-` is refused.
pub fn validate_variant_name(name: &str) -> Result<(), ConfigError> {
    if VARIANT_NAME_RE.is_match(name) {
        return Ok(());
    }
    let mut error = ConfigError::new(name);
    error.invalid(
        VARIANT_NAME_KEY,
        name,
        "variant names may only contain letters, digits, `_` and `-`",
        "the requested variant",
    );
    Err(error)
}

/// Built-in defaults, added before the project manifest.
pub fn builtin_defaults() -> Vec<(&'static str, ConfigPayload)> {
    vec![
        (keys::ABI_FILTERS, "arm64-v8a".into()),
        (keys::STL, "c++_shared".into()),
        (keys::NDK_VERSION, "29.0.13113456".into()),
        (keys::COMPILE_SDK, ConfigPayload::Int(35)),
        (keys::TARGET_SDK, ConfigPayload::Int(35)),
        (keys::MIN_SDK, ConfigPayload::Int(32)),
        (keys::VERSION_NAME, "1.0".into()),
        (keys::VCPKG, true.into()),
        (keys::TOOL_CMAKE, "cmake".into()),
        (keys::TOOL_APKSIGNER, "apksigner".into()),
        (keys::TOOL_UPLOADER, "ovr-platform-util".into()),
        (keys::DEPLOY_CHANNEL, "alpha".into()),
        (keys::DEPLOY_SUBCOMMAND, "upload-quest-build".into()),
    ]
}

/// Outcome of [`version_code_policy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCode {
    Parsed(u32),
    Absent,
    /// The raw value was not a usable code
    Fallback { raw: String },
}

impl VersionCode {
    pub const FALLBACK: u32 = 1;

    pub fn value(&self) -> u32 {
        match self {
            VersionCode::Parsed(code) => *code,
            VersionCode::Absent | VersionCode::Fallback { .. } => Self::FALLBACK,
        }
    }
}

/// Interpret a raw versionCode. Anything that is not a positive integer
/// within the store limit falls back to 1.
pub fn version_code_policy(raw: Option<&str>) -> VersionCode {
    let Some(raw) = raw else {
        return VersionCode::Absent;
    };
    match raw.trim().parse::<i64>() {
        Ok(code) if code > 0 && code <= MAX_VERSION_CODE => VersionCode::Parsed(code as u32),
        _ => VersionCode::Fallback {
            raw: raw.to_string(),
        },
    }
}

/// Resolved settings plus anything worth telling the user.
#[derive(Debug, Clone)]
pub struct VariantResolution {
    pub settings: VariantSettings,
    pub warnings: Vec<Diagnostic>,
}

/// Resolves variants against one source set.
pub struct VariantResolver<'a> {
    sources: &'a ConfigSourceSet,
}

impl<'a> VariantResolver<'a> {
    pub fn new(sources: &'a ConfigSourceSet) -> Self {
        VariantResolver { sources }
    }

    /// Resolve `variant` into concrete settings.
    pub fn resolve(&self, variant: &str) -> Result<VariantResolution, ConfigError> {
        validate_variant_name(variant)?;

        let mut cx = Cx {
            sources: self.sources,
            variant,
            error: ConfigError::new(variant),
        };
        let mut warnings = Vec::new();

        let build_type = cx.build_type();

        let application_id = cx.required_string(keys::APPLICATION_ID);
        if let Some(id) = &application_id {
            if !APPLICATION_ID_RE.is_match(id) {
                cx.reject(
                    keys::APPLICATION_ID,
                    "expected a dotted package name such as com.example.app",
                );
            }
        }

        let version_code = match cx.sources.lookup(keys::VERSION_CODE, variant) {
            Some(value) => {
                let policy = version_code_policy(Some(&value.payload.render()));
                if let VersionCode::Fallback { raw } = &policy {
                    tracing::warn!(
                        "version code `{}` from {} is not a positive integer; using {}",
                        raw,
                        value.describe_origin(),
                        VersionCode::FALLBACK
                    );
                    warnings.push(
                        Diagnostic::warning(format!(
                            "unparsable version code `{}`; using {}",
                            raw,
                            VersionCode::FALLBACK
                        ))
                        .with_context(format!("set by {}", value.describe_origin())),
                    );
                }
                policy.value()
            }
            None => {
                tracing::debug!("no version code for `{}`; using {}", variant, VersionCode::FALLBACK);
                version_code_policy(None).value()
            }
        };

        let version_name = cx.required_string(keys::VERSION_NAME);
        let abi_filters = cx.required_string(keys::ABI_FILTERS).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        });
        let stl = cx.required_string(keys::STL);
        let min_sdk = cx.sdk_level(keys::MIN_SDK, true);
        let target_sdk = cx.sdk_level(keys::TARGET_SDK, false);
        let compile_sdk = cx.sdk_level(keys::COMPILE_SDK, false);
        let build_target = cx.required_string(keys::BUILD_TARGET);

        if let (Some(min), Some(target)) = (min_sdk, target_sdk) {
            if min > target {
                cx.reject(
                    keys::MIN_SDK,
                    format!("exceeds {} ({})", keys::TARGET_SDK, target),
                );
            }
        }

        let ndk_root = cx.optional_string(keys::NDK_ROOT).map(PathBuf::from);
        let ndk_version = cx.optional_string(keys::NDK_VERSION);
        let vcpkg_root = cx.optional_string(keys::VCPKG_ROOT).map(PathBuf::from);
        let vcpkg_enabled = cx.flag(keys::VCPKG, true);
        let triplet = cx.optional_string(keys::TRIPLET);

        let tools = ToolPrograms {
            cmake: cx.optional_string(keys::TOOL_CMAKE).unwrap_or_else(|| "cmake".into()),
            apksigner: cx
                .optional_string(keys::TOOL_APKSIGNER)
                .unwrap_or_else(|| "apksigner".into()),
            uploader: cx
                .optional_string(keys::TOOL_UPLOADER)
                .unwrap_or_else(|| "ovr-platform-util".into()),
        };
        let deploy = DeploySettings {
            app_id: cx.optional_string(keys::DEPLOY_APP_ID),
            channel: cx
                .optional_string(keys::DEPLOY_CHANNEL)
                .unwrap_or_else(|| "alpha".into()),
            subcommand: cx
                .optional_string(keys::DEPLOY_SUBCOMMAND)
                .unwrap_or_else(|| "upload-quest-build".into()),
        };

        if !cx.error.is_empty() {
            return Err(cx.error);
        }

        // Every required field is Some when no error was recorded.
        match (
            build_type,
            application_id,
            version_name,
            abi_filters,
            stl,
            min_sdk,
            target_sdk,
            compile_sdk,
            build_target,
        ) {
            (
                Some(build_type),
                Some(application_id),
                Some(version_name),
                Some(abi_filters),
                Some(stl),
                Some(min_sdk),
                target_sdk,
                compile_sdk,
                Some(build_target),
            ) => {
                let settings = VariantSettings {
                    name: variant.to_string(),
                    build_type,
                    application_id,
                    version_code,
                    version_name,
                    abi_filters,
                    stl,
                    min_sdk,
                    target_sdk: target_sdk.unwrap_or(min_sdk),
                    compile_sdk: compile_sdk.or(target_sdk).unwrap_or(min_sdk),
                    build_target,
                    ndk_root,
                    ndk_version,
                    vcpkg_root,
                    vcpkg_enabled,
                    triplet,
                    tools,
                    deploy,
                };
                tracing::debug!(
                    "resolved variant `{}` ({}, {} v{} code {})",
                    settings.name,
                    settings.build_type,
                    settings.application_id,
                    settings.version_name,
                    settings.version_code
                );
                Ok(VariantResolution { settings, warnings })
            }
            _ => Err(cx.error),
        }
    }
}

/// Lookup helpers that record problems as they go.
struct Cx<'a> {
    sources: &'a ConfigSourceSet,
    variant: &'a str,
    error: ConfigError,
}

impl Cx<'_> {
    fn lookup(&self, key: &str) -> Option<&ConfigValue> {
        self.sources.lookup(key, self.variant)
    }

    fn reject(&mut self, key: &str, reason: impl Into<String>) {
        let (value, origin) = match self.sources.lookup(key, self.variant) {
            Some(v) => (v.payload.render(), v.describe_origin()),
            None => (String::new(), "unknown".to_string()),
        };
        self.error.invalid(key, value, reason, origin);
    }

    fn optional_string(&self, key: &str) -> Option<String> {
        self.lookup(key)
            .map(|v| v.payload.render().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn required_string(&mut self, key: &str) -> Option<String> {
        let value = self.optional_string(key);
        if value.is_none() {
            self.error.missing(key);
        }
        value
    }

    fn sdk_level(&mut self, key: &str, required: bool) -> Option<u32> {
        let raw = if required {
            self.required_string(key)?
        } else {
            self.optional_string(key)?
        };
        match raw.parse::<u32>() {
            Ok(level) if level > 0 => Some(level),
            _ => {
                self.reject(key, "expected a positive API level");
                None
            }
        }
    }

    fn flag(&mut self, key: &str, default: bool) -> bool {
        let Some(value) = self.lookup(key) else {
            return default;
        };
        match value.payload.as_bool() {
            Some(b) => b,
            None => {
                self.reject(key, "expected true or false");
                default
            }
        }
    }

    fn build_type(&mut self) -> Option<BuildType> {
        let implied = BuildType::from_variant_name(self.variant);
        let explicit = self.optional_string(keys::BUILD_TYPE);

        match (implied, explicit) {
            (Some(implied), None) => Some(implied),
            (implied, Some(raw)) => match raw.parse::<BuildType>() {
                Ok(bt) => {
                    if implied.is_some_and(|i| i != bt) {
                        self.reject(
                            keys::BUILD_TYPE,
                            format!("variant `{}` is always a {} build", self.variant, self.variant),
                        );
                        return None;
                    }
                    Some(bt)
                }
                Err(e) => {
                    self.reject(keys::BUILD_TYPE, e);
                    None
                }
            },
            (None, None) => {
                self.error.missing(keys::BUILD_TYPE);
                None
            }
        }
    }
}
