//! Android ABI and C++ runtime identities.
//!
//! The ABI set of a variant decides which native libraries get built and
//! which package-manager triplet they link against, so both enumerations are
//! closed: unknown names are rejected instead of being passed through to the
//! build tool.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A supported Android ABI.
///
/// Variant order is the enumeration order used when a single ABI has to be
/// picked from a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Abi {
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "x86")]
    X86,
}

impl Abi {
    /// Every supported ABI in enumeration order.
    pub const ALL: [Abi; 4] = [Abi::Arm64V8a, Abi::ArmeabiV7a, Abi::X86_64, Abi::X86];

    /// The NDK name (`ANDROID_ABI` value).
    pub fn as_str(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-v8a",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::X86_64 => "x86_64",
            Abi::X86 => "x86",
        }
    }

    /// The vcpkg triplet for this ABI.
    pub fn vcpkg_triplet(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-android",
            Abi::ArmeabiV7a => "arm-neon-android",
            Abi::X86_64 => "x64-android",
            Abi::X86 => "x86-android",
        }
    }

    /// The clang target triple the NDK compiles for.
    pub fn clang_triple(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "aarch64-linux-android",
            Abi::ArmeabiV7a => "armv7a-linux-androideabi",
            Abi::X86_64 => "x86_64-linux-android",
            Abi::X86 => "i686-linux-android",
        }
    }

    /// Comma-separated list of supported names, for error messages.
    pub fn supported_names() -> String {
        Abi::ALL
            .iter()
            .map(|abi| abi.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Abi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Abi::ALL
            .iter()
            .copied()
            .find(|abi| abi.as_str() == s.trim())
            .ok_or_else(|| format!("unsupported ABI `{}`", s.trim()))
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// C++ runtime selection (`ANDROID_STL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stl {
    #[serde(rename = "c++_shared")]
    CxxShared,
    #[serde(rename = "c++_static")]
    CxxStatic,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "none")]
    None,
}

impl Stl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stl::CxxShared => "c++_shared",
            Stl::CxxStatic => "c++_static",
            Stl::System => "system",
            Stl::None => "none",
        }
    }
}

impl FromStr for Stl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "c++_shared" => Ok(Stl::CxxShared),
            "c++_static" => Ok(Stl::CxxStatic),
            "system" => Ok(Stl::System),
            "none" => Ok(Stl::None),
            other => Err(format!(
                "unsupported STL `{}`; expected c++_shared, c++_static, system or none",
                other
            )),
        }
    }
}

impl fmt::Display for Stl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
