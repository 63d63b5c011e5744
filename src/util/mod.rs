//! Shared utilities

pub mod cancel;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod ndk;
pub mod process;
pub mod secret;
pub mod vcpkg;

pub use cancel::CancelToken;
pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use secret::Secret;
