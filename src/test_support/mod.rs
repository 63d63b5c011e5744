//! Test utilities for drydock unit tests.
//!
//! Builds throwaway projects with a fake NDK and shell-script stand-ins for
//! the external tools, so the pipeline can run end to end without a real
//! Android toolchain.
//!
//! # Example
//!
//! ```rust,ignore
//! use drydock::test_support::ProjectFixture;
//!
//! #[test]
//! fn test_example() {
//!     let project = ProjectFixture::new();
//!     let ws = project.workspace();
//!     let ctx = project.context();
//!     // Resolve and run...
//! }
//! ```

pub mod fixtures;

pub use fixtures::*;
