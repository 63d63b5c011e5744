//! CMake command lines for the compile stage.
//!
//! Each ABI gets its own build tree. Configure and build are separate
//! invocations so that a failing configure is reported as such.

use std::path::{Path, PathBuf};

use crate::builder::plan::BuildPlan;
use crate::core::abi::Abi;
use crate::util::process::ProcessBuilder;

/// CMake invocations for one ABI.
pub struct CMakeBuilder<'a> {
    plan: &'a BuildPlan,
    abi: Abi,
    build_dir: PathBuf,
    library_dir: PathBuf,
}

impl<'a> CMakeBuilder<'a> {
    pub fn new(plan: &'a BuildPlan, abi: Abi) -> Self {
        CMakeBuilder {
            plan,
            abi,
            build_dir: plan.layout.native_dir(abi),
            library_dir: plan.layout.libs_dir(abi),
        }
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    /// Arguments of the configure step.
    pub fn configure_args(&self) -> Vec<String> {
        let toolchain = self.plan.variant.native_toolchain();
        let mut args = vec![
            "-S".to_string(),
            self.plan.source_dir.display().to_string(),
            "-B".to_string(),
            self.build_dir.display().to_string(),
            format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.primary().display()),
        ];

        if let Some(chainload) = toolchain.chainload() {
            args.push(format!("-DVCPKG_CHAINLOAD_TOOLCHAIN_FILE={}", chainload.display()));
            args.push(format!("-DVCPKG_TARGET_TRIPLET={}", toolchain.triplet()));
        }

        args.push(format!("-DANDROID_ABI={}", self.abi));
        args.push(format!("-DANDROID_STL={}", toolchain.stl()));
        args.push(format!("-DANDROID_PLATFORM={}", toolchain.android_platform()));
        args.push(format!(
            "-DCMAKE_BUILD_TYPE={}",
            self.plan.variant.build_type().cmake_build_type()
        ));
        args.push(format!(
            "-DCMAKE_LIBRARY_OUTPUT_DIRECTORY={}",
            self.library_dir.display()
        ));
        args
    }

    /// Arguments of the build step.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "--build".to_string(),
            self.build_dir.display().to_string(),
            "--target".to_string(),
            self.plan.variant.native_toolchain().build_target().to_string(),
        ]
    }

    pub fn configure_command(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.plan.tools.cmake)
            .args(self.configure_args())
            .cwd(&self.plan.project_root)
    }

    pub fn build_command(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.plan.tools.cmake)
            .args(self.build_args())
            .cwd(&self.plan.project_root)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::ops::resolve_build;
    use crate::test_support::ProjectFixture;

    fn fake_vcpkg(root: &Path) {
        std::fs::create_dir_all(root.join("scripts/buildsystems")).unwrap();
        std::fs::write(root.join("scripts/buildsystems/vcpkg.cmake"), "").unwrap();
        std::fs::create_dir_all(root.join("triplets")).unwrap();
        std::fs::write(root.join("triplets/arm64-android.cmake"), "").unwrap();
    }

    #[test]
    fn test_configure_args_ndk_only() {
        let project = ProjectFixture::new();
        let plan = resolve_build(&project.workspace(), &project.context(), &project.options("debug"))
            .unwrap()
            .plan;
        let cmake = CMakeBuilder::new(&plan, Abi::Arm64V8a);
        let args = cmake.configure_args();

        assert_eq!(args[0], "-S");
        assert_eq!(args[2], "-B");
        assert!(args[3].ends_with("build/drydock/debug/native/arm64-v8a"));
        assert_eq!(
            args[4],
            format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                project.ndk_root().join("build/cmake/android.toolchain.cmake").display()
            )
        );
        assert!(!args.iter().any(|a| a.starts_with("-DVCPKG_")));
        assert!(args.contains(&"-DANDROID_STL=c++_shared".to_string()));
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
        assert!(args
            .iter()
            .any(|a| a.starts_with("-DCMAKE_LIBRARY_OUTPUT_DIRECTORY=") && a.ends_with("libs/arm64-v8a")));

        let build = cmake.build_args();
        assert_eq!(build[0], "--build");
        assert_eq!(&build[2..], &["--target".to_string(), "game".to_string()]);
    }

    #[test]
    fn test_configure_args_chained() {
        let project = ProjectFixture::new();
        let vcpkg = project.root().join("../vcpkg");
        fake_vcpkg(&vcpkg);
        let mut opts = project.options("debug");
        opts.properties.push(format!("vcpkg_root={}", vcpkg.display()));

        let plan = resolve_build(&project.workspace(), &project.context(), &opts)
            .unwrap()
            .plan;
        let args = CMakeBuilder::new(&plan, Abi::Arm64V8a).configure_args();

        assert!(args[4].ends_with("scripts/buildsystems/vcpkg.cmake"));
        assert!(args.iter().any(|a| a.starts_with("-DVCPKG_CHAINLOAD_TOOLCHAIN_FILE=")
            && a.ends_with("android.toolchain.cmake")));
        assert!(args.contains(&"-DVCPKG_TARGET_TRIPLET=arm64-android".to_string()));
    }
}
