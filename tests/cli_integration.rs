//! CLI integration tests for Drydock.
//!
//! These tests drive the `drydock` binary against throwaway projects. Build
//! tests use shell scripts in place of CMake, apksigner and the uploader, so
//! they only run on Unix.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the drydock binary command.
fn drydock() -> Command {
    let mut cmd = Command::cargo_bin("drydock").unwrap();
    cmd.env_remove("ANDROID_NDK_HOME")
        .env_remove("ANDROID_NDK_ROOT")
        .env_remove("VCPKG_ROOT")
        .env_remove("DRYDOCK_PROPERTIES_FILE")
        .env_remove("DRYDOCK_STAGE_TIMEOUT");
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// ============================================================================
// drydock init
// ============================================================================

#[test]
fn test_init_writes_manifest() {
    let tmp = temp_dir();
    let dir = tmp.path().join("My Game");
    fs::create_dir(&dir).unwrap();

    drydock()
        .arg("init")
        .current_dir(&dir)
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));

    let manifest = fs::read_to_string(dir.join("Drydock.toml")).unwrap();
    assert!(manifest.contains("[project]"));
    assert!(manifest.contains("com.example."));
    assert!(manifest.contains("[tools.packager]"));
}

#[test]
fn test_init_with_explicit_id() {
    let tmp = temp_dir();

    drydock()
        .args(["init", "--name", "arena", "--application-id", "com.acme.arena"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let manifest = fs::read_to_string(tmp.path().join("Drydock.toml")).unwrap();
    assert!(manifest.contains("name = \"arena\""));
    assert!(manifest.contains("com.acme.arena"));
}

#[test]
fn test_init_refuses_existing_manifest() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("Drydock.toml"), "[project]\nname = \"x\"\n").unwrap();

    drydock()
        .arg("init")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ============================================================================
// misc
// ============================================================================

#[test]
fn test_build_outside_project_fails() {
    let tmp = temp_dir();

    drydock()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `Drydock.toml`"));
}

#[test]
fn test_completions_bash() {
    drydock()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drydock"));
}

#[test]
fn test_help_lists_commands() {
    drydock()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("resolve"));
}

// ============================================================================
// projects with fake tools
// ============================================================================

#[cfg(unix)]
mod with_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    const MANIFEST: &str = r#"[project]
name = "game"

[defaults]
application_id = "com.example.game"
build_target = "game"

[tools.packager]
program = "tools/package.sh"
args = ["{output}", "{native_libs}"]
"#;

    struct Project {
        tmp: TempDir,
    }

    impl Project {
        fn new() -> Self {
            let project = Project { tmp: temp_dir() };
            let root = project.root();
            fs::create_dir_all(root.join("tools")).unwrap();
            fs::create_dir_all(project.bin()).unwrap();
            fs::write(root.join("Drydock.toml"), MANIFEST).unwrap();
            fs::write(root.join("CMakeLists.txt"), "project(game)\n").unwrap();

            let ndk = project.ndk();
            fs::create_dir_all(ndk.join("build/cmake")).unwrap();
            fs::write(ndk.join("build/cmake/android.toolchain.cmake"), "").unwrap();
            fs::write(ndk.join("source.properties"), "Pkg.Revision = 29.0.13113456\n").unwrap();
            fs::write(project.tmp.path().join("debug.keystore"), "debug").unwrap();

            project.tool("cmake", "exit 0");
            project.tool(
                "apksigner",
                r#"out=""; prev=""; last=""
for a in "$@"; do
  if [ "$prev" = "--out" ]; then out="$a"; fi
  prev="$a"; last="$a"
done
cat "$last" > "$out"
printf 'signed' >> "$out""#,
            );
            project.tool("uploader", r#"echo "$@" > "$(dirname "$0")/uploaded""#);
            script(&root.join("tools/package.sh"), r#"printf 'unsigned' > "$1""#);
            project
        }

        fn root(&self) -> PathBuf {
            self.tmp.path().join("project")
        }

        fn ndk(&self) -> PathBuf {
            self.tmp.path().join("ndk")
        }

        fn bin(&self) -> PathBuf {
            self.tmp.path().join("bin")
        }

        fn tool(&self, name: &str, body: &str) {
            script(&self.bin().join(name), body);
        }

        /// `drydock <sub>` in the project with every tool pointed at the fakes.
        fn cmd(&self, sub: &str) -> Command {
            let mut cmd = drydock();
            cmd.current_dir(self.root())
                .env("HOME", self.tmp.path().join("home"))
                .env("ANDROID_NDK_HOME", self.ndk())
                .arg("--no-color")
                .arg(sub)
                .arg("--debug-keystore")
                .arg(self.tmp.path().join("debug.keystore"))
                .arg("-P")
                .arg(format!("tool.cmake={}", self.bin().join("cmake").display()))
                .arg("-P")
                .arg(format!("tool.apksigner={}", self.bin().join("apksigner").display()))
                .arg("-P")
                .arg(format!("tool.uploader={}", self.bin().join("uploader").display()));
            cmd
        }

        fn artifact(&self) -> PathBuf {
            self.root().join("build/drydock/debug/outputs/game-debug.apk")
        }
    }

    fn script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_build_debug() {
        let project = Project::new();

        project
            .cmd("build")
            .assert()
            .success()
            .stderr(predicate::str::contains("Finished"));

        assert_eq!(fs::read_to_string(project.artifact()).unwrap(), "unsignedsigned");
    }

    #[test]
    fn test_build_json_events() {
        let project = Project::new();

        let output = project
            .cmd("build")
            .args(["--message-format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let events: Vec<serde_json::Value> = stdout
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events[0]["reason"], "pipeline-started");
        assert!(events
            .iter()
            .any(|e| e["reason"] == "stage-finished" && e["stage"] == "sign" && e["status"] == "succeeded"));
        let last = events.last().unwrap();
        assert_eq!(last["reason"], "pipeline-finished");
        assert_eq!(last["success"], true);
    }

    #[test]
    fn test_compile_failure_reports_output() {
        let project = Project::new();
        project.tool("cmake", "echo 'CMake Error: no compiler' >&2\nexit 3");

        project
            .cmd("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("compile stage failed"))
            .stderr(predicate::str::contains("CMake Error: no compiler"));

        assert!(!project.artifact().exists());
    }

    #[test]
    fn test_release_without_credentials_lists_every_problem() {
        let project = Project::new();

        project
            .cmd("build")
            .arg("--release")
            .assert()
            .failure()
            .stderr(predicate::str::contains("signing.store_file"))
            .stderr(predicate::str::contains("signing.key_alias"));

        assert!(!project.root().join("build").exists());
    }

    #[test]
    fn test_resolve_shows_provenance_and_hides_secrets() {
        let project = Project::new();

        project
            .cmd("resolve")
            .args(["-P", "version_code=42", "-P", "deploy.app_secret=hunter2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("code 42"))
            .stdout(predicate::str::contains("property (-P)"))
            .stdout(predicate::str::contains("deploy.app_secret"))
            .stdout(predicate::str::contains("hunter2").not());
    }

    #[test]
    fn test_resolve_invalid_version_code_warns() {
        let project = Project::new();

        project
            .cmd("resolve")
            .args(["-P", "version_code=abc"])
            .assert()
            .success()
            .stdout(predicate::str::contains("code 1"))
            .stderr(predicate::str::contains("version code"));
    }

    #[test]
    fn test_toolchain_shows_ndk() {
        let project = Project::new();

        project
            .cmd("toolchain")
            .assert()
            .success()
            .stdout(predicate::str::contains("android.toolchain.cmake"))
            .stdout(predicate::str::contains("29.0.13113456"))
            .stdout(predicate::str::contains("arm64-v8a"));
    }

    #[test]
    fn test_deploy_uploads_artifact() {
        let project = Project::new();

        project
            .cmd("deploy")
            .args(["-P", "deploy.app_id=123", "-P", "deploy.app_secret=s3cret"])
            .assert()
            .success()
            .stderr(predicate::str::contains("s3cret").not());

        let uploaded = fs::read_to_string(project.bin().join("uploaded")).unwrap();
        assert!(uploaded.starts_with("upload-quest-build --app-id 123"));
        assert!(uploaded.contains("--channel alpha"));
        assert!(uploaded.contains("game-debug.apk"));
    }

    #[test]
    fn test_deploy_requires_app_credentials() {
        let project = Project::new();

        project
            .cmd("deploy")
            .assert()
            .failure()
            .stderr(predicate::str::contains("deploy.app_id"));

        assert!(!project.bin().join("uploaded").exists());
    }

    #[test]
    fn test_clean_removes_outputs() {
        let project = Project::new();
        project.cmd("build").assert().success();
        assert!(project.artifact().exists());

        drydock()
            .args(["clean"])
            .current_dir(project.root())
            .assert()
            .success()
            .stderr(predicate::str::contains("Removed"));

        assert!(!project.root().join("build/drydock").exists());
    }

    #[test]
    fn test_clean_rejects_variant_path() {
        let project = Project::new();
        project.cmd("build").assert().success();

        drydock()
            .args(["clean", "--variant", "../.."])
            .current_dir(project.root())
            .assert()
            .failure()
            .stderr(predicate::str::contains("variant"));

        assert!(project.root().join("Drydock.toml").exists());
        assert!(project.artifact().exists());
    }
}
