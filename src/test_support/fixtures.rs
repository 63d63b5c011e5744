//! Project fixtures with fake tools.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::workspace::Workspace;
use crate::ops::ResolveOptions;
use crate::util::context::GlobalContext;

pub const FAKE_NDK_REVISION: &str = "29.0.13113456";

/// Manifest used by [`ProjectFixture::new`].
pub const DEFAULT_MANIFEST: &str = r#"[project]
name = "game"

[defaults]
application-id = "com.example.game"
build-target = "game"

[tools.packager]
program = "tools/package.sh"
args = ["{output}", "{native_libs}", "{version_code}"]
"#;

/// A temporary project plus fake NDK and tools.
///
/// ```text
/// <tmp>/project/      Drydock.toml, CMakeLists.txt, tools/package.sh
/// <tmp>/ndk/          build/cmake/android.toolchain.cmake, source.properties
/// <tmp>/bin/          cmake, apksigner, uploader
/// <tmp>/logs/<tool>.log
/// ```
pub struct ProjectFixture {
    tmp: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self::with_manifest(DEFAULT_MANIFEST)
    }

    pub fn with_manifest(manifest: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let fixture = ProjectFixture { tmp };

        let root = fixture.root();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(fixture.bin()).unwrap();
        fs::create_dir_all(fixture.logs()).unwrap();
        fs::write(root.join("Drydock.toml"), manifest).unwrap();
        fs::write(
            root.join("CMakeLists.txt"),
            "cmake_minimum_required(VERSION 3.22)\nproject(game)\nadd_library(game SHARED src/main.cpp)\n",
        )
        .unwrap();
        fs::write(root.join("src/main.cpp"), "int main() { return 0; }\n").unwrap();

        fake_ndk(&fixture.ndk_root(), FAKE_NDK_REVISION);
        fs::write(fixture.debug_keystore(), b"debug keystore").unwrap();

        fixture.write_tool("cmake", "");
        fixture.write_tool(
            "apksigner",
            r#"out=""; prev=""; last=""
for a in "$@"; do
  if [ "$prev" = "--out" ]; then out="$a"; fi
  prev="$a"; last="$a"
done
[ -n "$DRYDOCK_KS_PASS" ] || exit 9
cat "$last" > "$out"
printf 'signed' >> "$out""#,
        );
        fixture.write_tool("uploader", "");
        fixture.write_script(
            &root.join("tools/package.sh"),
            "packager",
            r#"printf 'unsigned' > "$1""#,
        );

        fixture
    }

    /// The project directory.
    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("project")
    }

    pub fn ndk_root(&self) -> PathBuf {
        self.tmp.path().join("ndk")
    }

    pub fn bin(&self) -> PathBuf {
        self.tmp.path().join("bin")
    }

    pub fn logs(&self) -> PathBuf {
        self.tmp.path().join("logs")
    }

    pub fn debug_keystore(&self) -> PathBuf {
        self.tmp.path().join("debug.keystore")
    }

    /// Write `bin/<name>`: logs its arguments, then runs `body`.
    pub fn write_tool(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin().join(name);
        self.write_script(&path, name, body);
        path
    }

    fn write_script(&self, path: &Path, log_name: &str, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let log = self.logs().join(format!("{}.log", log_name));
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> \"{}\"\n{}\n",
            log.display(),
            body
        );
        fs::write(path, script).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Everything a tool was invoked with, one line per invocation.
    pub fn log(&self, tool: &str) -> String {
        fs::read_to_string(self.logs().join(format!("{}.log", tool))).unwrap_or_default()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(&self.root().join("Drydock.toml")).unwrap()
    }

    pub fn context(&self) -> GlobalContext {
        GlobalContext::with_cwd(self.root())
            .unwrap()
            .with_home(self.tmp.path().join("home"))
            .with_env([("ANDROID_NDK_HOME", self.ndk_root().display().to_string())])
    }

    /// Options pointing every tool at the fakes.
    pub fn options(&self, variant: &str) -> ResolveOptions {
        ResolveOptions {
            variant: variant.to_string(),
            properties: vec![
                format!("tool.cmake={}", self.bin().join("cmake").display()),
                format!("tool.apksigner={}", self.bin().join("apksigner").display()),
                format!("tool.uploader={}", self.bin().join("uploader").display()),
            ],
            properties_file: None,
            deploy: false,
            debug_keystore: Some(self.debug_keystore()),
        }
    }

    /// Options for a release build with a valid keystore.
    pub fn release_options(&self) -> ResolveOptions {
        let keystore = self.root().join("release.jks");
        fs::write(&keystore, b"release keystore").unwrap();
        let mut opts = self.options("release");
        opts.properties.extend([
            "signing.store_file=release.jks".to_string(),
            "signing.store_password=store-secret".to_string(),
            "signing.key_alias=upload".to_string(),
            "signing.key_password=key-secret".to_string(),
        ]);
        opts
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create an NDK layout with the given revision.
pub fn fake_ndk(root: &Path, revision: &str) {
    fs::create_dir_all(root.join("build/cmake")).unwrap();
    fs::write(root.join("build/cmake/android.toolchain.cmake"), "# ndk").unwrap();
    fs::write(
        root.join("source.properties"),
        format!("Pkg.Desc = Android NDK\nPkg.Revision = {}\n", revision),
    )
    .unwrap();
}
