//! CLI smoke tests for flappy.
//!
//! Every test runs the real binary in an isolated project directory with an
//! isolated cache (`XDG_CACHE_HOME`/`APPDATA` point into the temp dir).
//! Build scenarios use a fake compiler script so no real toolchain is
//! required.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Environment
// =============================================================================

/// Logs every invocation next to itself and creates whatever `-o` names.
#[cfg(unix)]
const FAKE_COMPILER: &str = r#"#!/bin/sh
log="$(dirname "$0")/tool.log"
printf '%s %s\n' "$0" "$*" >> "$log"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
if [ -n "$out" ]; then : > "$out"; fi
exit 0
"#;

struct TestEnv {
  temp: TempDir,
  project: PathBuf,
}

impl TestEnv {
  fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    std::fs::create_dir_all(project.join("src")).unwrap();
    Self { temp, project }
  }

  /// Get a Command for the flappy binary with an isolated environment.
  fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("flappy");
    cmd.current_dir(&self.project);
    cmd.env("XDG_CACHE_HOME", self.temp.path().join("cache"));
    cmd.env("APPDATA", self.temp.path().join("cache"));
    cmd
  }

  fn write(&self, rel: &str, content: &str) {
    let path = self.project.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
  }

  #[cfg(unix)]
  fn install_fake_compiler(&self) -> String {
    use std::os::unix::fs::PermissionsExt;
    let bin = self.temp.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let compiler = bin.join("fake-g++");
    std::fs::write(&compiler, FAKE_COMPILER).unwrap();
    std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();
    compiler.display().to_string()
  }

  #[cfg(unix)]
  fn log_lines(&self) -> usize {
    std::fs::read_to_string(self.temp.path().join("bin/tool.log"))
      .unwrap_or_default()
      .lines()
      .count()
  }
}

// =============================================================================
// Help & Version
// =============================================================================

fn flappy_cmd() -> Command {
  cargo_bin_cmd!("flappy")
}

#[test]
fn help_flag_works() {
  flappy_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  flappy_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("flappy"));
}

#[test]
fn subcommand_help_works() {
  for sub in &["build", "run", "test", "sync", "clean", "info"] {
    flappy_cmd()
      .arg(sub)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn info_prints_platform_and_cache() {
  let env = TestEnv::new();
  env
    .cmd()
    .arg("info")
    .assert()
    .success()
    .stdout(predicate::str::contains("cache root"));
}

// =============================================================================
// Error surfaces
// =============================================================================

#[test]
fn build_without_manifest_fails() {
  let env = TestEnv::new();
  env
    .cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("manifest not found"));
}

#[test]
fn build_with_invalid_toml_fails() {
  let env = TestEnv::new();
  env.write("flappy.toml", "[build\ncompiler = ");
  env
    .cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid TOML"));
}

#[test]
fn build_with_unknown_profile_fails() {
  let env = TestEnv::new();
  env.write(
    "flappy.toml",
    r#"
[build]
compiler = "g++"
standard = "c++20"
output = "bin/app"
"#,
  );
  env
    .cmd()
    .args(["build", "--profile", "bogus"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("profile 'bogus' does not exist"));
}

#[test]
fn dependency_without_source_fails() {
  let env = TestEnv::new();
  env.write(
    "flappy.toml",
    r#"
[build]
compiler = "g++"
standard = "c++20"
output = "bin/app"

[dependencies.fmt]
defines = ["FMT_HEADER_ONLY"]
"#,
  );
  env
    .cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("exactly one source"));
}

// =============================================================================
// Build scenarios (fake compiler)
// =============================================================================

#[cfg(unix)]
#[test]
fn build_run_and_incremental_noop() {
  let env = TestEnv::new();
  let compiler = env.install_fake_compiler();
  env.write(
    "flappy.toml",
    &format!(
      r#"
[package]
name = "hello"

[build]
compiler = "{compiler}"
language = "c++"
standard = "c++17"
output = "bin/hello"
type = "exe"
"#
    ),
  );
  env.write("src/main.cpp", "int main() { return 0; }\n");

  env.cmd().arg("build").assert().success();
  assert!(env.project.join("bin/hello").is_file());
  assert!(env.project.join("compile_commands.json").is_file());
  assert_eq!(env.log_lines(), 2, "one compile, one link");

  // Second build is a no-op.
  env
    .cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));
  assert_eq!(env.log_lines(), 2);
}

#[cfg(unix)]
#[test]
fn sync_writes_the_lock_file() {
  let env = TestEnv::new();
  let compiler = env.install_fake_compiler();
  env.write("vendor/mini/include/mini.h", "\n");
  env.write(
    "flappy.toml",
    &format!(
      r#"
[build]
compiler = "{compiler}"
language = "c++"
standard = "c++17"
output = "bin/app"

[dependencies.mini]
path = "vendor/mini"
"#
    ),
  );

  env.cmd().arg("sync").assert().success();

  let lock = std::fs::read_to_string(env.project.join("flappy.lock")).unwrap();
  assert!(lock.contains("[[dependencies]]"));
  assert!(lock.contains("name = \"mini\""));
  assert!(lock.contains("resolved = \"local\""));
}

#[cfg(unix)]
#[test]
fn clean_removes_project_artifacts() {
  let env = TestEnv::new();
  let compiler = env.install_fake_compiler();
  env.write(
    "flappy.toml",
    &format!(
      r#"
[build]
compiler = "{compiler}"
language = "c++"
standard = "c++17"
output = "bin/app"
"#
    ),
  );
  env.write("src/main.cpp", "int main() { return 0; }\n");

  env.cmd().arg("build").assert().success();
  assert!(env.project.join("obj").is_dir());

  env.cmd().arg("clean").assert().success();
  assert!(!env.project.join("obj").exists());
  assert!(!env.project.join("compile_commands.json").exists());

  // Cleaning twice is fine.
  env.cmd().arg("clean").assert().success();
}

#[cfg(unix)]
#[test]
fn run_executes_the_built_binary() {
  let env = TestEnv::new();
  // A "compiler" whose link step emits a runnable script.
  use std::os::unix::fs::PermissionsExt;
  let bin = env.temp.path().join("bin");
  std::fs::create_dir_all(&bin).unwrap();
  let compiler = bin.join("fake-g++");
  std::fs::write(
    &compiler,
    r#"#!/bin/sh
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
case "$out" in
  *.o) : > "$out" ;;
  *) printf '#!/bin/sh\necho hello from flappy\n' > "$out"; chmod +x "$out" ;;
esac
exit 0
"#,
  )
  .unwrap();
  std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755)).unwrap();

  env.write(
    "flappy.toml",
    &format!(
      r#"
[build]
compiler = "{}"
language = "c++"
standard = "c++17"
output = "bin/app"
"#,
      compiler.display()
    ),
  );
  env.write("src/main.cpp", "int main() { return 0; }\n");

  env
    .cmd()
    .arg("run")
    .assert()
    .success()
    .stdout(predicate::str::contains("hello from flappy"));
}
