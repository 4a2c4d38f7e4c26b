//! MSVC developer-environment bootstrap.
//!
//! MSVC compilers only work inside the environment established by the
//! vendor's `vcvarsall.bat`. The [`MsvcEnv`] transformer rewrites an
//! invocation `(cl, args)` into
//! `(cmd.exe, /c "call \"<vcvarsall>\" <arch> && cl <args>")`, locating
//! vcvarsall through `vswhere.exe` in the 32-bit Program Files tree.

use std::path::{Path, PathBuf};

use flappy_platform::Arch;
use tracing::debug;

use super::CommandTransformer;
use crate::error::BuildError;
use crate::process::CommandSpec;

/// Visual Studio component that carries the C++ toolset.
const VC_TOOLS_COMPONENT: &str = "Microsoft.VisualStudio.Component.VC.Tools.x86.x64";

/// Wraps invocations in a `vcvarsall.bat` bootstrap.
pub struct MsvcEnv {
  vcvarsall: PathBuf,
  arch: Arch,
}

impl MsvcEnv {
  /// Locate vcvarsall.bat via vswhere and build the transformer.
  pub fn locate(arch: Arch) -> Result<Self, BuildError> {
    let program_files = std::env::var("PROGRAMFILES(X86)")
      .map_err(|_| BuildError::Bootstrap("PROGRAMFILES(X86) is not set; is this a Windows host?".to_string()))?;
    let vswhere = Path::new(&program_files)
      .join("Microsoft Visual Studio")
      .join("Installer")
      .join("vswhere.exe");
    if !vswhere.exists() {
      return Err(BuildError::Bootstrap(format!(
        "vswhere.exe not found at {}; install Visual Studio with the C++ workload",
        vswhere.display()
      )));
    }

    let output = std::process::Command::new(&vswhere)
      .args(["-latest", "-products", "*", "-requires", VC_TOOLS_COMPONENT])
      .args(["-property", "installationPath"])
      .output()
      .map_err(|err| BuildError::Bootstrap(format!("failed to run vswhere: {}", err)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let install = stdout
      .lines()
      .map(str::trim)
      .find(|line| !line.is_empty())
      .ok_or_else(|| {
        BuildError::Bootstrap("vswhere found no Visual Studio installation with the C++ toolset".to_string())
      })?;

    let vcvarsall = Path::new(install).join("VC").join("Auxiliary").join("Build").join("vcvarsall.bat");
    if !vcvarsall.exists() {
      return Err(BuildError::Bootstrap(format!("vcvarsall.bat not found at {}", vcvarsall.display())));
    }

    debug!(path = %vcvarsall.display(), "located vcvarsall");
    Ok(Self { vcvarsall, arch })
  }

  /// Build a transformer around a known script path. Used by tests.
  pub fn with_script(vcvarsall: PathBuf, arch: Arch) -> Self {
    Self { vcvarsall, arch }
  }

  fn arch_token(&self) -> &'static str {
    match self.arch {
      Arch::X86 => "x86",
      Arch::X64 => "x64",
      Arch::Arm64 => "arm64",
    }
  }
}

impl CommandTransformer for MsvcEnv {
  fn transform(&self, spec: CommandSpec) -> CommandSpec {
    let inner = spec.command_line();
    let batch = format!(
      "call \"{}\" {} && {}",
      self.vcvarsall.display(),
      self.arch_token(),
      inner
    );
    CommandSpec {
      program: "cmd.exe".to_string(),
      args: vec!["/C".to_string(), batch],
      cwd: spec.cwd,
      envs: spec.envs,
    }
  }
}

/// Lines vcvarsall and cl print before any useful output.
const BANNER_MARKERS: &[&str] = &[
  "Microsoft (R)",
  "Copyright (C)",
  "Developer Command Prompt",
  "vcvarsall.bat",
];

/// Remove the MSVC banner noise from captured stdout.
pub fn scrub_banner(stdout: &str) -> String {
  stdout
    .lines()
    .filter(|line| {
      let trimmed = line.trim();
      !trimmed.is_empty() && !BANNER_MARKERS.iter().any(|marker| trimmed.contains(marker))
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transform_wraps_in_cmd_call() {
    let env = MsvcEnv::with_script(PathBuf::from(r"C:\VS\VC\Auxiliary\Build\vcvarsall.bat"), Arch::X64);
    let spec = CommandSpec::new("cl").arg("/c").arg("main.cpp");
    let wrapped = env.transform(spec);

    assert_eq!(wrapped.program, "cmd.exe");
    assert_eq!(wrapped.args[0], "/C");
    assert_eq!(
      wrapped.args[1],
      r#"call "C:\VS\VC\Auxiliary\Build\vcvarsall.bat" x64 && cl /c main.cpp"#
    );
  }

  #[test]
  fn transform_preserves_cwd_and_env() {
    let env = MsvcEnv::with_script(PathBuf::from(r"C:\vcvarsall.bat"), Arch::X86);
    let spec = CommandSpec::new("cl").cwd("/work").env("LIB", r"C:\deps\lib");
    let wrapped = env.transform(spec);

    assert_eq!(wrapped.cwd.as_deref(), Some(Path::new("/work")));
    assert_eq!(wrapped.envs, vec![("LIB".to_string(), r"C:\deps\lib".to_string())]);
  }

  #[test]
  fn scrub_removes_banner_lines_and_blanks() {
    let raw = "\
Microsoft (R) C/C++ Optimizing Compiler Version 19.40\r
Copyright (C) Microsoft Corporation.  All rights reserved.\r
\r
main.cpp\r
src\\main.cpp(12): warning C4100: unreferenced parameter\r
";
    let scrubbed = scrub_banner(raw);
    assert_eq!(
      scrubbed,
      "main.cpp\r\nsrc\\main.cpp(12): warning C4100: unreferenced parameter\r"
    );
  }
}
