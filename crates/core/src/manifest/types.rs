//! Manifest data model.
//!
//! These types are the result of parsing `flappy.toml` and resolving its
//! hierarchical overrides for one invocation. They are never mutated after
//! resolution.

use std::fmt;
use std::path::PathBuf;

use flappy_platform::Arch;
use serde::{Deserialize, Serialize};

/// Build profile: selects flag presets and the cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
  Debug,
  Release,
}

impl Profile {
  /// Lowercase identifier used in paths and override table names.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::Release => "release",
    }
  }

  /// Capitalised identifier as understood by CMake's `CMAKE_BUILD_TYPE`.
  pub fn cmake_name(&self) -> &'static str {
    match self {
      Self::Debug => "Debug",
      Self::Release => "Release",
    }
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Source language of the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
  C,
  Cpp,
}

impl Language {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::C => "c",
      Self::Cpp => "c++",
    }
  }

  /// Extensions considered source files for this language.
  ///
  /// For C++ the set includes module interface units (`.ixx`, `.cppm`),
  /// which the orchestrator compiles before implementation units.
  pub fn source_extensions(&self) -> &'static [&'static str] {
    match self {
      Self::C => &["c"],
      Self::Cpp => &["cpp", "cc", "cxx", "c", "ixx", "cppm"],
    }
  }

  /// Extensions of module interface units, compiled ahead of everything else.
  pub fn module_extensions(&self) -> &'static [&'static str] {
    match self {
      Self::C => &[],
      Self::Cpp => &["ixx", "cppm"],
    }
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// What kind of artifact the build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
  Executable,
  StaticLib,
  SharedLib,
}

impl OutputKind {
  pub fn is_library(&self) -> bool {
    !matches!(self, Self::Executable)
  }
}

/// Where a dependency's sources come from. Exactly one variant per entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  /// `git = "<url>"` with an optional `tag`.
  Git { url: String, tag: Option<String> },
  /// `url = "<url>"`: a single-file http download.
  Http { url: String },
  /// `path = "<dir>"`: a local directory, used in place.
  Local { path: PathBuf },
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Git { url, tag: Some(tag) } => write!(f, "git+{}#{}", url, tag),
      Self::Git { url, tag: None } => write!(f, "git+{}", url),
      Self::Http { url } => write!(f, "http+{}", url),
      Self::Local { path } => write!(f, "path+{}", path.display()),
    }
  }
}

/// One `[dependencies.<name>]` entry after override resolution.
///
/// `include_dirs`, `lib_dirs` and `libs` are `None` when the manifest left
/// them out, which means "autodetect from standard locations".
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
  pub name: String,
  pub source: Source,
  pub defines: Vec<String>,
  pub build_cmd: Option<String>,
  pub include_dirs: Option<Vec<String>>,
  pub lib_dirs: Option<Vec<String>>,
  pub libs: Option<Vec<String>>,
  /// Names of sibling dependencies bridged into this one's build.
  pub extra_dependencies: Vec<String>,
}

/// `[package]`: identity only, no semantic role in the build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
  pub name: String,
  pub version: String,
  pub authors: Vec<String>,
}

/// The effective `[build]` configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
  /// Compiler command or absolute path.
  pub compiler: String,
  pub language: Language,
  /// Compiler-recognised standard token, e.g. `c++20` or `c17`.
  pub standard: String,
  /// Output path without its platform suffix.
  pub output: PathBuf,
  pub arch: Arch,
  pub kind: OutputKind,
  pub defines: Vec<String>,
  pub flags: Vec<String>,
  /// True iff at least one platform or profile layer matched during the
  /// override merge. The CLI uses this to detect unconfigured platforms.
  pub profile_defined: bool,
}

/// `[test]`: sources and overrides for the test binary.
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
  /// Source globs, resolved against the project root.
  pub sources: Vec<String>,
  pub output: PathBuf,
  pub defines: Vec<String>,
  pub flags: Vec<String>,
}

/// A fully resolved project manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
  pub package: Package,
  pub build: BuildConfig,
  pub test: Option<TestConfig>,
  /// Order preserved from the manifest.
  pub dependencies: Vec<Dependency>,
}
