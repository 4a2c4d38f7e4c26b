//! Manifest loading and override resolution.
//!
//! A `flappy.toml` manifest is parsed into an untyped TOML table first, then
//! the `[build]` and `[dependencies.*]` tables go through the hierarchical
//! override merge in [`overrides`] to produce the effective configuration for
//! the requested profile, mode, and host platform.

mod overrides;
mod types;

use std::path::{Path, PathBuf};

use flappy_platform::{Arch, Os};
use thiserror::Error;
use tracing::debug;

pub use types::{BuildConfig, Dependency, Language, Manifest, OutputKind, Package, Profile, Source, TestConfig};

/// Manifest file name, looked up in the project root.
pub const MANIFEST_FILENAME: &str = "flappy.toml";

/// Errors reading or parsing the manifest file itself.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("manifest not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid TOML in {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("manifest has no [build] table")]
  MissingBuild,
}

/// Errors in the content of an otherwise well-formed manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("[{table}] is missing required field '{field}'")]
  MissingField { table: String, field: &'static str },

  #[error("[{table}] field '{field}' must be a {expected}")]
  TypeMismatch {
    table: String,
    field: String,
    expected: &'static str,
  },

  #[error("[{table}] field '{field}' has unrecognised value '{value}'")]
  InvalidValue {
    table: String,
    field: &'static str,
    value: String,
  },

  #[error("requested profile '{0}' does not exist in the manifest")]
  UnknownProfile(String),

  #[error("dependency '{0}' must declare exactly one source (git, url, or path); none found")]
  NoSource(String),

  #[error("dependency '{0}' declares more than one source (git, url, or path)")]
  MultipleSources(String),

  #[error("no [build] configuration matched the current platform")]
  NoConfiguration,
}

/// Inputs that select which override layers apply.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
  pub profile: Profile,
  /// User-named `[build.<name>]` sub-configuration, independent of the mode.
  pub custom_profile: Option<String>,
  pub os: Os,
  pub host_arch: Arch,
}

impl ResolveOptions {
  /// Options for the current host. Returns `None` on an unsupported host.
  pub fn for_host(profile: Profile, custom_profile: Option<String>) -> Option<Self> {
    Some(Self {
      profile,
      custom_profile,
      os: Os::current()?,
      host_arch: Arch::current()?,
    })
  }
}

impl Manifest {
  /// Load and resolve `<project_dir>/flappy.toml`.
  pub fn load(project_dir: &Path, opts: &ResolveOptions) -> crate::Result<Self> {
    let path = project_dir.join(MANIFEST_FILENAME);
    if !path.exists() {
      return Err(ManifestError::NotFound(path).into());
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
      path: path.clone(),
      source,
    })?;
    let manifest = Self::parse(&text, &path, opts)?;
    debug!(
      package = %manifest.package.name,
      profile = %opts.profile,
      deps = manifest.dependencies.len(),
      "resolved manifest"
    );
    Ok(manifest)
  }

  /// Parse manifest text; `origin` is only used in error messages.
  pub fn parse(text: &str, origin: &Path, opts: &ResolveOptions) -> crate::Result<Self> {
    let root: toml::Table = text.parse().map_err(|source| ManifestError::Parse {
      path: origin.to_path_buf(),
      source,
    })?;

    let package = parse_package(&root)?;

    let build_table = match root.get("build") {
      Some(toml::Value::Table(t)) => t,
      Some(_) => {
        return Err(
          ConfigError::TypeMismatch {
            table: "build".to_string(),
            field: "build".to_string(),
            expected: "table",
          }
          .into(),
        );
      }
      None => return Err(ManifestError::MissingBuild.into()),
    };
    let build = overrides::resolve_build(build_table, opts)?;

    let test = parse_test(&root)?;
    let dependencies = parse_dependencies(&root, opts)?;

    Ok(Manifest {
      package,
      build,
      test,
      dependencies,
    })
  }
}

fn parse_package(root: &toml::Table) -> Result<Package, ConfigError> {
  let Some(value) = root.get("package") else {
    return Ok(Package::default());
  };
  let table = value.as_table().ok_or_else(|| ConfigError::TypeMismatch {
    table: "package".to_string(),
    field: "package".to_string(),
    expected: "table",
  })?;

  let name = get_str(table, "package", "name")?.unwrap_or_default();
  let version = get_str(table, "package", "version")?.unwrap_or_else(|| "0.0.0".to_string());
  let authors = get_str_array(table, "package", "authors")?.unwrap_or_default();

  Ok(Package { name, version, authors })
}

fn parse_test(root: &toml::Table) -> Result<Option<TestConfig>, ConfigError> {
  let Some(value) = root.get("test") else {
    return Ok(None);
  };
  let table = value.as_table().ok_or_else(|| ConfigError::TypeMismatch {
    table: "test".to_string(),
    field: "test".to_string(),
    expected: "table",
  })?;

  let sources = get_str_array(table, "test", "sources")?.unwrap_or_default();
  let output = get_str(table, "test", "output")?.ok_or(ConfigError::MissingField {
    table: "test".to_string(),
    field: "output",
  })?;
  let defines = get_str_array(table, "test", "defines")?.unwrap_or_default();
  let flags = get_str_array(table, "test", "flags")?.unwrap_or_default();

  Ok(Some(TestConfig {
    sources,
    output: PathBuf::from(output),
    defines,
    flags,
  }))
}

fn parse_dependencies(root: &toml::Table, opts: &ResolveOptions) -> Result<Vec<Dependency>, ConfigError> {
  let Some(value) = root.get("dependencies") else {
    return Ok(Vec::new());
  };
  let table = value.as_table().ok_or_else(|| ConfigError::TypeMismatch {
    table: "dependencies".to_string(),
    field: "dependencies".to_string(),
    expected: "table",
  })?;

  let mut deps = Vec::with_capacity(table.len());
  for (name, entry) in table {
    let entry = entry.as_table().ok_or_else(|| ConfigError::TypeMismatch {
      table: format!("dependencies.{}", name),
      field: name.clone(),
      expected: "table",
    })?;
    deps.push(overrides::resolve_dependency(name, entry, opts)?);
  }
  Ok(deps)
}

pub(crate) fn get_str(table: &toml::Table, ctx: &str, key: &str) -> Result<Option<String>, ConfigError> {
  match table.get(key) {
    None => Ok(None),
    Some(toml::Value::String(s)) => Ok(Some(s.clone())),
    Some(_) => Err(ConfigError::TypeMismatch {
      table: ctx.to_string(),
      field: key.to_string(),
      expected: "string",
    }),
  }
}

pub(crate) fn get_str_array(table: &toml::Table, ctx: &str, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
  match table.get(key) {
    None => Ok(None),
    Some(toml::Value::Array(items)) => {
      let mut out = Vec::with_capacity(items.len());
      for item in items {
        match item {
          toml::Value::String(s) => out.push(s.clone()),
          _ => {
            return Err(ConfigError::TypeMismatch {
              table: ctx.to_string(),
              field: key.to_string(),
              expected: "array of strings",
            });
          }
        }
      }
      Ok(Some(out))
    }
    Some(_) => Err(ConfigError::TypeMismatch {
      table: ctx.to_string(),
      field: key.to_string(),
      expected: "array of strings",
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use flappy_platform::{Arch, Os};

  fn opts() -> ResolveOptions {
    ResolveOptions {
      profile: Profile::Debug,
      custom_profile: None,
      os: Os::Linux,
      host_arch: Arch::X64,
    }
  }

  fn parse(text: &str) -> crate::Result<Manifest> {
    Manifest::parse(text, Path::new("flappy.toml"), &opts())
  }

  #[test]
  fn full_manifest_parses() {
    let manifest = parse(
      r#"
      [package]
      name = "viewer"
      version = "1.2.0"
      authors = ["a@example.com"]

      [build]
      compiler = "clang++"
      language = "c++"
      standard = "c++20"
      output = "bin/viewer"
      arch = "x64"
      type = "exe"
      defines = ["VIEWER"]
      flags = ["-Wall"]

      [test]
      sources = ["tests/*.cpp"]
      output = "bin/viewer_tests"
      defines = ["TESTING"]

      [dependencies.stb]
      url = "https://example.com/stb_image.h"
    "#,
    )
    .unwrap();

    assert_eq!(manifest.package.name, "viewer");
    assert_eq!(manifest.package.version, "1.2.0");
    assert_eq!(manifest.build.compiler, "clang++");
    assert_eq!(manifest.build.arch, Arch::X64);
    assert_eq!(manifest.build.kind, OutputKind::Executable);
    let test = manifest.test.unwrap();
    assert_eq!(test.sources, vec!["tests/*.cpp"]);
    assert_eq!(test.defines, vec!["TESTING"]);
    assert_eq!(manifest.dependencies.len(), 1);
    assert!(matches!(manifest.dependencies[0].source, Source::Http { .. }));
  }

  #[test]
  fn dependency_order_is_preserved() {
    let manifest = parse(
      r#"
      [build]
      compiler = "g++"
      standard = "c++20"
      output = "bin/app"

      [dependencies.zlib]
      path = "vendor/zlib"

      [dependencies.openssl]
      path = "vendor/openssl"

      [dependencies.curl]
      path = "vendor/curl"
    "#,
    )
    .unwrap();

    let names: Vec<&str> = manifest.dependencies.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["zlib", "openssl", "curl"]);
  }

  #[test]
  fn resolution_is_idempotent() {
    let text = r#"
      [build]
      compiler = "g++"
      standard = "c++20"
      output = "bin/app"
      defines = ["A"]

      [build.debug]
      defines = ["D"]
    "#;
    let first = parse(text).unwrap();
    let second = parse(text).unwrap();
    assert_eq!(first.build, second.build);
    assert_eq!(first.build.defines, vec!["A", "D"]);
  }

  #[test]
  fn missing_build_table_is_an_error() {
    let err = parse("[package]\nname = \"x\"\n").unwrap_err();
    assert!(matches!(
      err,
      crate::Error::Manifest(ManifestError::MissingBuild)
    ));
  }

  #[test]
  fn defaults_fill_language_arch_and_kind() {
    let manifest = parse(
      r#"
      [build]
      compiler = "g++"
      standard = "c++17"
      output = "bin/hello"
    "#,
    )
    .unwrap();

    assert_eq!(manifest.build.language, Language::Cpp);
    assert_eq!(manifest.build.arch, Arch::X64);
    assert_eq!(manifest.build.kind, OutputKind::Executable);
    assert!(!manifest.build.profile_defined);
  }
}
