//! Building resolved dependencies in topological order.
//!
//! Each node gets exactly one build strategy, in priority order:
//!
//! 1. a custom `build_cmd` (gated by the incremental state file),
//! 2. the dependency is itself a flappy project (recursive child build with
//!    dependency processing suppressed),
//! 3. a `CMakeLists.txt` meta-build into an isolated per-profile directory,
//! 4. nothing, for a headers-only or pre-built library.
//!
//! Every sub-build runs with an injected environment exposing the compiler
//! (`CC`/`CXX`) and the include/lib directories of every previously built
//! sibling (`FLAPPY_DEP_<NAME>_INCLUDE` / `_LIB`, plus `INCLUDE`/`LIB` on
//! MSVC or `CPATH`/`LIBRARY_PATH` on GCC/Clang). The environment is a
//! snapshot of the siblings built so far; later siblings never retroactively
//! change it.

pub mod state;

use std::path::{Path, PathBuf};

use flappy_platform::Os;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::build::BuildOptions;
use crate::error::BuildError;
use crate::graph::{DependencyGraph, ResolvedNode};
use crate::manifest::Profile;
use crate::process::{self, CommandSpec};
use crate::toolchain::Family;

/// The computed result of resolving and building one dependency.
#[derive(Debug, Clone)]
pub struct DependencyMetadata {
  pub name: String,
  /// Absolute include directories to add to consumer compiles.
  pub include_dirs: Vec<PathBuf>,
  /// Directories containing link libraries, for environment injection.
  pub lib_dirs: Vec<PathBuf>,
  /// Absolute paths of libraries to pass to the linker.
  pub static_libs: Vec<PathBuf>,
  /// Absolute paths of libraries the final artifact needs next to it at runtime.
  pub runtime_libs: Vec<PathBuf>,
  /// Git commit SHA, URL hash, or `"local"`.
  pub resolved: String,
}

/// Shared inputs for building every node of one graph.
pub struct DepContext<'a> {
  pub compiler: &'a str,
  pub family: Family,
  pub profile: Profile,
  pub custom_profile: Option<String>,
  pub os: Os,
  /// Extra environment applied on top of the injected one.
  pub extra_env: &'a [(String, String)],
}

/// Build every node of `graph` leaf-first and return their metadata in the
/// same order.
pub async fn build_all(graph: &DependencyGraph, ctx: &DepContext<'_>) -> crate::Result<Vec<DependencyMetadata>> {
  let mut built: Vec<DependencyMetadata> = Vec::new();
  for node in graph.topological() {
    let mut envs = injected_env(ctx.compiler, ctx.family, ctx.os, &built);
    envs.extend(ctx.extra_env.iter().cloned());

    build_node(node, envs, ctx).await?;

    let meta = detect_metadata(node, ctx.os);
    debug!(
      name = %meta.name,
      includes = meta.include_dirs.len(),
      libs = meta.static_libs.len(),
      "dependency metadata"
    );
    built.push(meta);
  }
  Ok(built)
}

async fn build_node(node: &ResolvedNode, envs: Vec<(String, String)>, ctx: &DepContext<'_>) -> crate::Result<()> {
  if let Some(build_cmd) = &node.dep.build_cmd {
    let hash = state::state_hash(&node.resolved, build_cmd, &node.dep.defines);
    if state::is_current(&node.path, &hash) {
      info!(name = %node.name, "dependency up to date");
      return Ok(());
    }

    info!(name = %node.name, cmd = %build_cmd, "running dependency build command");
    let spec = CommandSpec::shell(build_cmd).cwd(&node.path).envs(envs);
    let output = process::run(&spec).await.map_err(|source| BuildError::Spawn {
      program: spec.program.clone(),
      source,
    })?;
    if !output.success() {
      return Err(
        BuildError::DepCommand {
          name: node.name.clone(),
          code: output.code,
          stderr: output.stderr,
        }
        .into(),
      );
    }
    state::record(&node.path, &hash).map_err(BuildError::Io)?;
    return Ok(());
  }

  if node.manifest.is_some() {
    info!(name = %node.name, "building dependency as a flappy project");
    let opts = BuildOptions {
      profile: ctx.profile,
      custom_profile: ctx.custom_profile.clone(),
      skip_deps: true,
      extra_env: envs,
    };
    crate::build::subproject(node.path.clone(), opts).await?;
    return Ok(());
  }

  if node.path.join("CMakeLists.txt").exists() {
    return cmake_build(node, envs, ctx).await;
  }

  debug!(name = %node.name, "headers-only or pre-built dependency; nothing to build");
  Ok(())
}

async fn cmake_build(node: &ResolvedNode, envs: Vec<(String, String)>, ctx: &DepContext<'_>) -> crate::Result<()> {
  let build_dir = node.path.join(format!("flappy-build-{}", ctx.profile));
  if build_dir.exists() && dir_has_library(&build_dir, ctx.os) {
    info!(name = %node.name, "cmake build already produced libraries");
    return Ok(());
  }
  std::fs::create_dir_all(&build_dir).map_err(BuildError::Io)?;

  info!(name = %node.name, "configuring with cmake");
  let configure = CommandSpec::new("cmake")
    .arg("-S")
    .arg(".")
    .arg("-B")
    .arg(build_dir.display().to_string())
    .arg(format!("-DCMAKE_BUILD_TYPE={}", ctx.profile.cmake_name()))
    .arg(format!("-DCMAKE_CXX_COMPILER={}", ctx.compiler))
    .cwd(&node.path)
    .envs(envs.clone());
  run_meta(node, &configure).await?;

  info!(name = %node.name, "building with cmake");
  let build = CommandSpec::new("cmake")
    .arg("--build")
    .arg(build_dir.display().to_string())
    .cwd(&node.path)
    .envs(envs);
  run_meta(node, &build).await?;

  Ok(())
}

async fn run_meta(node: &ResolvedNode, spec: &CommandSpec) -> crate::Result<()> {
  let output = process::run(spec).await.map_err(|source| BuildError::Spawn {
    program: spec.program.clone(),
    source,
  })?;
  if !output.success() {
    return Err(
      BuildError::MetaBuild {
        name: node.name.clone(),
        code: output.code,
        stderr: output.stderr,
      }
      .into(),
    );
  }
  Ok(())
}

/// The environment exposed to a dependency's build, computed from the
/// snapshot of already-built siblings.
pub fn injected_env(
  compiler: &str,
  family: Family,
  os: Os,
  built: &[DependencyMetadata],
) -> Vec<(String, String)> {
  let sep = os.path_list_separator();
  let mut envs = vec![
    ("CC".to_string(), compiler.to_string()),
    ("CXX".to_string(), compiler.to_string()),
  ];

  let mut all_includes: Vec<String> = Vec::new();
  let mut all_lib_dirs: Vec<String> = Vec::new();

  for meta in built {
    let tag = env_name(&meta.name);
    let includes = join_paths(&meta.include_dirs, sep);
    let lib_dirs = join_paths(&meta.lib_dirs, sep);
    all_includes.extend(meta.include_dirs.iter().map(|p| p.display().to_string()));
    all_lib_dirs.extend(meta.lib_dirs.iter().map(|p| p.display().to_string()));
    envs.push((format!("FLAPPY_DEP_{}_INCLUDE", tag), includes));
    envs.push((format!("FLAPPY_DEP_{}_LIB", tag), lib_dirs));
  }

  // Toolchains pick the sibling paths up implicitly: MSVC through
  // INCLUDE/LIB, GCC and Clang through CPATH/LIBRARY_PATH.
  let (include_var, lib_var, search_sep) = if family.is_msvc() {
    ("INCLUDE", "LIB", ';')
  } else {
    ("CPATH", "LIBRARY_PATH", ':')
  };
  envs.push((include_var.to_string(), prepend_search(include_var, &all_includes, search_sep)));
  envs.push((lib_var.to_string(), prepend_search(lib_var, &all_lib_dirs, search_sep)));

  envs
}

fn env_name(dep_name: &str) -> String {
  dep_name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_uppercase()
      } else {
        '_'
      }
    })
    .collect()
}

fn join_paths(paths: &[PathBuf], sep: char) -> String {
  paths
    .iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join(&sep.to_string())
}

fn prepend_search(var: &str, new_entries: &[String], sep: char) -> String {
  let mut value = new_entries.join(&sep.to_string());
  if let Ok(existing) = std::env::var(var)
    && !existing.is_empty()
  {
    if !value.is_empty() {
      value.push(sep);
    }
    value.push_str(&existing);
  }
  value
}

/// Compute a node's metadata after its build finished.
///
/// Explicitly declared directories are used verbatim (resolved against the
/// package directory); otherwise the standard locations `dist/include`,
/// `dist/lib`, and `include/` are tried before a recursive scan of the
/// package root.
pub fn detect_metadata(node: &ResolvedNode, os: Os) -> DependencyMetadata {
  let root = &node.path;

  let include_dirs = match &node.dep.include_dirs {
    Some(dirs) => dirs.iter().map(|d| resolve_in(root, d)).collect(),
    None => {
      let dist = root.join("dist").join("include");
      let include = root.join("include");
      if dist.is_dir() {
        vec![dist]
      } else if include.is_dir() {
        vec![include]
      } else {
        vec![root.clone()]
      }
    }
  };

  let static_libs: Vec<PathBuf>;
  let mut lib_dirs: Vec<PathBuf>;
  match (&node.dep.libs, &node.dep.lib_dirs) {
    (Some(libs), explicit_dirs) => {
      static_libs = libs.iter().map(|l| resolve_in(root, l)).collect();
      lib_dirs = match explicit_dirs {
        Some(dirs) => dirs.iter().map(|d| resolve_in(root, d)).collect(),
        None => parent_dirs(&static_libs),
      };
    }
    (None, Some(dirs)) => {
      lib_dirs = dirs.iter().map(|d| resolve_in(root, d)).collect();
      static_libs = lib_dirs.iter().flat_map(|d| scan_libs(d, os, LibKind::Static)).collect();
    }
    (None, None) => {
      let dist = root.join("dist").join("lib");
      let scan_root = if dist.is_dir() { dist } else { root.clone() };
      static_libs = scan_libs(&scan_root, os, LibKind::Static);
      lib_dirs = parent_dirs(&static_libs);
      if lib_dirs.is_empty() {
        lib_dirs = vec![scan_root];
      }
    }
  }

  let runtime_libs = lib_dirs
    .iter()
    .flat_map(|d| scan_libs(d, os, LibKind::Runtime))
    .collect();

  DependencyMetadata {
    name: node.name.clone(),
    include_dirs,
    lib_dirs,
    static_libs,
    runtime_libs,
    resolved: node.resolved.clone(),
  }
}

fn resolve_in(root: &Path, entry: &str) -> PathBuf {
  let path = Path::new(entry);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    root.join(path)
  }
}

fn parent_dirs(files: &[PathBuf]) -> Vec<PathBuf> {
  let mut dirs: Vec<PathBuf> = Vec::new();
  for file in files {
    if let Some(parent) = file.parent()
      && !dirs.iter().any(|d| d == parent)
    {
      dirs.push(parent.to_path_buf());
    }
  }
  dirs
}

#[derive(Clone, Copy)]
enum LibKind {
  Static,
  Runtime,
}

fn matches_lib(name: &str, os: Os, kind: LibKind) -> bool {
  let ext = Path::new(name).extension().and_then(|e| e.to_str()).unwrap_or("");
  match (kind, os.is_windows()) {
    (LibKind::Static, true) => ext == "lib",
    (LibKind::Static, false) => matches!(ext, "a" | "so" | "dylib"),
    (LibKind::Runtime, true) => ext == "dll",
    (LibKind::Runtime, false) => matches!(ext, "so" | "dylib"),
  }
}

fn scan_libs(dir: &Path, os: Os, kind: LibKind) -> Vec<PathBuf> {
  let mut found: Vec<PathBuf> = WalkDir::new(dir)
    .follow_links(false)
    .into_iter()
    .filter_entry(|e| e.file_name() != ".git")
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_file())
    .filter(|entry| {
      entry
        .file_name()
        .to_str()
        .is_some_and(|name| matches_lib(name, os, kind))
    })
    .map(|entry| entry.into_path())
    .collect();
  found.sort();
  found
}

fn dir_has_library(dir: &Path, os: Os) -> bool {
  !scan_libs(dir, os, LibKind::Static).is_empty()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::{Dependency, Source};
  use std::fs;
  use tempfile::TempDir;

  fn node_at(dir: &Path, dep: Dependency) -> ResolvedNode {
    ResolvedNode {
      name: dep.name.clone(),
      dep,
      path: dir.to_path_buf(),
      resolved: "local".to_string(),
      children: vec![],
      manifest: None,
    }
  }

  fn dep(name: &str) -> Dependency {
    Dependency {
      name: name.to_string(),
      source: Source::Local { path: ".".into() },
      defines: vec![],
      build_cmd: None,
      include_dirs: None,
      lib_dirs: None,
      libs: None,
      extra_dependencies: vec![],
    }
  }

  #[test]
  fn env_name_uppercases_and_sanitises() {
    assert_eq!(env_name("openssl"), "OPENSSL");
    assert_eq!(env_name("sdl2-image"), "SDL2_IMAGE");
  }

  #[test]
  fn injected_env_exposes_compiler_and_siblings() {
    let meta = DependencyMetadata {
      name: "openssl".to_string(),
      include_dirs: vec![PathBuf::from("/cache/openssl/include")],
      lib_dirs: vec![PathBuf::from("/cache/openssl/lib")],
      static_libs: vec![],
      runtime_libs: vec![],
      resolved: "abc".to_string(),
    };
    let envs = injected_env("g++", Family::Gcc, Os::Linux, &[meta]);

    let get = |name: &str| {
      envs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| panic!("missing {name}"))
    };
    assert_eq!(get("CC"), "g++");
    assert_eq!(get("CXX"), "g++");
    assert_eq!(get("FLAPPY_DEP_OPENSSL_INCLUDE"), "/cache/openssl/include");
    assert_eq!(get("FLAPPY_DEP_OPENSSL_LIB"), "/cache/openssl/lib");
    assert!(get("CPATH").starts_with("/cache/openssl/include"));
    assert!(get("LIBRARY_PATH").starts_with("/cache/openssl/lib"));
  }

  #[test]
  fn msvc_injection_uses_include_and_lib() {
    let meta = DependencyMetadata {
      name: "zlib".to_string(),
      include_dirs: vec![PathBuf::from(r"C:\cache\zlib\include")],
      lib_dirs: vec![PathBuf::from(r"C:\cache\zlib\lib")],
      static_libs: vec![],
      runtime_libs: vec![],
      resolved: "abc".to_string(),
    };
    let envs = injected_env("cl", Family::Msvc, Os::Windows, &[meta]);
    assert!(envs.iter().any(|(k, v)| k == "INCLUDE" && v.starts_with(r"C:\cache\zlib\include")));
    assert!(envs.iter().any(|(k, v)| k == "LIB" && v.starts_with(r"C:\cache\zlib\lib")));
  }

  #[test]
  fn explicit_dirs_are_used_verbatim() {
    let temp = TempDir::new().unwrap();
    let mut d = dep("raw");
    d.include_dirs = Some(vec!["inc".to_string()]);
    d.lib_dirs = Some(vec!["out".to_string()]);
    fs::create_dir_all(temp.path().join("out")).unwrap();
    fs::write(temp.path().join("out/libraw.a"), b"").unwrap();

    let meta = detect_metadata(&node_at(temp.path(), d), Os::Linux);
    assert_eq!(meta.include_dirs, vec![temp.path().join("inc")]);
    assert_eq!(meta.lib_dirs, vec![temp.path().join("out")]);
    assert_eq!(meta.static_libs, vec![temp.path().join("out/libraw.a")]);
  }

  #[test]
  fn dist_layout_is_preferred() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("dist/include")).unwrap();
    fs::create_dir_all(temp.path().join("dist/lib")).unwrap();
    fs::create_dir_all(temp.path().join("include")).unwrap();
    fs::write(temp.path().join("dist/lib/libx.a"), b"").unwrap();

    let meta = detect_metadata(&node_at(temp.path(), dep("x")), Os::Linux);
    assert_eq!(meta.include_dirs, vec![temp.path().join("dist/include")]);
    assert_eq!(meta.static_libs, vec![temp.path().join("dist/lib/libx.a")]);
  }

  #[test]
  fn headers_only_falls_back_to_package_root() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("single_header.h"), b"").unwrap();

    let meta = detect_metadata(&node_at(temp.path(), dep("hdr")), Os::Linux);
    assert_eq!(meta.include_dirs, vec![temp.path().to_path_buf()]);
    assert!(meta.static_libs.is_empty());
  }

  #[test]
  fn recursive_scan_finds_platform_libs() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("build/sub")).unwrap();
    fs::write(temp.path().join("build/sub/libdeep.a"), b"").unwrap();
    fs::write(temp.path().join("build/sub/libdeep.so"), b"").unwrap();
    fs::write(temp.path().join("build/ignore.txt"), b"").unwrap();

    let meta = detect_metadata(&node_at(temp.path(), dep("deep")), Os::Linux);
    assert_eq!(
      meta.static_libs,
      vec![temp.path().join("build/sub/libdeep.a"), temp.path().join("build/sub/libdeep.so")]
    );
    assert_eq!(meta.runtime_libs, vec![temp.path().join("build/sub/libdeep.so")]);
  }

  #[test]
  fn windows_globs_pick_lib_and_dll() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("z.lib"), b"").unwrap();
    fs::write(temp.path().join("z.dll"), b"").unwrap();
    fs::write(temp.path().join("z.a"), b"").unwrap();

    let meta = detect_metadata(&node_at(temp.path(), dep("z")), Os::Windows);
    assert_eq!(meta.static_libs, vec![temp.path().join("z.lib")]);
    assert_eq!(meta.runtime_libs, vec![temp.path().join("z.dll")]);
  }
}
