//! The main build orchestrator.
//!
//! A build runs in two phases. [`prepare`] is synchronous: it loads the
//! manifest and resolves (fetching as needed) the dependency graph.
//! [`execute`] is async: it builds dependencies in topological order, fans
//! the project's translation units out to parallel compiler processes, links
//! or archives the result, copies runtime libraries next to the output, and
//! writes the compilation database.
//!
//! Compilation is the only concurrent region; everything else is serial.
//! A failed compile aborts the build after all in-flight tasks finish, and
//! the first failure is the one reported.

pub mod compiledb;
mod sources;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use flappy_platform::Os;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use compiledb::{COMPILE_DB_FILENAME, CompileDbEntry};

use crate::depbuild::{self, DepContext, DependencyMetadata};
use crate::error::BuildError;
use crate::fetch::FetchContext;
use crate::graph::{self, DependencyGraph};
use crate::manifest::{ConfigError, Manifest, OutputKind, Profile, ResolveOptions};
use crate::process::{self, CommandSpec};
use crate::toolchain::{self, CommandTransformer, CompileSpec, Family, LinkSpec};

/// Invocation inputs supplied by the caller (normally the CLI).
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub profile: Profile,
  pub custom_profile: Option<String>,
  /// Suppress dependency processing; used for recursive child builds whose
  /// graph was already handled by the parent.
  pub skip_deps: bool,
  /// Extra environment applied to every tool process of this build.
  pub extra_env: Vec<(String, String)>,
}

impl BuildOptions {
  pub fn new(profile: Profile) -> Self {
    Self {
      profile,
      custom_profile: None,
      skip_deps: false,
      extra_env: Vec::new(),
    }
  }
}

/// A resolved, ready-to-execute build.
pub struct BuildPlan {
  pub project_dir: PathBuf,
  pub manifest: Manifest,
  pub graph: Option<DependencyGraph>,
  pub opts: BuildOptions,
  pub os: Os,
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
  /// Absolute path of the artifact, with its platform suffix.
  pub output: PathBuf,
  /// Number of translation units actually compiled (not skipped).
  pub compiled: usize,
  /// Whether the link/archive step ran.
  pub linked: bool,
}

/// Load the manifest and resolve the dependency graph.
///
/// This is the synchronous half of a build; all network and git traffic
/// happens here, serially.
pub fn prepare(project_dir: &Path, opts: BuildOptions) -> crate::Result<BuildPlan> {
  // Work with an absolute project directory so relative paths in compile
  // commands and the compilation database resolve unambiguously.
  let project_dir = project_dir.canonicalize().unwrap_or_else(|_| project_dir.to_path_buf());

  let ropts = ResolveOptions::for_host(opts.profile, opts.custom_profile.clone())
    .ok_or(ConfigError::NoConfiguration)?;
  let manifest = Manifest::load(&project_dir, &ropts)?;

  let graph = if opts.skip_deps || manifest.dependencies.is_empty() {
    None
  } else {
    let fetch_ctx = FetchContext {
      cache_root: flappy_platform::cache_root(),
      profile: opts.profile,
      arch: manifest.build.arch,
      compiler: manifest.build.compiler.clone(),
    };
    Some(graph::resolve(&manifest, &project_dir, &fetch_ctx, &ropts)?)
  };

  Ok(BuildPlan {
    project_dir,
    manifest,
    graph,
    os: ropts.os,
    opts,
  })
}

/// Execute a prepared build.
pub async fn execute(plan: &BuildPlan) -> crate::Result<BuildOutcome> {
  Ok(execute_inner(plan).await?.outcome)
}

/// Execute a prepared build, then build and return the test binary.
///
/// Tests reuse the whole pipeline with a flat object directory under
/// `obj/test/`; when the main artifact is a static library it is linked into
/// the test binary automatically.
pub async fn execute_tests(plan: &BuildPlan) -> crate::Result<BuildOutcome> {
  let main = execute_inner(plan).await?;
  let Some(test) = &plan.manifest.test else {
    return Err(BuildError::NoTests.into());
  };

  let mut test_sources = Vec::new();
  for pattern in &test.sources {
    let full = plan.project_dir.join(pattern);
    let pattern_str = full.display().to_string();
    let matches = glob::glob(&pattern_str).map_err(|source| BuildError::BadPattern {
      pattern: pattern.clone(),
      source,
    })?;
    for path in matches.filter_map(|m| m.ok()).filter(|p| p.is_file()) {
      test_sources.push(path);
    }
  }
  test_sources.sort();

  let build = &plan.manifest.build;
  let mut defines = build.defines.clone();
  defines.extend(test.defines.iter().cloned());
  defines.extend(dependency_defines(plan));
  let mut flags = build.flags.clone();
  flags.extend(test.flags.iter().cloned());

  let prepend_libs = if build.kind == OutputKind::StaticLib {
    vec![main.outcome.output.clone()]
  } else {
    Vec::new()
  };

  let target = TargetSpec {
    sources: test_sources,
    src_root: None,
    obj_dir: Path::new("obj")
      .join("test")
      .join(build.arch.as_str())
      .join(plan.opts.profile.as_str()),
    defines,
    flags,
    output: test.output.clone(),
    kind: OutputKind::Executable,
    prepend_libs,
  };
  build_target(plan, &main.metas, main.family, main.transformer.as_ref(), &target).await
}

/// Build a dependency directory as its own flappy project.
///
/// Boxed because child builds recurse back into [`execute`] through the
/// dependency builder.
pub fn subproject(
  project_dir: PathBuf,
  opts: BuildOptions,
) -> Pin<Box<dyn Future<Output = crate::Result<BuildOutcome>> + Send>> {
  Box::pin(async move {
    let plan = prepare(&project_dir, opts)?;
    execute(&plan).await
  })
}

struct Executed {
  outcome: BuildOutcome,
  metas: Vec<DependencyMetadata>,
  family: Family,
  transformer: Box<dyn CommandTransformer>,
}

async fn execute_inner(plan: &BuildPlan) -> crate::Result<Executed> {
  let build = &plan.manifest.build;
  let family = toolchain::classify(&build.compiler);
  let transformer = toolchain::transformer_for(family, build.arch)?;

  let metas = match &plan.graph {
    Some(graph) => {
      let ctx = DepContext {
        compiler: &build.compiler,
        family,
        profile: plan.opts.profile,
        custom_profile: plan.opts.custom_profile.clone(),
        os: plan.os,
        extra_env: &plan.opts.extra_env,
      };
      let metas = depbuild::build_all(graph, &ctx).await?;
      link_packages(graph, &plan.project_dir);
      metas
    }
    None => Vec::new(),
  };

  let mut defines = build.defines.clone();
  defines.extend(dependency_defines(plan));

  let target = TargetSpec {
    sources: sources::discover(&plan.project_dir.join("src"), build.language),
    src_root: Some(plan.project_dir.join("src")),
    obj_dir: Path::new("obj").join(build.arch.as_str()).join(plan.opts.profile.as_str()),
    defines,
    flags: build.flags.clone(),
    output: build.output.clone(),
    kind: build.kind,
    prepend_libs: Vec::new(),
  };

  let outcome = build_target(plan, &metas, family, transformer.as_ref(), &target).await?;
  Ok(Executed {
    outcome,
    metas,
    family,
    transformer,
  })
}

/// Preprocessor definitions contributed by the dependency set, in
/// topological order.
fn dependency_defines(plan: &BuildPlan) -> Vec<String> {
  plan
    .graph
    .iter()
    .flat_map(|g| g.topological())
    .flat_map(|node| node.dep.defines.iter().cloned())
    .collect()
}

/// One buildable artifact: the main output or the test binary.
struct TargetSpec {
  /// Absolute source paths.
  sources: Vec<PathBuf>,
  /// Mirror object paths below this root; `None` flattens to file names.
  src_root: Option<PathBuf>,
  /// Object directory, relative to the project root.
  obj_dir: PathBuf,
  defines: Vec<String>,
  flags: Vec<String>,
  /// Output path without its platform suffix, relative to the project root.
  output: PathBuf,
  kind: OutputKind,
  /// Libraries linked before the dependency set (the main static library,
  /// for test binaries).
  prepend_libs: Vec<PathBuf>,
}

struct Unit {
  source_rel: PathBuf,
  object_rel: PathBuf,
  object_abs: PathBuf,
  spec: CommandSpec,
  is_module: bool,
  up_to_date: bool,
}

async fn build_target(
  plan: &BuildPlan,
  metas: &[DependencyMetadata],
  family: Family,
  transformer: &dyn CommandTransformer,
  target: &TargetSpec,
) -> crate::Result<BuildOutcome> {
  let build = &plan.manifest.build;
  let project_dir = &plan.project_dir;

  let suffix = toolchain::output_suffix(target.kind, family, plan.os);
  let output_rel = PathBuf::from(format!("{}{}", target.output.display(), suffix));
  let output_abs = project_dir.join(&output_rel);

  if target.sources.is_empty() {
    warn!("no source files found; nothing to build");
    return Ok(BuildOutcome {
      output: output_abs,
      compiled: 0,
      linked: false,
    });
  }

  let includes: Vec<PathBuf> = metas.iter().flat_map(|m| m.include_dirs.iter().cloned()).collect();
  let (modules, impls) = sources::split_modules(target.sources.clone(), build.language);

  let mut units = Vec::with_capacity(modules.len() + impls.len());
  for (sources, is_module) in [(&modules, true), (&impls, false)] {
    for source in sources.iter() {
      let source_rel = source
        .strip_prefix(project_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| source.clone());

      let mirrored = match &target.src_root {
        Some(root) => source.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| {
          PathBuf::from(source.file_name().expect("source files have names"))
        }),
        None => PathBuf::from(source.file_name().expect("source files have names")),
      };
      let mut object_rel = target.obj_dir.join(&mirrored);
      let object_name = format!(
        "{}.{}",
        object_rel.file_name().expect("object paths have names").to_string_lossy(),
        family.object_extension()
      );
      object_rel.set_file_name(object_name);
      let object_abs = project_dir.join(&object_rel);

      let spec = toolchain::compile_command(&CompileSpec {
        family,
        compiler: &build.compiler,
        profile: plan.opts.profile,
        arch: build.arch,
        language: build.language,
        standard: &build.standard,
        includes: &includes,
        defines: &target.defines,
        flags: &target.flags,
        source: &source_rel,
        object: &object_rel,
      })
      .cwd(project_dir)
      .envs(plan.opts.extra_env.iter().cloned());
      let spec = transformer.transform(spec);

      let up_to_date = match (mtime(&object_abs), mtime(source)) {
        (Some(object), Some(source)) => object >= source,
        _ => false,
      };

      units.push(Unit {
        source_rel,
        object_rel,
        object_abs,
        spec,
        is_module,
        up_to_date,
      });
    }
  }

  let db_entries: Vec<CompileDbEntry> = units
    .iter()
    .map(|unit| CompileDbEntry {
      directory: project_dir.clone(),
      command: unit.spec.command_line(),
      file: project_dir.join(&unit.source_rel),
    })
    .collect();

  let parallelism = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
  let semaphore = Arc::new(Semaphore::new(parallelism));

  // Module interface units must finish before any implementation unit starts.
  let mut compiled = compile_phase(&units, true, family, &semaphore).await?;
  compiled += compile_phase(&units, false, family, &semaphore).await?;

  if let Some(parent) = output_abs.parent() {
    std::fs::create_dir_all(parent).map_err(BuildError::Io)?;
  }

  let newest_object = units.iter().filter_map(|u| mtime(&u.object_abs)).max();
  let link_needed = match (mtime(&output_abs), newest_object) {
    (Some(output), Some(newest)) => output <= newest,
    _ => true,
  };

  if link_needed {
    let objects: Vec<PathBuf> = units.iter().map(|u| u.object_rel.clone()).collect();
    let mut libs: Vec<PathBuf> = target.prepend_libs.clone();
    libs.extend(metas.iter().flat_map(|m| m.static_libs.iter().cloned()));

    info!(output = %output_rel.display(), "linking");
    let spec = toolchain::link_command(&LinkSpec {
      family,
      compiler: &build.compiler,
      profile: plan.opts.profile,
      arch: build.arch,
      kind: target.kind,
      objects: &objects,
      libs: &libs,
      output: &output_rel,
    })
    .cwd(project_dir)
    .envs(plan.opts.extra_env.iter().cloned());
    let spec = transformer.transform(spec);

    let output = process::run(&spec).await.map_err(|source| BuildError::Spawn {
      program: spec.program.clone(),
      source,
    })?;
    if !output.success() {
      return Err(
        BuildError::Link {
          output: output_rel,
          code: output.code,
          stderr: pick_diagnostics(family, &output.stdout, &output.stderr),
        }
        .into(),
      );
    }
  } else {
    debug!(output = %output_rel.display(), "output up to date; skipping link");
  }

  if matches!(target.kind, OutputKind::Executable | OutputKind::SharedLib) {
    copy_runtime_libs(metas, &output_abs)?;
  }

  compiledb::write(project_dir, &db_entries).map_err(BuildError::Io)?;

  Ok(BuildOutcome {
    output: output_abs,
    compiled,
    linked: link_needed,
  })
}

async fn compile_phase(
  units: &[Unit],
  modules: bool,
  family: Family,
  semaphore: &Arc<Semaphore>,
) -> crate::Result<usize> {
  let mut join: JoinSet<Result<(), BuildError>> = JoinSet::new();

  for unit in units.iter().filter(|u| u.is_module == modules) {
    if unit.up_to_date {
      debug!(source = %unit.source_rel.display(), "object up to date; skipping");
      continue;
    }

    let spec = unit.spec.clone();
    let source_rel = unit.source_rel.clone();
    let object_abs = unit.object_abs.clone();
    let semaphore = semaphore.clone();

    join.spawn(async move {
      let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");

      if let Some(parent) = object_abs.parent() {
        std::fs::create_dir_all(parent)?;
      }

      info!(source = %source_rel.display(), "compiling");
      let output = process::run(&spec).await.map_err(|source| BuildError::Spawn {
        program: spec.program.clone(),
        source,
      })?;
      if !output.success() {
        return Err(BuildError::Compile {
          file: source_rel,
          code: output.code,
          stderr: pick_diagnostics(family, &output.stdout, &output.stderr),
        });
      }
      Ok(())
    });
  }

  // Join everything before reporting: a failure does not cancel the tasks
  // already in flight, their results are simply ignored.
  let mut compiled = 0;
  let mut first_failure: Option<BuildError> = None;
  while let Some(joined) = join.join_next().await {
    match joined {
      Ok(Ok(())) => compiled += 1,
      Ok(Err(err)) => {
        if first_failure.is_none() {
          first_failure = Some(err);
        }
      }
      Err(join_err) => {
        if first_failure.is_none() {
          first_failure = Some(BuildError::Io(std::io::Error::other(join_err)));
        }
      }
    }
  }

  match first_failure {
    Some(err) => Err(err.into()),
    None => Ok(compiled),
  }
}

/// MSVC prints diagnostics on stdout behind a banner; everyone else uses
/// stderr.
fn pick_diagnostics(family: Family, stdout: &str, stderr: &str) -> String {
  if family.is_msvc() && stderr.trim().is_empty() {
    toolchain::msvc::scrub_banner(stdout)
  } else {
    stderr.to_string()
  }
}

/// Copy every runtime library from the dependency set next to the output,
/// when absent or older than its source.
fn copy_runtime_libs(metas: &[DependencyMetadata], output_abs: &Path) -> crate::Result<()> {
  let Some(out_dir) = output_abs.parent() else {
    return Ok(());
  };

  for lib in metas.iter().flat_map(|m| m.runtime_libs.iter()) {
    let Some(name) = lib.file_name() else { continue };
    let dest = out_dir.join(name);
    let stale = match (mtime(&dest), mtime(lib)) {
      (Some(dest), Some(src)) => dest < src,
      _ => true,
    };
    if stale {
      std::fs::copy(lib, &dest).map_err(BuildError::Io)?;
      debug!(lib = %lib.display(), "copied runtime library");
    }
  }
  Ok(())
}

/// Point `packages/<name>` at each dependency's source directory.
///
/// The links are a navigation convenience, not a correctness requirement, so
/// failure to create one is a warning.
fn link_packages(graph: &DependencyGraph, project_dir: &Path) {
  let dir = project_dir.join("packages");
  if let Err(err) = std::fs::create_dir_all(&dir) {
    warn!(error = %err, "could not create packages directory");
    return;
  }

  for node in graph.topological() {
    let link = dir.join(&node.name);
    if link.symlink_metadata().is_ok() {
      std::fs::remove_file(&link).ok();
    }
    if let Err(err) = make_link(&node.path, &link) {
      warn!(name = %node.name, error = %err, "could not link package directory");
    }
  }
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_link(target: &Path, link: &Path) -> std::io::Result<()> {
  std::os::windows::fs::symlink_dir(target, link)
}

fn mtime(path: &Path) -> Option<SystemTime> {
  std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
