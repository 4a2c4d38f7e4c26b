//! Dependency fetching and the global content cache.
//!
//! A fetch request maps a [`Dependency`] to an absolute on-disk directory.
//! Remote sources land in the global cache under a key that partitions by
//! profile, architecture, and compiler, which keeps Debug and Release (and
//! cross-compiler) artifacts ABI-isolated:
//!
//! ```text
//! <cache_root>/<name>@<version_or_HEAD>_<url_fnv1a32>_<profile>_<arch>_<safe_compiler>/
//! ```
//!
//! Local sources bypass the cache entirely. A fetch into an already-populated
//! cache directory is a no-op, which is also what makes concurrent
//! invocations on a shared cache tolerable.

mod git;
mod http;

use std::path::{Path, PathBuf};

use flappy_platform::Arch;
use thiserror::Error;
use tracing::{debug, info};

use crate::manifest::{Dependency, Profile, Source};

/// Errors raised while materialising dependency sources.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("failed to create cache directory '{path}': {source}")]
  CreateCacheDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to run git (is it installed?): {0}")]
  GitSpawn(#[source] std::io::Error),

  #[error("failed to clone '{url}':\n{stderr}")]
  Clone { url: String, stderr: String },

  #[error("failed to checkout '{tag}':\n{stderr}")]
  Checkout { tag: String, stderr: String },

  #[error("failed to read HEAD commit:\n{stderr}")]
  RevParse { stderr: String },

  #[error("http request for '{url}' failed: {source}")]
  Http {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("http request for '{url}' returned status {status}")]
  HttpStatus { url: String, status: u16 },

  #[error("failed to write '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("local dependency path does not exist: {0}")]
  LocalNotFound(PathBuf),

  #[error("failed to resolve path '{path}': {source}")]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Cache partition inputs for one invocation.
#[derive(Debug, Clone)]
pub struct FetchContext {
  pub cache_root: PathBuf,
  pub profile: Profile,
  pub arch: Arch,
  pub compiler: String,
}

/// A materialised dependency source tree.
#[derive(Debug, Clone)]
pub struct Fetched {
  /// Absolute directory containing the sources.
  pub path: PathBuf,
  /// Git commit SHA, URL hash, or the literal `"local"`.
  pub resolved: String,
}

/// Fetch one dependency, reusing the cache when possible.
pub fn fetch(dep: &Dependency, project_dir: &Path, ctx: &FetchContext) -> Result<Fetched, FetchError> {
  match &dep.source {
    Source::Local { path } => {
      let full = if path.is_absolute() {
        path.clone()
      } else {
        project_dir.join(path)
      };
      if !full.exists() {
        return Err(FetchError::LocalNotFound(full));
      }
      let path = full.canonicalize().map_err(|source| FetchError::Canonicalize {
        path: full.clone(),
        source,
      })?;
      debug!(name = %dep.name, path = %path.display(), "using local dependency");
      Ok(Fetched {
        path,
        resolved: "local".to_string(),
      })
    }

    Source::Git { url, tag } => {
      let dir = ctx.cache_root.join(cache_key(&dep.name, &dep.source, ctx));
      if dir.join(".git").exists() {
        debug!(name = %dep.name, path = %dir.display(), "git dependency already cached");
      } else {
        ensure_cache_root(&ctx.cache_root)?;
        info!(name = %dep.name, url, "cloning dependency");
        git::clone(url, &dir)?;
        if let Some(tag) = tag {
          git::checkout(&dir, tag)?;
        }
      }
      let resolved = git::head_commit(&dir)?;
      Ok(Fetched { path: dir, resolved })
    }

    Source::Http { url } => {
      let dir = ctx.cache_root.join(cache_key(&dep.name, &dep.source, ctx));
      let resolved = format!("{:08x}", fnv1a32(url));
      if dir.exists() {
        debug!(name = %dep.name, path = %dir.display(), "http dependency already cached");
        return Ok(Fetched { path: dir, resolved });
      }
      std::fs::create_dir_all(&dir).map_err(|source| FetchError::CreateCacheDir {
        path: dir.clone(),
        source,
      })?;
      info!(name = %dep.name, url, "downloading dependency");
      if let Err(err) = http::download(url, &dir, &dep.name) {
        // Do not leave a half-populated cache entry behind; the existence
        // check above would treat it as complete on the next run.
        std::fs::remove_dir_all(&dir).ok();
        return Err(err);
      }
      Ok(Fetched { path: dir, resolved })
    }
  }
}

fn ensure_cache_root(root: &Path) -> Result<(), FetchError> {
  std::fs::create_dir_all(root).map_err(|source| FetchError::CreateCacheDir {
    path: root.to_path_buf(),
    source,
  })
}

/// The cache directory name for a remote dependency.
pub fn cache_key(name: &str, source: &Source, ctx: &FetchContext) -> String {
  let (url, version) = match source {
    Source::Git { url, tag } => (url.as_str(), tag.as_deref().unwrap_or("HEAD")),
    Source::Http { url } => (url.as_str(), "HEAD"),
    Source::Local { .. } => ("", "local"),
  };
  format!(
    "{}@{}_{:08x}_{}_{}_{}",
    name,
    version,
    fnv1a32(url),
    ctx.profile,
    ctx.arch,
    safe_compiler(&ctx.compiler)
  )
}

/// 32-bit FNV-1a, used to fold dependency URLs into cache keys.
pub fn fnv1a32(data: &str) -> u32 {
  const OFFSET_BASIS: u32 = 0x811c_9dc5;
  const PRIME: u32 = 0x0100_0193;

  let mut hash = OFFSET_BASIS;
  for byte in data.as_bytes() {
    hash ^= u32::from(*byte);
    hash = hash.wrapping_mul(PRIME);
  }
  hash
}

/// The compiler's file name with unsafe bytes replaced, so it can be part of
/// a directory name even when configured as an absolute path.
fn safe_compiler(compiler: &str) -> String {
  let file = compiler
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or(compiler);
  file
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+') {
        c
      } else {
        '-'
      }
    })
    .collect()
}
