//! Lock file management.
//!
//! `flappy.lock` pins every resolved dependency as a `[[dependencies]]`
//! entry of `{name, source, resolved}`. It is produced by `flappy sync`;
//! the build itself does not consume it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::graph::DependencyGraph;

/// Lock file name, written next to the manifest.
pub const LOCK_FILENAME: &str = "flappy.lock";

#[derive(Debug, Error)]
pub enum LockfileError {
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid lock file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// One pinned dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
  pub name: String,
  /// The declared source, in display form (`git+<url>#<tag>`, `http+<url>`,
  /// or `path+<dir>`).
  pub source: String,
  /// Git commit SHA, URL hash, or `"local"`.
  pub resolved: String,
}

/// The whole lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
  pub dependencies: Vec<LockedDependency>,
}

impl Lockfile {
  /// Pin every node of a resolved graph, leaf-first.
  pub fn from_graph(graph: &DependencyGraph) -> Self {
    Self {
      dependencies: graph
        .topological()
        .map(|node| LockedDependency {
          name: node.name.clone(),
          source: node.dep.source.to_string(),
          resolved: node.resolved.clone(),
        })
        .collect(),
    }
  }

  /// Write `<project_dir>/flappy.lock`.
  pub fn write(&self, project_dir: &Path) -> Result<(), LockfileError> {
    let path = project_dir.join(LOCK_FILENAME);
    let text = toml::to_string_pretty(self).expect("lock entries always serialise");
    std::fs::write(&path, text).map_err(|source| LockfileError::Write {
      path: path.clone(),
      source,
    })?;
    info!(path = %path.display(), entries = self.dependencies.len(), "lock file written");
    Ok(())
  }

  /// Read `<project_dir>/flappy.lock`.
  pub fn load(project_dir: &Path) -> Result<Self, LockfileError> {
    let path = project_dir.join(LOCK_FILENAME);
    let text = std::fs::read_to_string(&path).map_err(|source| LockfileError::Read {
      path: path.clone(),
      source,
    })?;
    toml::from_str(&text).map_err(|source| LockfileError::Parse { path, source })
  }
}
