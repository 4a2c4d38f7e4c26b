//! Crate-level error type for flappy-core.
//!
//! Each subsystem defines its own error enum next to its implementation
//! (`ManifestError`, `ConfigError`, `FetchError`, `GraphError`, `BuildError`);
//! this module aggregates them so callers can use one `Result` alias.

use thiserror::Error;

/// Result type for flappy-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Any fatal error the core can surface to the caller.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Manifest(#[from] crate::manifest::ManifestError),

  #[error(transparent)]
  Config(#[from] crate::manifest::ConfigError),

  #[error(transparent)]
  Fetch(#[from] crate::fetch::FetchError),

  #[error(transparent)]
  Graph(#[from] crate::graph::GraphError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors raised while building dependencies or the main artifact.
#[derive(Debug, Error)]
pub enum BuildError {
  /// A compiler child process exited non-zero.
  #[error("failed to compile {file} (exit code {code:?}):\n{stderr}")]
  Compile {
    file: std::path::PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  /// The linker or archiver exited non-zero.
  #[error("failed to link {output} (exit code {code:?}):\n{stderr}")]
  Link {
    output: std::path::PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  /// A dependency's custom build command exited non-zero.
  #[error("build command for dependency '{name}' failed (exit code {code:?}):\n{stderr}")]
  DepCommand {
    name: String,
    code: Option<i32>,
    stderr: String,
  },

  /// An external meta-build (cmake) exited non-zero.
  #[error("cmake build for dependency '{name}' failed (exit code {code:?}):\n{stderr}")]
  MetaBuild {
    name: String,
    code: Option<i32>,
    stderr: String,
  },

  /// A tool process could not be spawned at all.
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The MSVC developer environment could not be bootstrapped.
  #[error("toolchain bootstrap failed: {0}")]
  Bootstrap(String),

  /// `flappy test` was invoked on a manifest without a `[test]` table.
  #[error("manifest has no [test] table")]
  NoTests,

  /// A `[test]` source glob failed to parse.
  #[error("invalid test source pattern '{pattern}': {source}")]
  BadPattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
