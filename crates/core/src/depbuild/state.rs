//! Incremental state for dependency builds.
//!
//! A dependency with a custom build command gets a `.flappy_build_state` file
//! in its source directory holding one hex SHA-256 over
//! `(git_commit, build_cmd, defines)`. When the stored hash matches the
//! current inputs the build command is skipped.

use std::path::Path;

use sha2::{Digest, Sha256};

pub const STATE_FILENAME: &str = ".flappy_build_state";

/// Hash of everything that should force a dependency rebuild when it changes.
pub fn state_hash(resolved: &str, build_cmd: &str, defines: &[String]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(resolved.as_bytes());
  hasher.update([0]);
  hasher.update(build_cmd.as_bytes());
  hasher.update([0]);
  for define in defines {
    hasher.update(define.as_bytes());
    hasher.update([0]);
  }
  hex::encode(hasher.finalize())
}

/// True when the stored state matches `hash`.
pub fn is_current(dir: &Path, hash: &str) -> bool {
  std::fs::read_to_string(dir.join(STATE_FILENAME))
    .map(|stored| stored.trim() == hash)
    .unwrap_or(false)
}

/// Overwrite the stored state after a successful build.
pub fn record(dir: &Path, hash: &str) -> std::io::Result<()> {
  std::fs::write(dir.join(STATE_FILENAME), hash)
}
