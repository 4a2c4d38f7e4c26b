//! Compilation database generation.
//!
//! Emits `compile_commands.json` at the project root: one
//! `{directory, command, file}` record per translation unit, with `command`
//! byte-identical to the invocation the orchestrator runs (including the
//! MSVC environment shim when applicable).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const COMPILE_DB_FILENAME: &str = "compile_commands.json";

/// One translation-unit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileDbEntry {
  /// The working directory for the compilation.
  pub directory: PathBuf,
  /// The full compile command as one shell-style line.
  pub command: String,
  /// The source file.
  pub file: PathBuf,
}

/// Write the database to `<project_dir>/compile_commands.json`.
pub fn write(project_dir: &Path, entries: &[CompileDbEntry]) -> std::io::Result<()> {
  let json = serde_json::to_string_pretty(entries).map_err(std::io::Error::other)?;
  std::fs::write(project_dir.join(COMPILE_DB_FILENAME), json)
}
