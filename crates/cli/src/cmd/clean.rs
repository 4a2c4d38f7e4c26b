//! Implementation of the `flappy clean` command.
//!
//! Removes artifacts the build writes into the project tree: `obj/`, the
//! `packages/` links, and `compile_commands.json`. The global dependency
//! cache is deliberately left alone.

use std::path::Path;

use anyhow::Result;

use flappy_core::build::COMPILE_DB_FILENAME;

use crate::output;

pub fn cmd_clean() -> Result<()> {
  let project = Path::new(".");
  let mut removed = 0usize;

  for dir in ["obj", "packages"] {
    let path = project.join(dir);
    if path.is_dir() {
      std::fs::remove_dir_all(&path)?;
      removed += 1;
    }
  }

  let db = project.join(COMPILE_DB_FILENAME);
  if db.is_file() {
    std::fs::remove_file(&db)?;
    removed += 1;
  }

  if removed == 0 {
    output::print_warning("nothing to clean");
  } else {
    output::print_success("cleaned build artifacts");
  }
  Ok(())
}
