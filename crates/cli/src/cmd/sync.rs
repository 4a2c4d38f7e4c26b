//! Implementation of the `flappy sync` command.

use std::path::Path;

use anyhow::{Context, Result};
use flappy_core::Profile;
use flappy_core::lockfile::{LOCK_FILENAME, Lockfile};

use super::build::prepare;
use crate::output;

/// Resolve the dependency graph and pin it in `flappy.lock`.
pub fn cmd_sync(profile: Profile, custom_profile: Option<String>) -> Result<()> {
  let plan = prepare(Path::new("."), profile, custom_profile)?;

  let lockfile = match &plan.graph {
    Some(graph) => Lockfile::from_graph(graph),
    None => Lockfile::default(),
  };
  lockfile.write(&plan.project_dir).context("failed to write lock file")?;

  output::print_success(&format!(
    "{} pinned {} dependencies",
    LOCK_FILENAME,
    lockfile.dependencies.len()
  ));
  Ok(())
}
