//! Implementation of the `flappy run` command.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use flappy_core::Profile;

use super::build::run_build;
use crate::output;

/// Build the project, then run the produced executable with `args`.
pub fn cmd_run(profile: Profile, custom_profile: Option<String>, args: Vec<String>) -> Result<()> {
  let outcome = run_build(Path::new("."), profile, custom_profile)?;
  if !outcome.output.is_file() {
    bail!("build produced no runnable output at {}", outcome.output.display());
  }

  println!("{} {}", output::symbols::ARROW, outcome.output.display());
  let status = Command::new(&outcome.output)
    .args(&args)
    .status()
    .with_context(|| format!("failed to run {}", outcome.output.display()))?;

  if !status.success() {
    std::process::exit(status.code().unwrap_or(1));
  }
  Ok(())
}
