//! Implementation of the `flappy build` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use flappy_core::Profile;
use flappy_core::build::{self, BuildOptions, BuildOutcome};
use tracing::debug;

use crate::output;

/// Prepare and execute a build of the project in the current directory.
pub fn cmd_build(profile: Profile, custom_profile: Option<String>) -> Result<()> {
  let started = Instant::now();
  let outcome = run_build(Path::new("."), profile, custom_profile)?;

  let summary = if outcome.compiled == 0 && !outcome.linked {
    format!("{} is up to date", outcome.output.display())
  } else {
    format!(
      "built {} ({} compiled) in {}",
      outcome.output.display(),
      outcome.compiled,
      output::format_duration(started.elapsed())
    )
  };
  output::print_success(&summary);
  Ok(())
}

/// Shared build driver for `build`, `run`, and `test`.
pub(crate) fn run_build(project_dir: &Path, profile: Profile, custom_profile: Option<String>) -> Result<BuildOutcome> {
  let plan = prepare(project_dir, profile, custom_profile)?;
  let rt = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
  rt.block_on(build::execute(&plan)).context("build failed")
}

pub(crate) fn prepare(
  project_dir: &Path,
  profile: Profile,
  custom_profile: Option<String>,
) -> Result<build::BuildPlan> {
  let mut opts = BuildOptions::new(profile);
  opts.custom_profile = custom_profile;

  let plan = build::prepare(project_dir, opts).context("failed to prepare build")?;
  if !plan.manifest.build.profile_defined {
    debug!("no platform- or profile-specific [build] table matched; using base configuration");
  }
  Ok(plan)
}
