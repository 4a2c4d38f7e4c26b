//! flappy: a Cargo-style build system and package manager for C/C++.
//!
//! Subcommands:
//! - `flappy build` - compile the project and its dependencies
//! - `flappy run` - build, then run the produced executable
//! - `flappy test` - build and run the test binary
//! - `flappy sync` - resolve dependencies and write `flappy.lock`
//! - `flappy clean` - remove build artifacts from the project tree
//! - `flappy info` - show host and cache information

mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flappy_core::Profile;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "flappy")]
#[command(author, version, about = "A build system and package manager for C/C++")]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile the current project and its dependencies
  Build {
    /// Build with the release profile
    #[arg(long)]
    release: bool,

    /// Use a named [build.<name>] sub-configuration
    #[arg(long)]
    profile: Option<String>,
  },

  /// Build, then run the produced executable
  Run {
    /// Build with the release profile
    #[arg(long)]
    release: bool,

    /// Use a named [build.<name>] sub-configuration
    #[arg(long)]
    profile: Option<String>,

    /// Arguments forwarded to the program
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
  },

  /// Build and run the test binary
  Test {
    /// Build with the release profile
    #[arg(long)]
    release: bool,

    /// Use a named [build.<name>] sub-configuration
    #[arg(long)]
    profile: Option<String>,
  },

  /// Resolve dependencies and write flappy.lock
  Sync {
    /// Resolve with the release profile's cache partition
    #[arg(long)]
    release: bool,

    /// Use a named [build.<name>] sub-configuration
    #[arg(long)]
    profile: Option<String>,
  },

  /// Remove build artifacts from the project tree
  Clean,

  /// Show host and cache information
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
  FmtSubscriber::builder()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .init();

  match cli.command {
    Commands::Build { release, profile } => cmd::cmd_build(mode(release), profile),
    Commands::Run {
      release,
      profile,
      args,
    } => cmd::cmd_run(mode(release), profile, args),
    Commands::Test { release, profile } => cmd::cmd_test(mode(release), profile),
    Commands::Sync { release, profile } => cmd::cmd_sync(mode(release), profile),
    Commands::Clean => cmd::cmd_clean(),
    Commands::Info => cmd::cmd_info(),
  }
}

fn mode(release: bool) -> Profile {
  if release { Profile::Release } else { Profile::Debug }
}
