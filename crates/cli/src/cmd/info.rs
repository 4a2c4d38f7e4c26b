//! Implementation of the `flappy info` command.

use anyhow::Result;
use flappy_platform::{PlatformInfo, cache_root};

pub fn cmd_info() -> Result<()> {
  let info = PlatformInfo::current();

  let os = info.os.map(|o| o.to_string()).unwrap_or_else(|| "unsupported".to_string());
  let arch = info.arch.map(|a| a.to_string()).unwrap_or_else(|| "unsupported".to_string());

  println!("flappy {}", env!("CARGO_PKG_VERSION"));
  println!("  platform:   {}-{}", arch, os);
  println!("  host:       {}@{}", info.username, info.hostname);
  println!("  cache root: {}", cache_root().display());
  Ok(())
}
