//! Well-known directories for flappy's global state.
//!
//! The dependency cache lives under the per-user cache directory:
//! `%APPDATA%\flappy\cache` on Windows, `$XDG_CACHE_HOME/flappy/cache`
//! (falling back to `$HOME/.cache/flappy/cache`) elsewhere.

use std::path::PathBuf;

const APP_NAME: &str = "flappy";

/// Returns the user's home directory.
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory.
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for configuration files for the application.
#[cfg(windows)]
pub fn config_dir() -> PathBuf {
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME)
}

/// Returns the directory for configuration files for the application.
#[cfg(not(windows))]
pub fn config_dir() -> PathBuf {
  let config_home = std::env::var("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".config"));
  config_home.join(APP_NAME)
}

/// Returns the root of the global dependency cache.
#[cfg(windows)]
pub fn cache_root() -> PathBuf {
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME).join("cache")
}

/// Returns the root of the global dependency cache.
#[cfg(not(windows))]
pub fn cache_root() -> PathBuf {
  let cache_home = std::env::var("XDG_CACHE_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".cache"));
  cache_home.join(APP_NAME).join("cache")
}
