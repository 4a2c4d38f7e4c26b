use std::fmt;
use std::str::FromStr;

use crate::error::PlatformError;

/// Operating system variants flappy can target.
///
/// The string identifiers double as the platform keys recognised in
/// `flappy.toml` override tables (`[build.windows]`, `[build.linux]`,
/// `[build.macos]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Windows,
  Linux,
  MacOs,
}

impl Os {
  /// Detect the current operating system at runtime.
  ///
  /// Returns `None` if the OS is not supported.
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "windows" => Some(Self::Windows),
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      _ => None,
    }
  }

  /// Returns the lowercase manifest identifier for this OS.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::Linux => "linux",
      Self::MacOs => "macos",
    }
  }

  pub fn is_windows(&self) -> bool {
    matches!(self, Self::Windows)
  }

  /// The separator used in PATH-like environment variables on this OS.
  pub fn path_list_separator(&self) -> char {
    match self {
      Self::Windows => ';',
      _ => ':',
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "windows" => Ok(Self::Windows),
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::MacOs),
      other => Err(PlatformError::UnsupportedOs(other.to_string())),
    }
  }
}

/// CPU architecture variants flappy can target.
///
/// These are the values accepted by the manifest `arch` field; they also name
/// the per-architecture object directories (`obj/<arch>/...`) and partition
/// the global dependency cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  X86,
  X64,
  Arm64,
}

impl Arch {
  /// Detect the host CPU architecture at runtime.
  ///
  /// Returns `None` if the architecture is not supported.
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::X86),
      "x86_64" => Some(Self::X64),
      "aarch64" => Some(Self::Arm64),
      _ => None,
    }
  }

  /// Returns the lowercase manifest identifier for this architecture.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X64 => "x64",
      Self::Arm64 => "arm64",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "x86" | "i686" => Ok(Self::X86),
      "x64" | "x86_64" | "amd64" => Ok(Self::X64),
      "arm64" | "aarch64" => Ok(Self::Arm64),
      other => Err(PlatformError::UnsupportedArch(other.to_string())),
    }
  }
}

/// Host information shown by `flappy info`.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
  pub os: Option<Os>,
  pub arch: Option<Arch>,
  pub hostname: String,
  pub username: String,
}

impl PlatformInfo {
  /// Gather current host information.
  pub fn current() -> Self {
    Self {
      os: Os::current(),
      arch: Arch::current(),
      hostname: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string()),
      username: whoami::username(),
    }
  }
}
