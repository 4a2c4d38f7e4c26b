//! Error types for flappy-platform.

use thiserror::Error;

/// Errors that can occur in platform operations.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("unsupported operating system: {0}")]
  UnsupportedOs(String),

  #[error("unsupported architecture: {0}")]
  UnsupportedArch(String),
}
