//! flappy-platform: host detection and well-known paths for flappy.
//!
//! This crate answers two questions for the rest of the workspace:
//! - what host are we on (operating system, CPU architecture, user)?
//! - where do flappy's global directories live (cache, config)?
//!
//! Everything else (manifests, fetching, building) lives in `flappy-core`.

mod error;
mod paths;
mod platform;

pub use error::PlatformError;
pub use paths::{cache_root, config_dir, home_dir};
pub use platform::{Arch, Os, PlatformInfo};
