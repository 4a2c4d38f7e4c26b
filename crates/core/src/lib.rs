//! flappy-core: manifest resolution, dependency graphs, and build
//! orchestration for the flappy C/C++ build system.
//!
//! The crate is organised around the path a `flappy build` takes:
//!
//! - [`manifest`]: parse `flappy.toml` and resolve its hierarchical
//!   base/mode/profile/platform overrides into an effective configuration.
//! - [`fetch`]: materialise dependency sources (git, http, local) in the
//!   profile-partitioned global cache.
//! - [`graph`]: walk the transitive dependency tree, detecting cycles and
//!   source conflicts, and produce a leaf-first build order.
//! - [`depbuild`]: build each resolved node with its chosen strategy and an
//!   injected environment.
//! - [`build`]: compile the project's translation units in parallel, link or
//!   archive, copy runtime artifacts, and emit the compilation database.
//! - [`toolchain`]: compiler-family classification, flag syntax, and the
//!   MSVC developer-environment shim.
//!
//! The CLI in `flappy-cli` is a thin layer over [`build::prepare`],
//! [`build::execute`], and [`lockfile`].

pub mod build;
pub mod depbuild;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod lockfile;
pub mod manifest;
pub mod process;
pub mod toolchain;

pub use error::{BuildError, Error, Result};
pub use manifest::{Manifest, Profile};
