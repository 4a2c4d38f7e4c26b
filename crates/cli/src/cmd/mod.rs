mod build;
mod clean;
mod info;
mod run;
mod sync;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use info::cmd_info;
pub use run::cmd_run;
pub use sync::cmd_sync;
pub use test::cmd_test;
