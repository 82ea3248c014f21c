//! Shared plumbing for quire binaries.

pub mod config;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use config::{ConfigError, FileStore, Loader, Saver, substitute_env};
