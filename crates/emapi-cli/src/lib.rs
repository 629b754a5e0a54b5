//! Email Manager command reader
//!
//! Library side of the `emapi` binary: command parsing, the persistent
//! configuration file and the session that runs commands against the
//! service.

pub mod commands;
pub mod config_manager;
pub mod session;

pub use commands::Command;
pub use config_manager::{ConfigError, ConfigManager, EmapiConfig};
pub use session::{Flow, Session};
