//! debugwire-utils: Common utilities shared across debugwire crates
//!
//! This crate provides:
//! - Unified error types ([`DebugwireError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - Config file loading ([`config`] module)
//! - XDG-compliant path utilities ([`paths`] module)

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{DebugwireError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};

pub use paths::{config_dir, config_file, log_dir, state_dir};
