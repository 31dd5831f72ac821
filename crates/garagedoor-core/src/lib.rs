//! Shared types for the garage door daemon.
//!
//! Everything here is synchronous and free of I/O except the configuration
//! loader: the derived door states, the composite status report, protocol
//! and timing constants, and the common error type.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{Config, ConfigIssue};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
