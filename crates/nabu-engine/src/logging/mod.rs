//! Logging utilities.
//!
//! Centralizes logger initialization so binaries and tests configure the
//! `log` facade the same way. The engine itself only ever logs through
//! `log::...` macros.

mod init;

pub use init::{LoggingConfig, init_logging};
