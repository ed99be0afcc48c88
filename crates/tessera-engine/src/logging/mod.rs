//! Logger setup for binaries and tests.
//!
//! The engine logs through the `log` facade only; this module wires up
//! `env_logger` with thread-aware output.

mod init;

pub use init::{LoggingConfig, init_logging};
