//! Core functionality for the EdgeGuard gateway.
//!
//! This crate provides the configuration model, structured logging setup,
//! clock abstraction and base error type shared by the EdgeGuard crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::{
    AuthConfig, Config, LicenseConfig, LoggingConfig, ServerConfig, StorageConfig,
    VerifierBackendKind, ZkpConfig,
};
pub use error::{CoreError, Result};
pub use time::{Clock, ManualClock, SystemClock};
