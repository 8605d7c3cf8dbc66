//! Unified Error Handling System
//!
//! This module defines the centralized error type for the gnmd daemon. Protocol
//! errors and ADDR rejections are not part of it: both end at the connection
//! that caused them and never reach the caller of the daemon.

use thiserror::Error;

/// Enumeration of all error types in the daemon
#[derive(Error, Debug)]
pub enum GnmdError {
    /// System I/O error (sockets, log files, signal registration)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Persistence store error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Logging could not be installed
    #[error("Tracing error: {0}")]
    TracingError(String),
}

impl From<toml::de::Error> for GnmdError {
    fn from(error: toml::de::Error) -> Self {
        GnmdError::ConfigError(error.to_string())
    }
}

impl From<tracing_subscriber::util::TryInitError> for GnmdError {
    fn from(error: tracing_subscriber::util::TryInitError) -> Self {
        GnmdError::TracingError(error.to_string())
    }
}

/// Standardized result type for the entire daemon
pub type Result<T> = std::result::Result<T, GnmdError>;
