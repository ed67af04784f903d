//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;
use std::time::Duration;

use crate::backend::BackendError;
use crate::proxy::ConnectionState;

/// Crafty reverse proxy error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The listener could not be bound; fatal for the whole process
    #[error("Error starting {protocol} server on {addr}: {source}")]
    Bind {
        /// Transport protocol of the listener
        protocol: String,
        /// Address the listener tried to bind
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// The control API refused or failed a start/stop request
    #[error("Backend control error: {0}")]
    Backend(#[from] BackendError),

    /// The backend did not become reachable in time
    #[error("Timeout reached after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    /// A running backend stopped answering
    #[error("Backend {addr} unreachable: {source}")]
    Unreachable {
        /// Backend address
        addr: String,
        /// Dial error
        #[source]
        source: io::Error,
    },

    /// The state moved under the connection and traffic may not flow
    #[error("Cannot switch state, server is {0}")]
    StateChanged(ConnectionState),

    /// Process-level shutdown interrupted the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
