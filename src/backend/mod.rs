//! Backend control module
//!
//! A backend is the game server process behind a listen address. The proxy
//! never manages the process itself; it asks a control service to start or
//! stop the backend listening on a given port.

mod crafty;
mod models;

pub use crafty::CraftyClient;
pub use models::{ServerEntry, ServerList};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Failures reported by a [`BackendClient`]
#[derive(Error, Debug)]
pub enum BackendError {
    /// Login against the control API failed
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The list of managed servers could not be fetched
    #[error("failed to get servers: {0}")]
    BackendListUnavailable(String),

    /// No managed server listens on the requested port
    #[error("no such server with port {0}")]
    NoSuchBackend(u16),

    /// The start action was not accepted
    #[error("failed to start server, id {id}, port {port}: {reason}")]
    StartRequestFailed {
        /// Control API server id
        id: String,
        /// Backend port
        port: u16,
        /// Transport or status error
        reason: String,
    },

    /// The stop action was not accepted
    #[error("failed to stop server, id {id}, port {port}: {reason}")]
    StopRequestFailed {
        /// Control API server id
        id: String,
        /// Backend port
        port: u16,
        /// Transport or status error
        reason: String,
    },
}

/// Capability to start and stop the backend listening on a port
///
/// Implementations are shared between every proxy server of the process and
/// must be callable from any task.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Ask the control service to start the backend listening on `port`
    async fn start_backend(&self, port: u16) -> Result<(), BackendError>;

    /// Ask the control service to stop the backend listening on `port`
    async fn stop_backend(&self, port: u16) -> Result<(), BackendError>;
}
