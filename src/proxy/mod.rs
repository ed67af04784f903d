//! Proxy service module
//!
//! This module implements the on-demand reverse proxy: the backend state
//! machine, connection accounting with idle shutdown, readiness probing and
//! data forwarding.

pub mod accounting;
pub mod forwarder;
pub mod probe;
pub mod server;
pub mod state;
mod handler;

pub use accounting::{ConnectionAccounting, ConnectionGuard, IdleShutdown};
pub use forwarder::{proxy_data, ForwardStats};
pub use probe::ProbeSettings;
pub use server::{ProxyServer, ServerSettings};
pub use state::{ConnectionState, StateMachine};
