//! Crafty Reverse Proxy: on-demand TCP proxy for game servers
//!
//! Listens on public addresses and forwards each client to a game server
//! managed by a Crafty Controller instance. A server that is off when a
//! client arrives is started through the control API; a server that has had
//! no clients for a while is stopped again.
//!
//! # Main Features
//!
//! - One listener per configured address, all sharing one control client
//! - Lock-free backend state machine driven by compare-and-swap
//! - Idle shutdown with a cancellable timer
//! - Readiness probing while a backend boots
//!
//! # Example
//!
//! ```no_run
//! use crafty_reverse_proxy::{App, CraftyClient, Result};
//! use crafty_reverse_proxy::config::{load_config, validate_config};
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_config(Path::new("config/config.yaml"), false)?;
//!     validate_config(&config)?;
//!
//!     let backend = Arc::new(CraftyClient::from_config(&config)?);
//!     App::new(config, backend).run(CancellationToken::new()).await
//! }
//! ```

// Public modules
pub mod app;
pub mod backend;
pub mod common;
pub mod config;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use app::App;
pub use backend::{BackendClient, BackendError, CraftyClient};
pub use common::{ProxyError, Result};
pub use proxy::{ConnectionState, ProxyServer, ServerSettings};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
