//! Proxy server module
//!
//! One [`ProxyServer`] fronts one backend: it owns the backend's state
//! machine and connection accounting, accepts clients on the public address
//! and hands each one to its own task.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::accounting::{ConnectionAccounting, IdleShutdown};
use super::probe::{self, ProbeSettings};
use super::state::{ConnectionState, StateMachine};
use crate::backend::BackendClient;
use crate::common::{ProxyError, Result};
use crate::config::{AddressConfig, AppConfig};

/// Settings of one proxied address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Transport protocol, for logs
    pub protocol: String,
    /// Public `host:port` to listen on
    pub listen_addr: String,
    /// Backend `host:port`
    pub target_addr: String,
    /// Port identifying the backend to the control API
    pub backend_port: u16,
    /// Idle-shutdown settings
    pub idle: IdleShutdown,
    /// Readiness probe settings
    pub probe: ProbeSettings,
    /// Copy buffer size per direction
    pub buffer_size: usize,
}

impl ServerSettings {
    /// Build the settings of `address` from the application configuration
    pub fn from_config(config: &AppConfig, address: &AddressConfig) -> Self {
        Self {
            protocol: address.protocol.to_lowercase(),
            listen_addr: address.listener.to_addr_string(),
            target_addr: address.proxy_host.to_addr_string(),
            backend_port: address.proxy_host.port,
            idle: IdleShutdown {
                enabled: config.auto_shutdown,
                timeout: config.idle_timeout(),
            },
            probe: ProbeSettings {
                dial_timeout: config.dial_timeout(),
                poll_interval: config.ready_poll_interval(),
                ready_timeout: config.ready_timeout(),
            },
            buffer_size: config.buffer_size,
        }
    }
}

/// Reverse proxy for one address
///
/// Clones share the same state machine and connection count.
#[derive(Clone)]
pub struct ProxyServer {
    pub(crate) settings: Arc<ServerSettings>,
    pub(crate) state: Arc<StateMachine>,
    pub(crate) accounting: ConnectionAccounting,
    pub(crate) backend: Arc<dyn BackendClient>,
}

impl ProxyServer {
    /// Create a proxy server
    ///
    /// The backend is probed once; the state starts as `Running` if it
    /// answers and `Off` otherwise.
    ///
    /// # Parameters
    ///
    /// * `settings` - Addresses and timings
    /// * `backend` - Shared control client
    pub async fn new(settings: ServerSettings, backend: Arc<dyn BackendClient>) -> Self {
        let state = Arc::new(StateMachine::new(ConnectionState::Off));
        if probe::is_reachable(&settings.target_addr, settings.probe.dial_timeout).await {
            state.reset(ConnectionState::Running);
        }
        info!("Backend {} initial state: {}", settings.target_addr, state.get());

        let accounting = ConnectionAccounting::new(
            Arc::clone(&state),
            Arc::clone(&backend),
            settings.backend_port,
            settings.idle,
            settings.listen_addr.clone(),
        );

        Self {
            settings: Arc::new(settings),
            state,
            accounting,
            backend,
        }
    }

    /// Settings this server was built with
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Current backend state
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Number of connections currently forwarded
    pub fn connection_count(&self) -> i64 {
        self.accounting.count()
    }

    /// Bind the public listener
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Bind`] if the address cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(&self.settings.listen_addr)
            .await
            .map_err(|source| ProxyError::Bind {
                protocol: self.settings.protocol.clone(),
                addr: self.settings.listen_addr.clone(),
                source,
            })
    }

    /// Bind the listener and proxy connections until `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener cannot be bound; per-connection
    /// failures are logged and never end the loop.
    pub async fn listen_and_proxy(&self, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, cancel).await
    }

    /// Accept connections on an already bound listener until `cancel` fires
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            "{}: reverse proxy running on {}, forwarding to {}",
            self.settings.protocol, local_addr, self.settings.target_addr
        );

        let mut tasks = JoinSet::new();

        loop {
            // Reap finished connection tasks
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Connection task error: {}", e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((client, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        let server = self.clone();
                        let cancel = cancel.clone();
                        tasks.spawn(async move {
                            if let Err(e) = server.handle_client(client, peer, &cancel).await {
                                error!("Failed to handle client {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
            }
        }

        tasks.shutdown().await;
        info!("Listener closed for {}", local_addr);
        Ok(())
    }
}
