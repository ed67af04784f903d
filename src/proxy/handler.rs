//! Connection handler module
//!
//! Turns one accepted client into a forwarded connection: find or start the
//! backend according to the current state, then proxy bytes until both
//! directions are done.

use log::{debug, info, warn};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::accounting::ConnectionGuard;
use super::forwarder::proxy_data;
use super::probe;
use super::server::ProxyServer;
use super::state::ConnectionState;
use crate::common::{ProxyError, Result};

impl ProxyServer {
    /// Handle a single client connection
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` once the connection has been forwarded and both
    /// directions have finished, otherwise the reason no backend connection
    /// could be obtained.
    pub(crate) async fn handle_client(
        &self,
        client: TcpStream,
        peer: SocketAddr,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (backend, _guard) = loop {
            let backend = self.connect_or_start(cancel).await?;
            if let Some(guard) = self.admit() {
                break (backend, guard);
            }
            debug!("Backend with port {} is going down, retrying for {}", self.settings.backend_port, peer);
        };

        info!("Starting proxy from {} to {}", peer, self.settings.target_addr);
        if let Err(e) = client.set_nodelay(true).and(backend.set_nodelay(true)) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let stats = proxy_data(client, backend, self.settings.buffer_size).await;

        info!(
            "Proxying from {} to {} completed ({} bytes sent, {} bytes received)",
            peer, self.settings.target_addr, stats.client_to_backend, stats.backend_to_client
        );
        Ok(())
    }

    /// Count a connection whose backend stream is already open
    ///
    /// Counting takes the accounting lock, so an idle shutdown that was
    /// claiming the backend has finished its claim by the time the state is
    /// read here. Returns `None` when the backend is no longer `Running`; the
    /// stream obtained before is then stale.
    pub(crate) fn admit(&self) -> Option<ConnectionGuard> {
        let guard = self.accounting.track();
        match self.state.get() {
            ConnectionState::Running => Some(guard),
            _ => None,
        }
    }

    /// Obtain a backend connection, starting the backend if needed
    pub(crate) async fn connect_or_start(&self, cancel: &CancellationToken) -> Result<TcpStream> {
        let deadline = Instant::now() + self.settings.probe.ready_timeout;

        loop {
            let state = self.state.get();
            match state {
                ConnectionState::Off => {
                    if !self.state.transition_from(ConnectionState::Off, ConnectionState::StartingUp) {
                        debug!("Another connection is starting the backend, re-reading state");
                        continue;
                    }
                    self.start_backend(cancel).await?;
                }
                ConnectionState::ShuttingDown => {
                    if Instant::now() >= deadline {
                        return Err(ProxyError::Timeout(
                            self.settings.probe.ready_timeout,
                            self.settings.target_addr.clone(),
                        ));
                    }
                    info!("Backend with port {} is shutting down, waiting to start it again", self.settings.backend_port);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
                        _ = tokio::time::sleep(self.settings.probe.poll_interval) => {}
                    }
                }
                ConnectionState::StartingUp => return self.await_startup(cancel).await,
                ConnectionState::Running | ConnectionState::Empty => return self.connect_warm(state).await,
            }
        }
    }

    /// Issue the start request; the caller has already moved the state to `StartingUp`
    async fn start_backend(&self, cancel: &CancellationToken) -> Result<()> {
        let port = self.settings.backend_port;
        info!("Backend is not running. Starting backend with port {}", port);
        metrics::counter!("proxy_backend_start_requests_total", "port" => port.to_string()).increment(1);

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ProxyError::Cancelled),
            result = self.backend.start_backend(port) => result.map_err(ProxyError::from),
        };

        if result.is_err() {
            self.state.compare_and_reset(ConnectionState::StartingUp, ConnectionState::Off);
        }
        result
    }

    async fn await_startup(&self, cancel: &CancellationToken) -> Result<TcpStream> {
        match probe::await_ready(&self.settings.target_addr, &self.settings.probe, cancel).await {
            Ok(stream) => {
                if !self.state.transition_from(ConnectionState::StartingUp, ConnectionState::Running) {
                    debug!("Backend already marked {}", self.state.get());
                }
                Ok(stream)
            }
            Err(e @ ProxyError::Timeout(..)) => {
                // Let the next connection retry the start instead of waiting again
                self.state.compare_and_reset(ConnectionState::StartingUp, ConnectionState::Off);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn connect_warm(&self, observed: ConnectionState) -> Result<TcpStream> {
        let target = &self.settings.target_addr;
        match probe::dial(target, self.settings.probe.dial_timeout).await {
            Ok(stream) => {
                if observed == ConnectionState::Empty
                    && !self.state.transition_from(ConnectionState::Empty, ConnectionState::Running)
                {
                    let now = self.state.get();
                    if now != ConnectionState::Running {
                        return Err(ProxyError::StateChanged(now));
                    }
                }
                Ok(stream)
            }
            Err(source) => {
                warn!("Backend {} stopped answering: {}", target, source);
                self.state.compare_and_reset(observed, ConnectionState::Off);
                Err(ProxyError::Unreachable {
                    addr: target.clone(),
                    source,
                })
            }
        }
    }
}
