//! Application module
//!
//! Runs one [`ProxyServer`] per configured address, all sharing the same
//! backend control client, until the process is told to stop or one of them
//! fails to start.

use futures::future::join_all;
use log::{error, info};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendClient;
use crate::common::{ProxyError, Result};
use crate::config::AppConfig;
use crate::proxy::{ProxyServer, ServerSettings};

/// All proxy servers of the process
pub struct App {
    config: AppConfig,
    backend: Arc<dyn BackendClient>,
}

impl App {
    /// Create the application from a validated configuration
    pub fn new(config: AppConfig, backend: Arc<dyn BackendClient>) -> Self {
        Self { config, backend }
    }

    /// Build one proxy server per configured address
    ///
    /// Initial liveness probes run concurrently.
    pub async fn build_servers(&self) -> Vec<ProxyServer> {
        let servers = self.config.addresses.iter().map(|address| {
            let settings = ServerSettings::from_config(&self.config, address);
            ProxyServer::new(settings, Arc::clone(&self.backend))
        });
        join_all(servers).await
    }

    /// Run every proxy server until `cancel` fires
    ///
    /// # Errors
    ///
    /// The first server that fails (typically a listener that cannot be
    /// bound) cancels all the others and its error is returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let servers = self.build_servers().await;
        if servers.is_empty() {
            return Err(ProxyError::Config("no addresses to proxy".to_string()));
        }

        info!("Starting {} proxy server(s)", servers.len());

        let mut tasks = JoinSet::new();
        for server in servers {
            let cancel = cancel.clone();
            tasks.spawn(async move { server.listen_and_proxy(cancel).await });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(ProxyError::Other(format!("proxy server task failed: {}", e))),
            };

            if let Err(e) = result {
                error!("{}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                    cancel.cancel();
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("All proxy servers stopped");
                Ok(())
            }
        }
    }
}
