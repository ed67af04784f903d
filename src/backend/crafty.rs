//! Crafty Controller API client
//!
//! Every call logs in, lists the managed servers, picks the one listening on
//! the requested port and posts the server action.

use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;

use super::models::{LoginPayload, LoginResponse, ServerEntry, ServerList};
use super::{BackendClient, BackendError};
use crate::common::{ProxyError, Result};
use crate::config::AppConfig;

const LOGIN_PATH: &str = "/api/v2/auth/login";
const SERVERS_PATH: &str = "/api/v2/servers";

/// Server action understood by the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Start,
    Stop,
}

impl Action {
    fn path_segment(self) -> &'static str {
        match self {
            Action::Start => "start_server",
            Action::Stop => "stop_server",
        }
    }

    fn failure(self, server: &ServerEntry, reason: String) -> BackendError {
        let id = server.server_id.clone();
        let port = server.server_port;
        match self {
            Action::Start => BackendError::StartRequestFailed { id, port, reason },
            Action::Stop => BackendError::StopRequestFailed { id, port, reason },
        }
    }
}

/// [`BackendClient`] backed by the Crafty Controller HTTP API
pub struct CraftyClient {
    api_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl CraftyClient {
    /// Create a client
    ///
    /// # Parameters
    ///
    /// * `api_url` - Base URL of the control API, e.g. `https://127.0.0.1:8443`
    /// * `username` / `password` - Control API credentials
    /// * `accept_invalid_certs` - Skip TLS verification (Crafty ships a self-signed certificate)
    /// * `request_timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        accept_invalid_certs: bool,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProxyError::Other(format!("Failed to build control API client: {}", e)))?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            client,
        })
    }

    /// Create a client from the application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.username.clone(),
            config.password.clone(),
            config.accept_invalid_certs,
            config.api_timeout(),
        )
    }

    async fn bearer(&self) -> std::result::Result<String, BackendError> {
        let payload = LoginPayload {
            username: self.username.clone(),
            password: self.password.clone(),
        };

        let response = self
            .client
            .post(format!("{}{}", self.api_url, LOGIN_PATH))
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BackendError::AuthorizationFailed(e.to_string()))?;

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| BackendError::AuthorizationFailed(e.to_string()))?;

        Ok(login.data.token)
    }

    async fn servers(&self, token: &str) -> std::result::Result<ServerList, BackendError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, SERVERS_PATH))
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BackendError::BackendListUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| BackendError::BackendListUnavailable(e.to_string()))
    }

    async fn run(&self, port: u16, action: Action) -> std::result::Result<(), BackendError> {
        let token = self.bearer().await?;
        let servers = self.servers(&token).await?;
        let server = servers.by_port(port).ok_or(BackendError::NoSuchBackend(port))?;

        debug!("Sending {} for server {} (port {})", action.path_segment(), server.server_id, port);

        self
            .client
            .post(format!(
                "{}{}/{}/action/{}",
                self.api_url,
                SERVERS_PATH,
                server.server_id,
                action.path_segment()
            ))
            .bearer_auth(&token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| action.failure(server, e.to_string()))?;

        info!("Control API accepted {} for server {} (port {})", action.path_segment(), server.server_id, port);
        Ok(())
    }
}

#[async_trait]
impl BackendClient for CraftyClient {
    async fn start_backend(&self, port: u16) -> std::result::Result<(), BackendError> {
        self.run(port, Action::Start).await
    }

    async fn stop_backend(&self, port: u16) -> std::result::Result<(), BackendError> {
        self.run(port, Action::Stop).await
    }
}
