//! Configuration types
//!
//! The shape of the configuration file. Every field has a default so a file
//! only needs to name what differs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;
use crate::common::host_port;

/// A host and port pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostPort {
    pub addr: String,
    pub port: u16,
}

impl HostPort {
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self { addr: addr.into(), port }
    }

    /// `host:port` form suitable for bind/connect
    pub fn to_addr_string(&self) -> String {
        host_port(&self.addr, self.port)
    }
}

/// One proxied address: a public listener forwarding to one backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AddressConfig {
    /// Transport protocol (only `tcp` is proxied)
    #[serde(default = "defaults::protocol")]
    pub protocol: String,

    /// Public address clients connect to
    pub listener: HostPort,

    /// Backend game server address
    pub proxy_host: HostPort,
}

impl AddressConfig {
    pub fn new(listener: HostPort, proxy_host: HostPort) -> Self {
        Self {
            protocol: defaults::protocol(),
            listener,
            proxy_host,
        }
    }
}

/// Application configuration
///
/// Loaded once at startup and passed down explicitly; nothing reads it from
/// global state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    // --- Control API ---

    /// Base URL of the Crafty control API
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Control API username
    #[serde(default)]
    pub username: String,

    /// Control API password
    #[serde(default)]
    pub password: String,

    /// Skip TLS certificate verification for the control API
    #[serde(default = "defaults::accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    /// Control API request timeout in seconds
    #[serde(default = "defaults::api_timeout")]
    pub api_timeout: u64,

    // --- Idle shutdown ---

    /// Seconds the connection count must stay at zero before the backend is stopped
    #[serde(default = "defaults::idle_timeout")]
    pub idle_timeout: u64,

    /// Whether idle backends are stopped at all
    #[serde(default = "defaults::auto_shutdown")]
    pub auto_shutdown: bool,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// Buffer size for data transfer (in bytes)
    #[serde(default = "defaults::buffer_size")]
    pub buffer_size: usize,

    /// Backend connect timeout in milliseconds
    #[serde(default = "defaults::dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    /// Interval between readiness probes while a backend starts, in milliseconds
    #[serde(default = "defaults::ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,

    /// How long a connection waits for a starting backend, in seconds
    #[serde(default = "defaults::ready_timeout")]
    pub ready_timeout: u64,

    /// Proxied addresses
    #[serde(default)]
    pub addresses: Vec<AddressConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            username: "admin".to_string(),
            password: String::new(),
            accept_invalid_certs: defaults::accept_invalid_certs(),
            api_timeout: defaults::api_timeout(),
            idle_timeout: defaults::idle_timeout(),
            auto_shutdown: defaults::auto_shutdown(),
            log_level: defaults::log_level(),
            buffer_size: defaults::buffer_size(),
            dial_timeout_ms: defaults::dial_timeout_ms(),
            ready_poll_interval_ms: defaults::ready_poll_interval_ms(),
            ready_timeout: defaults::ready_timeout(),
            addresses: vec![AddressConfig::new(
                HostPort::new(defaults::listen_host(), 25565),
                HostPort::new(defaults::backend_host(), 25566),
            )],
        }
    }
}

impl AppConfig {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout)
    }
}
