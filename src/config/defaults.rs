//! Default configuration values
//!
//! Single source of truth for defaults; serde, the default config file and
//! the CLI all read from here.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "CRAFTY_PROXY";

/// Default configuration file path
pub const DEFAULT_CONFIG_FILE: &str = "config/config.yaml";

/// Default control API URL
pub const API_URL_STR: &str = "https://127.0.0.1:8443";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Transport protocol of a proxied address
pub const PROTOCOL_STR: &str = "tcp";

/// Default control API URL
pub fn api_url() -> String {
    API_URL_STR.to_string()
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

/// Default transport protocol
pub fn protocol() -> String {
    PROTOCOL_STR.to_string()
}

/// Default listen host
pub fn listen_host() -> String {
    "0.0.0.0".to_string()
}

/// Default backend host
pub fn backend_host() -> String {
    "127.0.0.1".to_string()
}

/// Crafty ships a self-signed certificate
pub fn accept_invalid_certs() -> bool {
    true
}

/// Default control API request timeout in seconds
pub fn api_timeout() -> u64 {
    30
}

/// Default idle-shutdown timeout in seconds
pub fn idle_timeout() -> u64 {
    600
}

/// Auto-shutdown is on unless disabled
pub fn auto_shutdown() -> bool {
    true
}

/// Default forwarding buffer size (8KB)
pub fn buffer_size() -> usize {
    8192
}

/// Default backend connect timeout in milliseconds
pub fn dial_timeout_ms() -> u64 {
    1000
}

/// Default readiness poll interval in milliseconds
pub fn ready_poll_interval_ms() -> u64 {
    1000
}

/// Default readiness wait in seconds
pub fn ready_timeout() -> u64 {
    300
}

/// Template written when no configuration file exists (YAML flavour)
pub const DEFAULT_YAML: &str = r#"# Crafty reverse proxy configuration
api_url: "https://127.0.0.1:8443"
username: "admin"
password: ""
accept_invalid_certs: true
api_timeout: 30

# Seconds without connections before the backend is stopped
idle_timeout: 600
auto_shutdown: true

log_level: "info"
buffer_size: 8192
dial_timeout_ms: 1000
ready_poll_interval_ms: 1000
ready_timeout: 300

addresses:
  - protocol: "tcp"
    listener:
      addr: "0.0.0.0"
      port: 25565
    proxy_host:
      addr: "127.0.0.1"
      port: 25566
"#;
