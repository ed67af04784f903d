//! Network utility functions
//!
//! This module provides helpers for turning configured hosts and ports into
//! dialable address strings.

use super::error::{ProxyError, Result};

/// Join a host and a port into a `host:port` string
///
/// Bare IPv6 literals are wrapped in brackets so the result can be handed
/// straight to `TcpListener::bind` or `TcpStream::connect`.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Extract the port from a `host:port` string
pub fn port_of(addr: &str) -> Result<u16> {
    let (_, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| ProxyError::Config(format!("Missing port in address: {}", addr)))?;

    port.parse::<u16>()
        .map_err(|e| ProxyError::Config(format!("Invalid port in address {}: {}", addr, e)))
}
