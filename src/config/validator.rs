//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use std::collections::HashSet;
use log::warn;

use crate::common::log::is_valid_level;
use crate::config::defaults::PROTOCOL_STR;
use crate::config::error::{ConfigError, Result};
use crate::config::types::AppConfig;

/// Validate the configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_addresses(config)?;
    validate_control_api(config)?;
    validate_timings(config)?;

    for warning in check_warnings(config) {
        warn!("{}", warning);
    }

    Ok(())
}

/// Validate the proxied addresses
fn validate_addresses(config: &AppConfig) -> Result<()> {
    if config.addresses.is_empty() {
        return Err(ConfigError::MissingRequiredValue("addresses".to_string()));
    }

    let mut listeners = HashSet::new();
    for (i, address) in config.addresses.iter().enumerate() {
        if !address.protocol.eq_ignore_ascii_case(PROTOCOL_STR) {
            return Err(ConfigError::InvalidValue(
                format!("addresses[{}].protocol", i),
                format!("Unsupported protocol '{}', only tcp can be proxied", address.protocol),
            ));
        }

        if address.listener.port == 0 || address.proxy_host.port == 0 {
            return Err(ConfigError::InvalidValue(
                format!("addresses[{}]", i),
                "Ports must be greater than 0".to_string(),
            ));
        }

        if address.listener == address.proxy_host {
            return Err(ConfigError::InvalidCombination(format!(
                "addresses[{}]: listener and proxy_host must be different",
                i
            )));
        }

        if !listeners.insert(address.listener.to_addr_string()) {
            return Err(ConfigError::InvalidCombination(format!(
                "addresses[{}]: listener {} is configured twice",
                i,
                address.listener.to_addr_string()
            )));
        }
    }

    Ok(())
}

/// Validate control API settings
fn validate_control_api(config: &AppConfig) -> Result<()> {
    if config.api_url.trim().is_empty() {
        return Err(ConfigError::MissingRequiredValue("api_url".to_string()));
    }

    if !(config.api_url.starts_with("http://") || config.api_url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue(
            "api_url".to_string(),
            format!("'{}' must start with http:// or https://", config.api_url),
        ));
    }

    if config.api_timeout == 0 {
        return Err(ConfigError::InvalidValue(
            "api_timeout".to_string(),
            "Control API timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validate timing and buffer settings
fn validate_timings(config: &AppConfig) -> Result<()> {
    if config.auto_shutdown && config.idle_timeout == 0 {
        return Err(ConfigError::InvalidValue(
            "idle_timeout".to_string(),
            "Idle timeout must be greater than 0 when auto_shutdown is enabled".to_string(),
        ));
    }

    let positive = [
        ("buffer_size", config.buffer_size as u64),
        ("dial_timeout_ms", config.dial_timeout_ms),
        ("ready_poll_interval_ms", config.ready_poll_interval_ms),
        ("ready_timeout", config.ready_timeout),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(ConfigError::InvalidValue(
                name.to_string(),
                "Value must be greater than 0".to_string(),
            ));
        }
    }

    Ok(())
}

/// Check configuration for non-fatal problems
pub fn check_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !is_valid_level(&config.log_level) {
        warnings.push(format!("Invalid log level '{}', using default 'info'", config.log_level));
    }

    if config.username.is_empty() || config.password.is_empty() {
        warnings.push("Control API credentials are empty, start/stop requests will fail".to_string());
    }

    if config.ready_poll_interval_ms > config.ready_timeout.saturating_mul(1000) {
        warnings.push(format!(
            "ready_poll_interval_ms ({}) exceeds ready_timeout ({}s), backends will never be polled",
            config.ready_poll_interval_ms, config.ready_timeout
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AddressConfig, HostPort};

    fn valid() -> AppConfig {
        AppConfig {
            password: "secret".to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&valid()).is_ok());
        assert!(check_warnings(&valid()).is_empty());
    }

    #[test]
    fn test_zero_idle_timeout() {
        let mut config = valid();
        config.idle_timeout = 0;
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidValue(name, _)) if name == "idle_timeout"));

        // Without auto-shutdown the timeout is never used
        config.auto_shutdown = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_addresses_required() {
        let mut config = valid();
        config.addresses.clear();
        assert!(matches!(validate_config(&config), Err(ConfigError::MissingRequiredValue(_))));
    }

    #[test]
    fn test_udp_rejected() {
        let mut config = valid();
        config.addresses[0].protocol = "udp".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_listener_equals_target() {
        let mut config = valid();
        config.addresses[0].proxy_host = config.addresses[0].listener.clone();
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn test_duplicate_listener() {
        let mut config = valid();
        config.addresses.push(AddressConfig::new(
            config.addresses[0].listener.clone(),
            HostPort::new("127.0.0.1", 30000),
        ));
        assert!(matches!(validate_config(&config), Err(ConfigError::InvalidCombination(_))));
    }

    #[test]
    fn test_bad_api_url() {
        let mut config = valid();
        config.api_url = "crafty.lan:8443".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warnings() {
        let mut config = valid();
        config.log_level = "fail".to_string();
        config.password.clear();

        let warnings = check_warnings(&config);
        assert_eq!(warnings.len(), 2);
        assert!(validate_config(&config).is_ok(), "Warnings are not fatal");
    }
}
