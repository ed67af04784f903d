//! Configuration loading functionality
//!
//! Layers, lowest priority first:
//! 1. serde defaults
//! 2. the configuration file (YAML or JSON, picked by extension)
//! 3. `CRAFTY_PROXY_*` environment variables

use std::fs;
use std::path::Path;
use log::{debug, info, warn};
use config::{Config, Environment, File};

use crate::config::defaults;
use crate::config::error::{ConfigError, Result};
use crate::config::types::AppConfig;

/// Load the configuration from `path`
///
/// When the file does not exist a default one is written. The loader then
/// fails with [`ConfigError::DefaultCreated`] unless `proceed_on_default`
/// is set, in which case the freshly written defaults are used.
pub fn load_config(path: &Path, proceed_on_default: bool) -> Result<AppConfig> {
    if !path.exists() {
        write_default_config(path)?;
        if !proceed_on_default {
            return Err(ConfigError::DefaultCreated(path.to_path_buf()));
        }
        warn!("Configuration file not found, continuing with defaults written to {}", path.display());
    }

    debug!("Loading configuration from {}", path.display());

    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<AppConfig>()?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Write the default configuration to `path`
///
/// `.yaml`/`.yml` paths get the commented YAML template, anything else gets
/// pretty-printed JSON.
pub fn write_default_config(path: &Path) -> Result<()> {
    let contents = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => defaults::DEFAULT_YAML.to_string(),
        _ => serde_json::to_string_pretty(&AppConfig::default())?,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ConfigError::FileWriteError(parent.to_path_buf(), e.to_string()))?;
    }

    fs::write(path, contents)
        .map_err(|e| ConfigError::FileWriteError(path.to_path_buf(), e.to_string()))?;

    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_load_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, r#"
api_url: "https://crafty.lan:8443"
username: "crafty"
password: "hunter2"
idle_timeout: 120
auto_shutdown: false
log_level: "debug"
addresses:
  - protocol: "tcp"
    listener: { addr: "0.0.0.0", port: 25565 }
    proxy_host: { addr: "10.0.0.5", port: 25570 }
  - listener: { addr: "0.0.0.0", port: 25566 }
    proxy_host: { addr: "10.0.0.5", port: 25571 }
"#).unwrap();

        let config = load_config(&path, false).unwrap();

        assert_eq!(config.api_url, "https://crafty.lan:8443");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));
        assert!(!config.auto_shutdown);
        assert_eq!(config.addresses.len(), 2);
        assert_eq!(config.addresses[1].protocol, "tcp");
        assert_eq!(config.addresses[1].proxy_host.to_addr_string(), "10.0.0.5:25571");
    }

    #[test]
    #[serial]
    fn test_load_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{
            "username": "crafty",
            "idle_timeout": 30,
            "addresses": [
                {"listener": {"addr": "127.0.0.1", "port": 9000},
                 "proxy_host": {"addr": "127.0.0.1", "port": 9001}}
            ]
        }"#).unwrap();

        let config = load_config(&path, false).unwrap();
        assert_eq!(config.username, "crafty");
        assert_eq!(config.idle_timeout, 30);
        assert_eq!(config.ready_timeout, 300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "log_level: \"info\"\nidle_timeout: 60\n").unwrap();

        std::env::set_var("CRAFTY_PROXY_LOG_LEVEL", "trace");
        std::env::set_var("CRAFTY_PROXY_IDLE_TIMEOUT", "5");
        let result = load_config(&path, false);
        std::env::remove_var("CRAFTY_PROXY_LOG_LEVEL");
        std::env::remove_var("CRAFTY_PROXY_IDLE_TIMEOUT");

        let config = result.unwrap();
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.idle_timeout, 5);
    }

    #[test]
    #[serial]
    fn test_missing_file_writes_default_and_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let err = load_config(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultCreated(_)));
        assert!(path.exists(), "Default configuration should have been written");

        // Second start finds the written file
        let config = load_config(&path, false).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    #[serial]
    fn test_missing_file_proceeds_when_allowed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(&path, true).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    #[serial]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"idle_timeout": "soon"}"#).unwrap();

        assert!(matches!(load_config(&path, false), Err(ConfigError::ParseError(_))));
    }
}
