//! Configuration module
//!
//! This module handles application configuration: the file shape, defaults,
//! loading (file + environment variables) and validation.

pub mod defaults;
mod error;
mod loader;
mod types;
mod validator;

pub use self::defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use self::error::ConfigError;
pub use self::loader::{load_config, write_default_config};
pub use self::types::{AddressConfig, AppConfig, HostPort};
pub use self::validator::{check_warnings, validate_config};
