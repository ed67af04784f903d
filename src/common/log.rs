//! Logging helpers
//!
//! The whole crate logs through the `log` facade; this module only wires the
//! `env_logger` backend once at process start.

/// Log levels accepted in configuration and on the command line
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Initialize the logging system
///
/// `RUST_LOG` wins over `level` when both are set.
///
/// # Parameters
///
/// * `level` - Log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // A second initialisation (tests, embedding binaries) is not an error.
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Whether `level` is one of [`LOG_LEVELS`] (case-insensitive)
pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_lowercase().as_str())
}
