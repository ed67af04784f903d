//! Crafty Reverse Proxy Command Line Tool
//!
//! This binary is the command-line interface for Crafty Reverse Proxy.

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crafty_reverse_proxy::common::{init_logger, Result};
use crafty_reverse_proxy::config::{load_config, validate_config, DEFAULT_CONFIG_FILE};
use crafty_reverse_proxy::{App, CraftyClient, APP_NAME, VERSION};

/// Crafty Reverse Proxy: start game servers when players connect, stop them when idle
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (YAML or JSON); a default one is written if missing
    #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level, overrides the configuration file
    #[clap(long)]
    log_level: Option<String>,

    /// Keep running with the defaults when the configuration file had to be created
    #[clap(long)]
    proceed_on_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = match load_config(&args.config, args.proceed_on_default_config) {
        Ok(config) => config,
        Err(e) => {
            init_logger(args.log_level.as_deref().unwrap_or("info"));
            error!("{}", e);
            return Err(e.into());
        }
    };

    // Initialize logger
    init_logger(args.log_level.as_deref().unwrap_or(&config.log_level));

    info!("Starting {} v{}", APP_NAME, VERSION);
    info!("Using configuration file {}", args.config.display());

    validate_config(&config)?;

    for address in &config.addresses {
        info!(
            "Proxying {} -> {}",
            address.listener.to_addr_string(),
            address.proxy_host.to_addr_string()
        );
    }

    let backend = Arc::new(CraftyClient::from_config(&config)?);
    let app = App::new(config, backend);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    info!("Proxy service ready, press Ctrl+C to stop");
    app.run(cancel).await
}
