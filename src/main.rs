//! RAX FTP suite - Entry Point
//!
//! Starts the operator console with configuration from `config.toml` and
//! `RAX_FTP__*` environment variables.

use log::{error, info};

use rax_ftp_suite::config::AppConfig;
use rax_ftp_suite::console;
use rax_ftp_suite::error::report;
use rax_ftp_suite::utils::logging::setup_logging;

#[tokio::main]
async fn main() {
    setup_logging();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Launching RAX FTP suite...");

    if let Err(e) = console::run(config).await {
        report("console", &e);
        std::process::exit(1);
    }
}
