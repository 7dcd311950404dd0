mod config;
mod constants;
mod core_cli;
mod core_fs;
mod core_ftp;
mod core_ftpcommand;
mod core_network;
mod core_quota;
mod core_tls;
mod core_transfer;
mod helpers;
mod server;
mod session;
mod users;

use crate::config::Config;
use crate::constants::{DEFAULT_CONFIG_PATH_UNIX, DEFAULT_CONFIG_PATH_WINDOWS};
use crate::core_cli::Cli;
use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    if let Some(password) = &args.hash_password {
        println!("{}", users::hash_password(password)?);
        return Ok(());
    }

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    // Determine the default config path based on the OS
    let default_config_path = if cfg!(target_os = "windows") {
        DEFAULT_CONFIG_PATH_WINDOWS
    } else {
        DEFAULT_CONFIG_PATH_UNIX
    };

    // Load configuration from the TOML file
    let config_path = if args.config.is_empty() {
        default_config_path
    } else {
        args.config.as_str()
    };
    let mut config = Config::load_from_file(config_path)?;

    if let Some(listen_port) = args.listen_port {
        config.server.listen_port = listen_port;
    }

    // Run the FTP server
    server::run(config).await
}
