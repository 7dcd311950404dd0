use crate::config::Config;
use crate::core_fs::LocalFileStore;
use crate::core_network::network;
use crate::core_quota::{TransferStatsManager, UserCredits};
use crate::core_tls::TlsConnection;
use crate::core_transfer::TransferCounter;
use crate::helpers::log_config;
use crate::session::Site;
use crate::users::UserDirectory;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Runs the FTP server with the provided configuration until Ctrl-C.
///
/// Builds the shared site state (TLS acceptor, accounts, transfer counter, file store),
/// binds the listener and serves connections. The transfer counter lives exactly as long as
/// this call.
pub async fn run(config: Config) -> Result<()> {
    log_config(&config);

    let tls = TlsConnection::from_config(&config.tls).context("Failed to set up TLS")?;
    let users = UserDirectory::from_config(&config.users)?;
    if users.is_empty() {
        warn!("No users configured, nobody will be able to log in");
    }

    let listen_addr = format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    );
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("Server listening on {}", listener.local_addr()?);

    let counter = TransferCounter::init();
    let site = Site {
        store: Arc::new(LocalFileStore::new(&config.server.site_root)),
        config: Arc::new(config),
        users: Arc::new(users),
        counter: Arc::clone(&counter),
        stats: Arc::new(TransferStatsManager::new()),
        credits: Arc::new(UserCredits::new()),
        tls,
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal_token.cancel();
            }
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
    });

    let result = network::start_server(listener, site, shutdown).await;
    counter.teardown();
    info!("Server stopped");
    result
}
