use crate::config::Config;
use crate::core_fs::FileStore;
use crate::core_quota::{CreditLedger, StatsSink};
use crate::core_tls::TlsConnection;
use crate::core_transfer::{DataChannel, TransferCounter};
use crate::users::{User, UserDirectory};
use std::net::SocketAddr;
use std::sync::Arc;

/// Everything shared by all connections of one server.
#[derive(Clone)]
pub struct Site {
    pub config: Arc<Config>,
    pub users: Arc<UserDirectory>,
    pub counter: Arc<TransferCounter>,
    pub store: Arc<dyn FileStore>,
    pub stats: Arc<dyn StatsSink>,
    pub credits: Arc<dyn CreditLedger>,
    pub tls: TlsConnection,
}

/// Per-connection state outside the control stream itself.
pub struct Session {
    pub peer: SocketAddr,
    /// Name given by USER, waiting for PASS
    pub pending_user: Option<String>,
    pub user: Option<User>,
    pub data: DataChannel,
}

impl Session {
    pub fn new(peer: SocketAddr, tls: TlsConnection) -> Self {
        Self {
            peer,
            pending_user: None,
            user: None,
            data: DataChannel::new(tls),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Name used in log lines; `-` before login.
    pub fn username(&self) -> &str {
        self.user.as_ref().map_or("-", |user| user.name.as_str())
    }
}

#[cfg(test)]
impl Site {
    /// Site over `store` with the given accounts and in-memory statistics.
    pub fn for_tests(
        store: Arc<dyn FileStore>,
        users: Vec<crate::users::UserConfig>,
    ) -> anyhow::Result<Self> {
        let config = Config {
            users,
            ..Config::default()
        };
        Ok(Self {
            users: Arc::new(UserDirectory::from_config(&config.users)?),
            config: Arc::new(config),
            counter: TransferCounter::init(),
            store,
            stats: Arc::new(crate::core_quota::TransferStatsManager::new()),
            credits: Arc::new(crate::core_quota::UserCredits::new()),
            tls: TlsConnection::disabled(),
        })
    }
}
