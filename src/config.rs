use crate::constants::TRANSFER_CHUNK_SIZE;
use crate::core_tls::TlsConfig;
use crate::users::UserConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub pasv_address: String,
    pub site_root: String,
    /// Seconds a client may stay silent between commands. Absent: wait forever.
    pub idle_timeout_secs: Option<u64>,
    pub download_buffer_size: Option<usize>, // Optional to allow default value
    pub banner: String,
    pub single_line_replies: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tls: TlsConfig,
    pub users: Vec<UserConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: 21,
            pasv_address: String::from("127.0.0.1"),
            site_root: String::from("/var/ftp"),
            idle_timeout_secs: None,
            download_buffer_size: None,
            banner: String::from("rouilleftpd ready"),
            single_line_replies: false,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Size of one disk/data read in the transfer loop.
    pub fn chunk_size(&self) -> usize {
        self.download_buffer_size
            .filter(|size| *size > 0)
            .unwrap_or(TRANSFER_CHUNK_SIZE)
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::parse(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str)?;
        config.tls.validate()?;
        Ok(config)
    }
}
