// User accounts, transfer profiles and password checks

use crate::constants::USERNAME_REGEX;
use anyhow::{bail, Context, Result};
use bcrypt::{hash, verify, DEFAULT_COST};
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type UserId = u32;

/// `[[users]]` entry of the configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UserConfig {
    pub name: String,
    pub uid: UserId,
    /// bcrypt hash, see `--hash-password`
    pub password_hash: String,
    pub max_sim_downloads: i32,
    pub max_sim_uploads: i32,
    /// bytes/sec
    pub max_download_speed: i64,
    pub max_upload_speed: i64,
    /// Credits earned per uploaded KiB; 0 leaves the balance alone.
    pub ratio: u32,
}

/// Limits applied to every transfer of a user. Non-positive values mean unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub max_sim_downloads: i32,
    pub max_sim_uploads: i32,
    pub max_download_speed: i64,
    pub max_upload_speed: i64,
    pub ratio: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub uid: UserId,
    pub profile: Profile,
}

impl User {
    pub fn new(name: &str, uid: UserId, profile: Profile) -> Self {
        Self {
            name: name.to_string(),
            uid,
            profile,
        }
    }
}

#[derive(Debug)]
struct Account {
    user: User,
    password_hash: String,
}

/// Accounts known to the server, keyed by user name.
#[derive(Debug, Default)]
pub struct UserDirectory {
    accounts: HashMap<String, Account>,
}

impl UserDirectory {
    pub fn from_config(users: &[UserConfig]) -> Result<Self> {
        let name_regex = Regex::new(USERNAME_REGEX).context("Invalid username pattern")?;
        let mut accounts = HashMap::new();

        for entry in users {
            if !name_regex.is_match(&entry.name) {
                bail!("Invalid username in configuration: {:?}", entry.name);
            }
            let account = Account {
                user: User::new(
                    &entry.name,
                    entry.uid,
                    Profile {
                        max_sim_downloads: entry.max_sim_downloads,
                        max_sim_uploads: entry.max_sim_uploads,
                        max_download_speed: entry.max_download_speed,
                        max_upload_speed: entry.max_upload_speed,
                        ratio: entry.ratio,
                    },
                ),
                password_hash: entry.password_hash.clone(),
            };
            if accounts.insert(entry.name.clone(), account).is_some() {
                bail!("Duplicate user in configuration: {}", entry.name);
            }
        }

        Ok(Self { accounts })
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Returns the user when `password` matches the stored hash.
    pub fn authenticate(&self, name: &str, password: &str) -> Option<User> {
        let account = self.accounts.get(name)?;
        match verify(password, &account.password_hash) {
            Ok(true) => Some(account.user.clone()),
            Ok(false) => None,
            Err(e) => {
                warn!("Unusable password hash for user {}: {}", name, e);
                None
            }
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    hash(password, DEFAULT_COST).context("Failed to hash password")
}
