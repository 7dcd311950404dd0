// src/constants.rs

use std::time::Duration;

pub const USERNAME_REGEX: &str = r"^[a-zA-Z0-9_.-]{1,32}$";

/// Size of one chunk moved by the transfer loop.
pub const TRANSFER_CHUNK_SIZE: usize = 16384;

/// Longest control line accepted, terminator included.
pub const MAX_COMMAND_LINE: usize = 4096;

/// How long the server waits for an early client line right after the banner.
pub const GREETING_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for accepting/connecting a data connection.
pub const DATA_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_CONFIG_PATH_UNIX: &str = "/etc/rouilleftpd.conf";
pub const DEFAULT_CONFIG_PATH_WINDOWS: &str = "C:\\src\\rouilleFTPd\\rouilleftpd\\etc\\rouilleftpd.conf";

// Telnet (RFC 854) bytes that may show up on the control connection.
pub const TELNET_IAC: u8 = 255;
pub const TELNET_DONT: u8 = 254;
pub const TELNET_WILL: u8 = 251;
pub const TELNET_SB: u8 = 250;
pub const TELNET_SE: u8 = 240;
