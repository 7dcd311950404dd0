// FTP control connection: reply framing, command reading and in-place TLS upgrade.

pub mod control;
pub mod error;
pub mod reader;
pub mod reply;
pub mod stream;

pub use control::{ControlIo, ControlSession};
pub use error::ControlError;
pub use reply::ReplyCode;
