// Transfer pipeline errors
use crate::core_ftp::{ControlError, ReplyCode};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Resume not supported on ASCII data type.")]
    BadCommandSequence,

    #[error("You have reached your maximum of {max} simultaneous {direction}(s).")]
    SlotRefused { max: i32, direction: &'static str },

    #[error("Unable to open file: {0}")]
    OpenFailed(io::Error),

    #[error("Restart offset larger than file size.")]
    InvalidRestParameter,

    #[error("Unable to seek in file: {0}")]
    SeekFailed(io::Error),

    #[error("Unable to open data connection: {0}")]
    DataOpen(io::Error),

    #[error("Error while reading from disk: {0}")]
    DiskRead(io::Error),

    #[error("Error while writing to disk: {0}")]
    DiskWrite(io::Error),

    #[error("Error while reading from data connection: {0}")]
    DataRead(io::Error),

    #[error("Error while writing to data connection: {0}")]
    DataWrite(io::Error),

    #[error("Transfer cancelled")]
    Cancelled,

    #[error(transparent)]
    Control(#[from] ControlError),
}

impl TransferError {
    /// Reply code sent to the client for errors that end the transfer but keep the
    /// connection. `None` for errors that must travel up to the connection loop.
    pub fn reply_code(&self) -> Option<ReplyCode> {
        let code = match self {
            TransferError::BadCommandSequence => ReplyCode::BadCommandSequence,
            TransferError::SlotRefused { .. } => ReplyCode::ActionNotOkay,
            TransferError::OpenFailed(_) => ReplyCode::ActionNotOkay,
            TransferError::InvalidRestParameter => ReplyCode::InvalidRESTParameter,
            TransferError::SeekFailed(_) => ReplyCode::ActionAbortedError,
            TransferError::DataOpen(_) => ReplyCode::CantOpenDataConnection,
            TransferError::DiskRead(_)
            | TransferError::DiskWrite(_)
            | TransferError::DataRead(_)
            | TransferError::DataWrite(_) => ReplyCode::DataCloseAborted,
            TransferError::Cancelled | TransferError::Control(_) => return None,
        };
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes() {
        assert_eq!(
            TransferError::BadCommandSequence.reply_code(),
            Some(ReplyCode::BadCommandSequence)
        );
        assert_eq!(
            TransferError::DiskRead(io::Error::other("bad sector")).reply_code(),
            Some(ReplyCode::DataCloseAborted)
        );
        assert_eq!(
            TransferError::DataOpen(io::Error::from(io::ErrorKind::ConnectionRefused))
                .reply_code(),
            Some(ReplyCode::CantOpenDataConnection)
        );
        assert_eq!(TransferError::Cancelled.reply_code(), None);
    }

    #[test]
    fn test_messages() {
        let refused = TransferError::SlotRefused {
            max: 2,
            direction: "download",
        };
        assert_eq!(
            refused.to_string(),
            "You have reached your maximum of 2 simultaneous download(s)."
        );
        assert_eq!(
            TransferError::DiskRead(io::Error::other("bad sector")).to_string(),
            "Error while reading from disk: bad sector"
        );
    }
}
