// Control connection errors
use crate::core_tls::TlsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Timed out waiting for a command")]
    Timeout,

    #[error("Control connection closed by peer")]
    EndOfStream,

    #[error("Command line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("Connection cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

impl ControlError {
    /// Underlying system error code, when the failure came from the OS.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            ControlError::Network(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
