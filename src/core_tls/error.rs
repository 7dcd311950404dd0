// TLS error handling
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("Failed to load SSL certificate: {0}")]
    CertificateLoadError(String),

    #[error("Failed to load SSL private key: {0}")]
    PrivateKeyLoadError(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshakeError(String),

    #[error("TLS configuration error: {0}")]
    TlsConfigError(String),

    #[error("TLS already active on this connection")]
    AlreadyActive,

    #[error("Plaintext data received after AUTH request")]
    PipelinedPlaintext,

    #[error("TLS not configured")]
    TlsNotConfigured,
}

impl TlsError {
    pub fn to_ftp_response(&self) -> String {
        match self {
            TlsError::TlsNotConfigured => {
                "TLS not available. Please configure SSL/TLS in the server.".to_string()
            }
            TlsError::AlreadyActive => "TLS already negotiated.".to_string(),
            _ => "Requested action aborted. Local error in processing.".to_string(),
        }
    }
}
