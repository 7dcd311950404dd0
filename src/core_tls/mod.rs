// SSL/TLS support: certificate loading and server-side handshakes for the control and data
// connections.

pub mod error;
pub mod tls_config;
pub mod tls_connection;

pub use error::TlsError;
pub use tls_config::TlsConfig;
pub use tls_connection::TlsConnection;
