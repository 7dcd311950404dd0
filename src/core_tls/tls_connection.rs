// TLS handshakes for rouilleftpd connections
use crate::core_tls::error::TlsError;
use crate::core_tls::tls_config::TlsConfig;
use log::info;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{rustls, server::TlsStream, TlsAcceptor};

/// Server-side TLS context shared by every connection. Cloning is cheap.
#[derive(Clone)]
pub struct TlsConnection {
    tls_acceptor: Option<TlsAcceptor>,
}

impl fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnection")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl TlsConnection {
    /// A context that refuses every handshake with `TlsNotConfigured`.
    pub fn disabled() -> Self {
        Self { tls_acceptor: None }
    }

    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        if !config.enabled {
            info!("TLS disabled, AUTH TLS will be refused");
            return Ok(Self::disabled());
        }
        config.validate()?;

        let certs = std::fs::read(&config.cert_file)
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        let key = std::fs::read(&config.key_file)
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;

        let connection = Self::from_pem(&certs, &key)?;
        info!("TLS enabled with certificate {:?}", config.cert_file);
        Ok(connection)
    }

    pub fn from_pem(certs: &[u8], key: &[u8]) -> Result<Self, TlsError> {
        let cert_chain = rustls_pemfile::certs(&mut &certs[..])
            .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?;
        if cert_chain.is_empty() {
            return Err(TlsError::CertificateLoadError(
                "No certificate found".to_string(),
            ));
        }

        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key[..])
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
        if keys.is_empty() {
            keys = rustls_pemfile::rsa_private_keys(&mut &key[..])
                .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
        }
        let private_key = keys
            .pop()
            .ok_or_else(|| TlsError::PrivateKeyLoadError("No private key found".to_string()))?;

        let cert_chain: Vec<rustls::Certificate> =
            cert_chain.into_iter().map(rustls::Certificate).collect();
        let private_key = rustls::PrivateKey(private_key);

        let config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;

        Ok(Self {
            tls_acceptor: Some(TlsAcceptor::from(Arc::new(config))),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.tls_acceptor.is_some()
    }

    /// Runs a server-side handshake over an already connected stream.
    pub async fn accept_tls<S>(&self, stream: S) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let acceptor = self
            .tls_acceptor
            .as_ref()
            .ok_or(TlsError::TlsNotConfigured)?;

        acceptor
            .accept(stream)
            .await
            .map_err(|e| TlsError::TlsHandshakeError(e.to_string()))
    }
}

/// Client side of a self-signed test certificate.
#[cfg(test)]
pub struct TestClient {
    connector: tokio_rustls::TlsConnector,
}

#[cfg(test)]
impl TestClient {
    pub async fn connect<S>(&self, stream: S) -> tokio_rustls::client::TlsStream<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = rustls::ServerName::try_from("localhost").unwrap();
        self.connector.connect(name, stream).await.unwrap()
    }
}

#[cfg(test)]
impl TlsConnection {
    /// Server context for a freshly generated `localhost` certificate, plus a client that
    /// trusts it.
    pub fn self_signed_for_tests() -> (Self, TestClient) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_pem = cert.serialize_pem().unwrap();
        let key_pem = cert.serialize_private_key_pem();
        let server = Self::from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap();

        let mut roots = rustls::RootCertStore::empty();
        roots
            .add(&rustls::Certificate(cert.serialize_der().unwrap()))
            .unwrap();
        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let client = TestClient {
            connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
        };
        (server, client)
    }
}
