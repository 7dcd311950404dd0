// Data connections: PASV listeners, PORT targets and PROT P protection

use crate::constants::DATA_CONNECTION_TIMEOUT;
use crate::core_tls::TlsConnection;
use crate::core_transfer::error::TransferError;
use crate::core_transfer::state::{DataType, Direction};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Byte stream usable as a data connection.
pub trait DataIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> DataIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type DataStream = Box<dyn DataIo>;

/// Establishes the transport for one transfer.
#[async_trait]
pub trait DataConnector: Send {
    async fn connect(&mut self, direction: Direction) -> io::Result<DataStream>;
}

/// PASV: wait for the client on a listener we bound.
pub struct PassiveListener {
    listener: TcpListener,
}

impl PassiveListener {
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }
}

#[async_trait]
impl DataConnector for PassiveListener {
    async fn connect(&mut self, direction: Direction) -> io::Result<DataStream> {
        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted {} data connection from {}", direction.as_str(), addr);
        Ok(Box::new(stream))
    }
}

/// PORT: connect back to the address the client gave us.
pub struct ActiveTarget {
    addr: SocketAddr,
}

impl ActiveTarget {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl DataConnector for ActiveTarget {
    async fn connect(&mut self, direction: Direction) -> io::Result<DataStream> {
        let stream = TcpStream::connect(self.addr).await?;
        debug!("Connected {} data connection to {}", direction.as_str(), self.addr);
        Ok(Box::new(stream))
    }
}

/// Per-session data connection settings and the stream of the transfer in progress.
pub struct DataChannel {
    connector: Option<Box<dyn DataConnector>>,
    stream: Option<DataStream>,
    tls: TlsConnection,
    protection: bool,
    data_type: DataType,
    restart_offset: u64,
}

impl DataChannel {
    pub fn new(tls: TlsConnection) -> Self {
        Self {
            connector: None,
            stream: None,
            tls,
            protection: false,
            data_type: DataType::default(),
            restart_offset: 0,
        }
    }

    /// Replaces any pending PASV/PORT setup.
    pub fn set_connector(&mut self, connector: Box<dyn DataConnector>) {
        self.connector = Some(connector);
    }

    pub fn has_connector(&self) -> bool {
        self.connector.is_some()
    }

    pub fn protection(&self) -> bool {
        self.protection
    }

    pub fn set_protection(&mut self, protection: bool) {
        self.protection = protection;
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = data_type;
    }

    #[cfg(test)]
    pub fn restart_offset(&self) -> u64 {
        self.restart_offset
    }

    pub fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    /// Returns the REST offset and clears it; an offset applies to one transfer only.
    pub fn take_restart_offset(&mut self) -> u64 {
        std::mem::take(&mut self.restart_offset)
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the data connection announced by PASV/PORT, wrapping it in TLS under PROT P.
    /// The PASV/PORT setup is consumed.
    pub async fn open(
        &mut self,
        direction: Direction,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let mut connector = self.connector.take().ok_or_else(|| {
            TransferError::DataOpen(io::Error::new(
                io::ErrorKind::NotConnected,
                "no data connection set up, send PASV or PORT first",
            ))
        })?;

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            connected = tokio::time::timeout(DATA_CONNECTION_TIMEOUT, connector.connect(direction)) => connected,
        };
        let stream = connected
            .map_err(|_| {
                TransferError::DataOpen(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out waiting for data connection",
                ))
            })?
            .map_err(TransferError::DataOpen)?;

        let stream: DataStream = if self.protection {
            let handshake = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                handshake = self.tls.accept_tls(stream) => handshake,
            };
            let tls_stream =
                handshake.map_err(|e| TransferError::DataOpen(io::Error::other(e)))?;
            Box::new(tls_stream)
        } else {
            stream
        };

        info!(
            "Data connection open for {}{}",
            direction.as_str(),
            if self.protection { " (TLS)" } else { "" }
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stream_mut(&mut self) -> io::Result<&mut DataStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "data connection closed"))
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream_mut()?.write_all(buf).await
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream_mut()?.read(buf).await
    }

    /// Flushes and shuts the stream down. Returns the shutdown error, if any; the stream is
    /// gone either way.
    pub async fn close(&mut self) -> io::Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let result = stream.shutdown().await;
        if let Err(e) = &result {
            warn!("Error shutting down data connection: {}", e);
        }
        result
    }
}

/// Test connector handing out a pre-built stream.
#[cfg(test)]
pub struct StreamConnector<T>(pub Option<T>);

#[cfg(test)]
#[async_trait]
impl<T> DataConnector for StreamConnector<T>
where
    T: DataIo + 'static,
{
    async fn connect(&mut self, _direction: Direction) -> io::Result<DataStream> {
        self.0
            .take()
            .map(|s| Box::new(s) as DataStream)
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_without_pasv_or_port_fails() {
        let mut channel = DataChannel::new(TlsConnection::disabled());
        let result = channel
            .open(Direction::Download, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransferError::DataOpen(_))));
    }

    #[tokio::test]
    async fn test_open_consumes_connector() {
        let (client, server) = tokio::io::duplex(64);
        let mut channel = DataChannel::new(TlsConnection::disabled());
        channel.set_connector(Box::new(StreamConnector(Some(server))));
        channel
            .open(Direction::Download, &CancellationToken::new())
            .await
            .unwrap();
        assert!(channel.is_open());
        assert!(!channel.has_connector());
        channel.close().await.unwrap();
        assert!(!channel.is_open());
        drop(client);
    }

    #[tokio::test]
    async fn test_protected_open_without_tls_fails() {
        let (_client, server) = tokio::io::duplex(64);
        let mut channel = DataChannel::new(TlsConnection::disabled());
        channel.set_protection(true);
        channel.set_connector(Box::new(StreamConnector(Some(server))));
        let result = channel
            .open(Direction::Upload, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransferError::DataOpen(_))));
        assert!(!channel.is_open());
    }

    #[tokio::test]
    async fn test_passive_listener_accepts_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut channel = DataChannel::new(TlsConnection::disabled());
        channel.set_connector(Box::new(PassiveListener::new(listener)));

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        channel
            .open(Direction::Download, &CancellationToken::new())
            .await
            .unwrap();
        channel.write_all(b"payload").await.unwrap();
        channel.close().await.unwrap();
        assert_eq!(client.await.unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_restart_offset_is_taken_once() {
        let mut channel = DataChannel::new(TlsConnection::disabled());
        channel.set_restart_offset(1024);
        assert_eq!(channel.take_restart_offset(), 1024);
        assert_eq!(channel.restart_offset(), 0);
    }
}
