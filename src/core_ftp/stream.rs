use crate::core_tls::{TlsConnection, TlsError};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::server::TlsStream;

/// Control socket that starts in plaintext and can be switched to TLS in place.
pub enum ControlStream<S> {
    Plain(S),
    Tls(Box<TlsStream<S>>),
    /// Transient state while the socket is handed to the TLS handshake. A failed handshake
    /// leaves the stream here and every further I/O fails.
    Detached,
}

impl<S> ControlStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn is_tls(&self) -> bool {
        matches!(self, ControlStream::Tls(_))
    }

    /// Performs the server-side handshake over the plaintext socket.
    pub async fn upgrade(self, tls: &TlsConnection) -> Result<Self, TlsError> {
        match self {
            ControlStream::Plain(stream) => {
                let tls_stream = tls.accept_tls(stream).await?;
                Ok(ControlStream::Tls(Box::new(tls_stream)))
            }
            ControlStream::Tls(_) => Err(TlsError::AlreadyActive),
            ControlStream::Detached => Err(TlsError::TlsHandshakeError(
                "control stream is not connected".to_string(),
            )),
        }
    }
}

fn detached() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "control stream detached")
}

impl<S> AsyncRead for ControlStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }
}

impl<S> AsyncWrite for ControlStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            ControlStream::Detached => Poll::Ready(Err(detached())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ControlStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            ControlStream::Detached => Poll::Ready(Ok(())),
        }
    }
}
