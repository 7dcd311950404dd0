use crate::constants::GREETING_TIMEOUT;
use crate::core_ftp::error::ControlError;
use crate::core_ftp::reader;
use crate::core_ftp::reply::{format_line, frame_lines, ReplyBuffer, ReplyCode};
use crate::core_ftp::stream::ControlStream;
use crate::core_tls::{TlsConnection, TlsError};
use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Transport usable as a control connection.
pub trait ControlIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ControlIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// One client's control connection: the socket, the staged reply and byte counters.
///
/// Replies are staged with [`reply`](Self::reply)/[`part_reply`](Self::part_reply) and only
/// hit the wire on [`flush_reply`](Self::flush_reply). All operations take `&mut self`, so a
/// reply can never be written while a command read is in progress.
pub struct ControlSession<S> {
    io: BufReader<ControlStream<S>>,
    pending: Vec<u8>,
    buffer: ReplyBuffer,
    last_code: ReplyCode,
    single_line_replies: bool,
    bytes_read: u64,
    bytes_written: u64,
    tls: TlsConnection,
    cancel: CancellationToken,
}

impl ControlSession<TcpStream> {
    /// Accepts one connection from `listener` and binds a new session to it.
    pub async fn accept_from(
        listener: &TcpListener,
        tls: TlsConnection,
        cancel: CancellationToken,
    ) -> Result<(Self, SocketAddr), ControlError> {
        let (socket, addr) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ControlError::Cancelled),
            accepted = listener.accept() => accepted?,
        };
        socket.set_nodelay(true)?;
        Ok((Self::new(socket, tls, cancel), addr))
    }
}

impl<S> ControlSession<S>
where
    S: ControlIo,
{
    pub fn new(stream: S, tls: TlsConnection, cancel: CancellationToken) -> Self {
        Self {
            io: BufReader::new(ControlStream::Plain(stream)),
            pending: Vec::new(),
            buffer: ReplyBuffer::new(),
            last_code: ReplyCode::NotSet,
            single_line_replies: false,
            bytes_read: 0,
            bytes_written: 0,
            tls,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_tls(&self) -> bool {
        self.io.get_ref().is_tls()
    }

    pub fn tls(&self) -> &TlsConnection {
        &self.tls
    }

    pub fn set_single_line_replies(&mut self, enabled: bool) {
        self.single_line_replies = enabled;
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Code of the last line put on the wire.
    pub fn last_code(&self) -> ReplyCode {
        self.last_code
    }

    /// Code currently staged in the reply buffer.
    #[cfg(test)]
    pub fn staged_code(&self) -> ReplyCode {
        self.buffer.code()
    }

    pub fn part_reply(&mut self, code: ReplyCode, message: impl AsRef<str>) {
        self.buffer.stage(code, message.as_ref());
    }

    pub fn reply(&mut self, code: ReplyCode, message: impl AsRef<str>) {
        self.part_reply(code, message);
    }

    /// Sends everything staged as one multi-line reply. Returns `false` when nothing was
    /// staged. With `final_reply == false` the last line is sent as a part line too, so more
    /// output can follow under the same code.
    pub async fn flush_reply(&mut self, final_reply: bool) -> Result<bool, ControlError> {
        let (code, lines) = match self.buffer.take() {
            Some(staged) => staged,
            None => return Ok(false),
        };
        for (part, message) in frame_lines(&lines, final_reply) {
            self.send_line(code, part, message).await?;
        }
        Ok(true)
    }

    /// Stages and immediately sends a final reply.
    pub async fn respond(
        &mut self,
        code: ReplyCode,
        message: impl AsRef<str>,
    ) -> Result<(), ControlError> {
        self.reply(code, message);
        self.flush_reply(true).await?;
        Ok(())
    }

    /// Writes one reply line. Part lines are dropped for clients that asked for single-line
    /// replies.
    pub async fn send_line(
        &mut self,
        code: ReplyCode,
        part: bool,
        message: &str,
    ) -> Result<(), ControlError> {
        let mut line = format_line(code, part, message);
        if self.single_line_replies && part {
            return Ok(());
        }
        debug!("{}", line);
        line.push_str("\r\n");

        self.io.write_all(line.as_bytes()).await?;
        self.io.flush().await?;
        self.bytes_written += line.len() as u64;
        self.last_code = code;
        Ok(())
    }

    /// Blocks for the next command line, bounded by `timeout` (`None` waits forever).
    pub async fn read_command(&mut self, timeout: Option<Duration>) -> Result<String, ControlError> {
        let (line, raw_len) =
            reader::read_command(&mut self.io, &mut self.pending, timeout, &self.cancel).await?;
        self.bytes_read += raw_len as u64;
        debug!("{}", mask_password(&line));
        Ok(line)
    }

    /// Picks up a line the client may send right after the banner. A timeout is not an error
    /// here and yields an empty string.
    pub async fn wait_for_greeting(&mut self) -> Result<String, ControlError> {
        match self.read_command(Some(GREETING_TIMEOUT)).await {
            Err(ControlError::Timeout) => Ok(String::new()),
            other => other,
        }
    }

    /// Switches the control connection to TLS in place (AUTH TLS). The `234` reply must have
    /// been flushed by the caller beforehand.
    pub async fn negotiate_tls(&mut self) -> Result<(), ControlError> {
        if !self.tls.is_enabled() {
            return Err(TlsError::TlsNotConfigured.into());
        }
        if self.is_tls() {
            return Err(TlsError::AlreadyActive.into());
        }
        if !self.io.buffer().is_empty() || !self.pending.is_empty() {
            return Err(TlsError::PipelinedPlaintext.into());
        }

        let plain = std::mem::replace(self.io.get_mut(), ControlStream::Detached);
        let upgraded = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ControlError::Cancelled),
            upgraded = plain.upgrade(&self.tls) => upgraded?,
        };
        self.io = BufReader::new(upgraded);
        info!("Control connection upgraded to TLS");
        Ok(())
    }

    /// Flushes and shuts down the write side of the control connection.
    pub async fn shutdown(&mut self) -> Result<(), ControlError> {
        self.io.shutdown().await?;
        Ok(())
    }
}

fn mask_password(line: &str) -> std::borrow::Cow<'_, str> {
    match line.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("PASS ") => "PASS ********".into(),
        _ => line.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, DuplexStream};

    fn session() -> (ControlSession<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(4096);
        (
            ControlSession::new(server, TlsConnection::disabled(), CancellationToken::new()),
            client,
        )
    }

    async fn read_available(client: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[tokio::test]
    async fn test_multi_line_reply_shares_code() {
        let (mut control, mut client) = session();
        control.reply(ReplyCode::SystemStatus, "a");
        control.part_reply(ReplyCode::SystemStatus, "b");
        control.reply(ReplyCode::SystemStatus, "c");
        assert!(control.flush_reply(true).await.unwrap());

        let wire = read_available(&mut client).await;
        assert_eq!(wire, "211-a\r\n211-b\r\n211 c\r\n");
        assert_eq!(control.bytes_written(), wire.len() as u64);
        assert_eq!(control.staged_code(), ReplyCode::NotSet);
    }

    #[tokio::test]
    async fn test_non_final_flush_keeps_reply_open() {
        let (mut control, mut client) = session();
        control.reply(ReplyCode::ServiceReady, "welcome\nto the site");
        control.flush_reply(false).await.unwrap();
        control.reply(ReplyCode::ServiceReady, "ready");
        control.flush_reply(true).await.unwrap();

        let wire = read_available(&mut client).await;
        assert_eq!(wire, "220-welcome\r\n220-to the site\r\n220 ready\r\n");
    }

    #[tokio::test]
    async fn test_second_flush_sends_nothing() {
        let (mut control, _client) = session();
        control.reply(ReplyCode::CommandOkay, "ok");
        assert!(control.flush_reply(true).await.unwrap());
        let written = control.bytes_written();
        assert!(!control.flush_reply(true).await.unwrap());
        assert_eq!(control.bytes_written(), written);
    }

    #[tokio::test]
    async fn test_single_line_replies_drop_part_lines() {
        let (mut control, mut client) = session();
        control.set_single_line_replies(true);
        control.reply(ReplyCode::SystemStatus, "a\nb\nc");
        control.flush_reply(true).await.unwrap();

        assert_eq!(read_available(&mut client).await, "211 c\r\n");
    }

    #[tokio::test]
    async fn test_continuation_lines_omit_code() {
        let (mut control, mut client) = session();
        control.send_line(ReplyCode::NoCode, true, " feature").await.unwrap();
        assert_eq!(read_available(&mut client).await, " feature\r\n");
    }

    #[tokio::test]
    async fn test_read_command_counts_raw_bytes() {
        let (mut control, mut client) = session();
        client.write_all(b"\xff\xf4LIST -la\r\n").await.unwrap();
        let line = control.read_command(None).await.unwrap();
        assert_eq!(line, "LIST -la");
        assert_eq!(control.bytes_read(), 12);
    }

    #[tokio::test]
    async fn test_wait_for_greeting_returns_empty_on_timeout() {
        tokio::time::pause();
        let (mut control, _client) = session();
        assert_eq!(control.wait_for_greeting().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_wait_for_greeting_reads_early_line() {
        let (mut control, mut client) = session();
        client.write_all(b"IDNT user@host\r\n").await.unwrap();
        assert_eq!(control.wait_for_greeting().await.unwrap(), "IDNT user@host");
    }

    #[tokio::test]
    async fn test_wait_for_greeting_propagates_end_of_stream() {
        let (mut control, client) = session();
        drop(client);
        assert!(matches!(
            control.wait_for_greeting().await,
            Err(ControlError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_negotiate_tls_without_context() {
        let (mut control, _client) = session();
        assert!(matches!(
            control.negotiate_tls().await,
            Err(ControlError::Tls(TlsError::TlsNotConfigured))
        ));
        // the plaintext connection is still usable
        control.respond(ReplyCode::CommandOkay, "still here").await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_tls_upgrades_in_place() {
        let (tls, tls_client) = TlsConnection::self_signed_for_tests();
        let (client, server) = tokio::io::duplex(16 * 1024);
        let mut control = ControlSession::new(server, tls, CancellationToken::new());

        let peer = tokio::spawn(async move {
            let mut client = tokio::io::BufReader::new(client);
            client.write_all(b"AUTH TLS\r\n").await.unwrap();
            let mut line = String::new();
            client.read_line(&mut line).await.unwrap();
            assert_eq!(line, "234 AUTH TLS successful\r\n");

            let stream = tls_client.connect(client.into_inner()).await;
            let mut stream = tokio::io::BufReader::new(stream);
            stream.write_all(b"NOOP\r\n").await.unwrap();
            stream.flush().await.unwrap();
            let mut reply = String::new();
            stream.read_line(&mut reply).await.unwrap();
            reply
        });

        assert_eq!(control.read_command(None).await.unwrap(), "AUTH TLS");
        control
            .respond(ReplyCode::SecurityExchangeOkay, "AUTH TLS successful")
            .await
            .unwrap();
        control.negotiate_tls().await.unwrap();
        assert!(control.is_tls());

        assert_eq!(control.read_command(None).await.unwrap(), "NOOP");
        control.respond(ReplyCode::CommandOkay, "over TLS").await.unwrap();
        assert_eq!(peer.await.unwrap(), "200 over TLS\r\n");

        assert!(matches!(
            control.negotiate_tls().await,
            Err(ControlError::Tls(TlsError::AlreadyActive))
        ));
    }

    #[tokio::test]
    async fn test_replies_and_reads_alternate() {
        let (mut control, client) = session();
        let (client_read, mut client_write) = tokio::io::split(client);
        let mut client_read = tokio::io::BufReader::new(client_read);

        client_write.write_all(b"NOOP\r\n").await.unwrap();
        let command = control.read_command(None).await.unwrap();
        control.respond(ReplyCode::CommandOkay, format!("{} ok", command)).await.unwrap();

        let mut line = String::new();
        client_read.read_line(&mut line).await.unwrap();
        assert_eq!(line, "200 NOOP ok\r\n");
    }

    #[test]
    fn test_mask_password() {
        assert_eq!(mask_password("PASS hunter2"), "PASS ********");
        assert_eq!(mask_password("pass hunter2"), "PASS ********");
        assert_eq!(mask_password("USER alice"), "USER alice");
    }
}
