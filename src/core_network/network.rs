use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_ftpcommand::handlers::{handle_command, CommandResult};
use crate::session::{Session, Site};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// Accepts control connections until `shutdown` is cancelled, one task per connection.
/// Returns once every connection task has finished.
pub async fn start_server(listener: TcpListener, site: Site, shutdown: CancellationToken) -> Result<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = ControlSession::accept_from(&listener, site.tls.clone(), shutdown.child_token()) => {
                match accepted {
                    Ok((control, addr)) => {
                        info!("New connection from {}", addr);
                        let site = site.clone();
                        connections.spawn(async move {
                            match handle_connection(control, addr, site).await {
                                Ok(()) => info!("Connection closed for {}", addr),
                                Err(ControlError::Cancelled) => info!("Connection {} closed by shutdown", addr),
                                Err(e) => warn!(
                                    "Connection error for {}: {} (os error {:?})",
                                    addr,
                                    e,
                                    e.os_error()
                                ),
                            }
                        });
                    }
                    Err(ControlError::Cancelled) => break,
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            }
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    error!("Connection task failed: {}", e);
                }
            }
        }
    }

    info!(
        "Listener stopped, waiting for {} connection(s)",
        connections.len()
    );
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            error!("Connection task failed: {}", e);
        }
    }
    Ok(())
}

/// Serves one control connection: banner, optional early greeting, then the command loop.
pub async fn handle_connection<S: ControlIo>(
    mut control: ControlSession<S>,
    peer: SocketAddr,
    site: Site,
) -> Result<(), ControlError> {
    let result = serve(&mut control, peer, &site).await;
    if matches!(result, Err(ControlError::Cancelled)) {
        // best effort, the client may not be reading
        let _ = tokio::time::timeout(
            SHUTDOWN_REPLY_TIMEOUT,
            control.respond(ReplyCode::ServiceUnavailable, "Server shutting down."),
        )
        .await;
    }
    if result.is_ok() {
        control.shutdown().await.ok();
    }
    debug!(
        "{}: {} bytes in, {} bytes out, last reply {:?}",
        peer,
        control.bytes_read(),
        control.bytes_written(),
        control.last_code()
    );
    result
}

async fn serve<S: ControlIo>(
    control: &mut ControlSession<S>,
    peer: SocketAddr,
    site: &Site,
) -> Result<(), ControlError> {
    let server = &site.config.server;
    control.set_single_line_replies(server.single_line_replies);
    control.respond(ReplyCode::ServiceReady, &server.banner).await?;

    let mut session = Session::new(peer, site.tls.clone());

    let greeting = match control.wait_for_greeting().await {
        Err(ControlError::LineTooLong(max)) => return reject_long_line(control, peer, max).await,
        greeting => greeting?,
    };
    if is_ident_line(&greeting) {
        info!("{} identifies as: {}", peer, &greeting[4..].trim());
    } else if !greeting.is_empty()
        && execute(control, site, &mut session, &greeting).await? == CommandResult::Quit
    {
        return Ok(());
    }

    loop {
        let line = match control.read_command(server.idle_timeout()).await {
            Ok(line) => line,
            Err(ControlError::Timeout) => {
                info!("Idle timeout for {} ({})", peer, session.username());
                control
                    .respond(
                        ReplyCode::ServiceUnavailable,
                        "Idle timeout, closing control connection.",
                    )
                    .await?;
                return Ok(());
            }
            Err(ControlError::EndOfStream) => {
                info!("Client {} disconnected", peer);
                return Ok(());
            }
            Err(ControlError::LineTooLong(max)) => {
                return reject_long_line(control, peer, max).await;
            }
            Err(e) => return Err(e),
        };

        if execute(control, site, &mut session, &line).await? == CommandResult::Quit {
            return Ok(());
        }
    }
}

async fn execute<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
    line: &str,
) -> Result<CommandResult, ControlError> {
    let result = handle_command(control, site, session, line).await?;
    control.flush_reply(true).await?;
    Ok(result)
}

async fn reject_long_line<S: ControlIo>(
    control: &mut ControlSession<S>,
    peer: SocketAddr,
    max: usize,
) -> Result<(), ControlError> {
    warn!("{} sent a command line over {} bytes", peer, max);
    control
        .respond(ReplyCode::SyntaxError, "Command line too long.")
        .await
}

fn is_ident_line(line: &str) -> bool {
    line.get(..4)
        .is_some_and(|verb| verb.eq_ignore_ascii_case("IDNT"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_fs::LocalFileStore;
    use crate::core_tls::TlsConnection;
    use crate::core_transfer::Direction;
    use crate::users::UserConfig;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::net::TcpStream;

    fn site(dir: &std::path::Path) -> Site {
        let users = vec![UserConfig {
            name: "alice".to_string(),
            uid: 1000,
            password_hash: bcrypt::hash("secret", 4).unwrap(),
            max_sim_downloads: 1,
            ..Default::default()
        }];
        Site::for_tests(Arc::new(LocalFileStore::new(dir)), users).unwrap()
    }

    async fn expect_line<R: AsyncBufReadExt + Unpin>(reader: &mut R, prefix: &str) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.starts_with(prefix), "expected {:?}, got {:?}", prefix, line);
        line
    }

    fn pasv_port(reply: &str) -> u16 {
        let inner = &reply[reply.find('(').unwrap() + 1..reply.find(')').unwrap()];
        let parts: Vec<u16> = inner.split(',').map(|p| p.parse().unwrap()).collect();
        parts[4] * 256 + parts[5]
    }

    #[tokio::test]
    async fn test_download_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello\nworld\n").unwrap();
        let site = site(dir.path());
        let counter = Arc::clone(&site.counter);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(start_server(listener, site, shutdown.clone()));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        expect_line(&mut reader, "220 ").await;

        write_half.write_all(b"USER alice\r\n").await.unwrap();
        expect_line(&mut reader, "331 ").await;
        write_half.write_all(b"PASS secret\r\n").await.unwrap();
        expect_line(&mut reader, "230 ").await;
        write_half.write_all(b"TYPE A\r\n").await.unwrap();
        expect_line(&mut reader, "200 ").await;
        write_half.write_all(b"PASV\r\n").await.unwrap();
        let reply = expect_line(&mut reader, "227 ").await;

        let mut data = TcpStream::connect(("127.0.0.1", pasv_port(&reply))).await.unwrap();
        write_half.write_all(b"RETR hello.txt\r\n").await.unwrap();
        expect_line(
            &mut reader,
            "150 Opening ASCII connection for download of hello.txt (12 bytes).",
        )
        .await;
        let mut received = Vec::new();
        data.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello\r\nworld\r\n".to_vec());
        expect_line(&mut reader, "226 Transfer finished @ ").await;
        assert_eq!(counter.active(1000, Direction::Download), 0);

        write_half.write_all(b"QUIT\r\n").await.unwrap();
        expect_line(&mut reader, "221 ").await;

        shutdown.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_connections() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(start_server(listener, site(dir.path()), shutdown.clone()));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        expect_line(&mut reader, "220 ").await;

        shutdown.cancel();
        expect_line(&mut reader, "421 Server shutting down.").await;
        server.await.unwrap().unwrap();
    }

    fn duplex_connection() -> (ControlSession<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(4096);
        (
            ControlSession::new(server, TlsConnection::disabled(), CancellationToken::new()),
            client,
        )
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_connection_future_is_send() {
        let dir = tempfile::tempdir().unwrap();
        let (control, _client) = duplex_connection();
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let connection = handle_connection(control, peer, site(dir.path()));
        assert_send(&connection);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site(dir.path());
        let mut config = (*site.config).clone();
        config.server.idle_timeout_secs = Some(30);
        site.config = Arc::new(config);

        let (control, client) = duplex_connection();
        let peer = "127.0.0.1:40000".parse().unwrap();
        handle_connection(control, peer, site).await.unwrap();

        let mut wire = String::new();
        BufReader::new(client).read_to_string(&mut wire).await.unwrap();
        assert!(wire.starts_with("220 rouilleftpd ready\r\n"));
        assert!(wire.ends_with("421 Idle timeout, closing control connection.\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_fires_on_unterminated_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut site = site(dir.path());
        let mut config = (*site.config).clone();
        config.server.idle_timeout_secs = Some(30);
        site.config = Arc::new(config);

        let (control, mut client) = duplex_connection();
        client.write_all(b"NOOP").await.unwrap();
        let peer = "127.0.0.1:40000".parse().unwrap();
        handle_connection(control, peer, site).await.unwrap();

        let mut wire = String::new();
        client.read_to_string(&mut wire).await.unwrap();
        assert!(wire.ends_with("421 Idle timeout, closing control connection.\r\n"));
    }

    #[tokio::test]
    async fn test_overlong_command_line_closes_connection() {
        let dir = tempfile::tempdir().unwrap();
        let site = site(dir.path());
        let (control, mut client) = duplex_connection();
        client
            .write_all(&vec![b'A'; crate::constants::MAX_COMMAND_LINE])
            .await
            .unwrap();

        let peer = "127.0.0.1:40000".parse().unwrap();
        handle_connection(control, peer, site).await.unwrap();

        let mut wire = String::new();
        client.read_to_string(&mut wire).await.unwrap();
        assert_eq!(
            wire,
            "220 rouilleftpd ready\r\n500 Command line too long.\r\n"
        );
    }

    #[tokio::test]
    async fn test_early_greeting_line_is_executed() {
        let dir = tempfile::tempdir().unwrap();
        let site = site(dir.path());
        let (control, mut client) = duplex_connection();
        client.write_all(b"QUIT\r\n").await.unwrap();

        let peer = "127.0.0.1:40000".parse().unwrap();
        handle_connection(control, peer, site).await.unwrap();

        let mut wire = String::new();
        client.read_to_string(&mut wire).await.unwrap();
        assert_eq!(
            wire,
            "220 rouilleftpd ready\r\n221 Service closing control connection.\r\n"
        );
    }

    #[tokio::test]
    async fn test_ident_greeting_is_not_a_command() {
        let dir = tempfile::tempdir().unwrap();
        let site = site(dir.path());
        let (control, mut client) = duplex_connection();
        client.write_all(b"IDNT alice@10.0.0.5\r\nNOOP\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let peer = "127.0.0.1:40000".parse().unwrap();
        handle_connection(control, peer, site).await.unwrap();

        let mut wire = String::new();
        client.read_to_string(&mut wire).await.unwrap();
        assert_eq!(wire, "220 rouilleftpd ready\r\n200 OK, n00p n00p !\r\n");
    }

    #[test]
    fn test_is_ident_line() {
        assert!(is_ident_line("IDNT user@host"));
        assert!(is_ident_line("idnt x"));
        assert!(!is_ident_line("ID"));
        assert!(!is_ident_line("USER alice"));
    }
}
