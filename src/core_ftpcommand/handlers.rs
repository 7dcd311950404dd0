use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_ftpcommand::ftpcommand::{split_command, FtpCommand};
use crate::core_ftpcommand::{auth, feat, noop, pass, quit, rest, retr, stor, syst, type_, user};
use crate::core_network::{pasv, port};
use crate::session::{Session, Site};
use log::debug;

/// What the connection loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Continue,
    Quit,
}

/// Runs one command line. Replies are staged on `control` (transfers send their own); the
/// caller flushes after every command.
pub async fn handle_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
    line: &str,
) -> Result<CommandResult, ControlError> {
    let (verb, arg) = split_command(line);
    if verb.is_empty() {
        control.reply(ReplyCode::SyntaxError, "Syntax error, command unrecognized.");
        return Ok(CommandResult::Continue);
    }

    let Some(command) = FtpCommand::from_str(verb) else {
        debug!("Unknown command {} from {}", verb, session.peer);
        control.reply(ReplyCode::CommandNotImplemented, "Command not implemented.");
        return Ok(CommandResult::Continue);
    };

    if !session.is_logged_in() && !command.allowed_before_login() {
        control.reply(ReplyCode::NotLoggedIn, "Please login with USER and PASS.");
        return Ok(CommandResult::Continue);
    }

    match command {
        FtpCommand::USER => user::handle_user_command(control, session, arg).await?,
        FtpCommand::PASS => pass::handle_pass_command(control, site, session, arg).await?,
        FtpCommand::AUTH => auth::handle_auth_command(control, arg).await?,
        FtpCommand::PBSZ => auth::handle_pbsz_command(control, arg).await?,
        FtpCommand::PROT => auth::handle_prot_command(control, session, arg).await?,
        FtpCommand::TYPE => type_::handle_type_command(control, session, arg).await?,
        FtpCommand::REST => rest::handle_rest_command(control, session, arg).await?,
        FtpCommand::PASV => pasv::handle_pasv_command(control, site, session).await?,
        FtpCommand::PORT => port::handle_port_command(control, session, arg).await?,
        FtpCommand::RETR => retr::handle_retr_command(control, site, session, arg).await?,
        FtpCommand::STOR => stor::handle_stor_command(control, site, session, arg, false).await?,
        FtpCommand::APPE => stor::handle_stor_command(control, site, session, arg, true).await?,
        FtpCommand::NOOP => noop::handle_noop_command(control).await?,
        FtpCommand::SYST => syst::handle_syst_command(control).await?,
        FtpCommand::FEAT => feat::handle_feat_command(control).await?,
        FtpCommand::QUIT => {
            quit::handle_quit_command(control, session).await?;
            return Ok(CommandResult::Quit);
        }
    }
    Ok(CommandResult::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_fs::LocalFileStore;
    use crate::core_tls::TlsConnection;
    use crate::core_transfer::DataType;
    use crate::users::UserConfig;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio_util::sync::CancellationToken;

    struct Harness {
        control: ControlSession<DuplexStream>,
        client: DuplexStream,
        site: Site,
        session: Session,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let users = vec![UserConfig {
                name: "alice".to_string(),
                uid: 1000,
                password_hash: bcrypt::hash("secret", 4).unwrap(),
                ..Default::default()
            }];
            let site =
                Site::for_tests(Arc::new(LocalFileStore::new(dir.path())), users).unwrap();
            let (client, server) = tokio::io::duplex(4096);
            Self {
                control: ControlSession::new(
                    server,
                    TlsConnection::disabled(),
                    CancellationToken::new(),
                ),
                client,
                session: Session::new("127.0.0.1:50000".parse().unwrap(), site.tls.clone()),
                site,
                _dir: dir,
            }
        }

        /// Runs `line` and returns what went on the wire.
        async fn run(&mut self, line: &str) -> (CommandResult, String) {
            let result = handle_command(&mut self.control, &self.site, &mut self.session, line)
                .await
                .unwrap();
            self.control.flush_reply(true).await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = self.client.read(&mut buf).await.unwrap();
            (result, String::from_utf8_lossy(&buf[..n]).into_owned())
        }

        async fn login(&mut self) {
            self.run("USER alice").await;
            let (_, wire) = self.run("PASS secret").await;
            assert_eq!(wire, "230 User logged in, proceed.\r\n");
        }
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let mut h = Harness::new();
        let (result, wire) = h.run("XYZZY now").await;
        assert_eq!(result, CommandResult::Continue);
        assert_eq!(wire, "502 Command not implemented.\r\n");
    }

    #[tokio::test]
    async fn test_transfer_commands_need_login() {
        let mut h = Harness::new();
        for line in ["RETR file", "STOR file", "PASV", "TYPE I", "REST 10"] {
            let (_, wire) = h.run(line).await;
            assert_eq!(wire, "530 Please login with USER and PASS.\r\n", "{}", line);
        }
        let (_, wire) = h.run("SYST").await;
        assert_eq!(wire, "215 UNIX Type: L8\r\n");
    }

    #[tokio::test]
    async fn test_login_flow() {
        let mut h = Harness::new();
        let (_, wire) = h.run("PASS secret").await;
        assert_eq!(wire, "503 Login with USER first.\r\n");

        let (_, wire) = h.run("USER alice").await;
        assert_eq!(wire, "331 User name okay, need password.\r\n");
        let (_, wire) = h.run("PASS wrong").await;
        assert_eq!(wire, "530 Login incorrect.\r\n");
        assert!(!h.session.is_logged_in());

        h.login().await;
        assert_eq!(h.session.username(), "alice");
    }

    #[tokio::test]
    async fn test_type_and_rest() {
        let mut h = Harness::new();
        h.login().await;

        let (_, wire) = h.run("TYPE I").await;
        assert_eq!(wire, "200 Type set to I.\r\n");
        assert_eq!(h.session.data.data_type(), DataType::Binary);
        let (_, wire) = h.run("TYPE E").await;
        assert!(wire.starts_with("504 "));

        let (_, wire) = h.run("REST 4096").await;
        assert!(wire.starts_with("350 Restarting at 4096."));
        assert_eq!(h.session.data.restart_offset(), 4096);
        let (_, wire) = h.run("REST abc").await;
        assert!(wire.starts_with("501 "));
    }

    #[tokio::test]
    async fn test_retr_without_data_connection_clears_rest() {
        let mut h = Harness::new();
        h.login().await;
        h.run("REST 100").await;
        let (_, wire) = h.run("RETR file.bin").await;
        assert_eq!(wire, "425 Use PORT or PASV first.\r\n");
        assert_eq!(h.session.data.restart_offset(), 0);
    }

    #[tokio::test]
    async fn test_pasv_and_port() {
        let mut h = Harness::new();
        h.login().await;
        let (_, wire) = h.run("PASV").await;
        assert!(wire.starts_with("227 Entering Passive Mode (127,0,0,1,"));
        assert!(h.session.data.has_connector());

        let (_, wire) = h.run("PORT 127,0,0,1,200,10").await;
        assert_eq!(wire, "200 PORT command successful.\r\n");
        let (_, wire) = h.run("PORT 1,2,3").await;
        assert!(wire.starts_with("501 "));
    }

    #[tokio::test]
    async fn test_tls_commands_without_tls() {
        let mut h = Harness::new();
        let (_, wire) = h.run("AUTH TLS").await;
        assert!(wire.starts_with("534 TLS not available."));
        let (_, wire) = h.run("AUTH KERBEROS").await;
        assert!(wire.starts_with("504 "));
        let (_, wire) = h.run("PBSZ 0").await;
        assert!(wire.starts_with("503 "));
        let (_, wire) = h.run("PROT P").await;
        assert!(wire.starts_with("503 "));
        let (_, wire) = h.run("PROT C").await;
        assert_eq!(wire, "200 Protection level set to C.\r\n");
    }

    #[tokio::test]
    async fn test_feat_lists_features() {
        let mut h = Harness::new();
        let (_, wire) = h.run("FEAT").await;
        assert_eq!(
            wire,
            "211-Features:\r\n REST STREAM\r\n PASV\r\n211 End\r\n"
        );
    }

    #[tokio::test]
    async fn test_quit() {
        let mut h = Harness::new();
        let (result, wire) = h.run("QUIT").await;
        assert_eq!(result, CommandResult::Quit);
        assert_eq!(wire, "221 Service closing control connection.\r\n");
    }
}
