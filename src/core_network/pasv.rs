use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::PassiveListener;
use crate::session::{Session, Site};
use log::{debug, error};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::TcpListener;

/// Handles the PASV FTP command.
///
/// Binds a listener on the configured PASV address and a free port. The client connects to
/// it when the next transfer command opens the data connection.
pub async fn handle_pasv_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
) -> Result<(), ControlError> {
    match setup_pasv_listener(&site.config.server.pasv_address).await {
        Ok((listener, pasv_ip, port)) => {
            session
                .data
                .set_connector(Box::new(PassiveListener::new(listener)));
            control.reply(ReplyCode::PassiveMode, format_pasv_reply(pasv_ip, port));
        }
        Err(e) => {
            error!("Failed to set up PASV listener: {}", e);
            control.reply(
                ReplyCode::CantOpenDataConnection,
                format!("Can't open passive connection: {}", e),
            );
        }
    }
    Ok(())
}

/// Sets up a passive mode (PASV) listener on `pasv_address`, port chosen by the system.
pub async fn setup_pasv_listener(pasv_address: &str) -> io::Result<(TcpListener, Ipv4Addr, u16)> {
    let pasv_ip: Ipv4Addr = pasv_address
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let listener = TcpListener::bind((IpAddr::V4(pasv_ip), 0)).await?;
    let port = listener.local_addr()?.port();
    debug!("PASV listener set up on IP: {}, Port: {}", pasv_ip, port);
    Ok((listener, pasv_ip, port))
}

pub fn format_pasv_reply(ip: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = ip.octets();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        h1,
        h2,
        h3,
        h4,
        port / 256,
        port % 256
    )
}
