use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::ActiveTarget;
use crate::session::Session;
use log::{info, warn};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Handles the PORT (Active Mode) FTP command.
///
/// Only records the address; the connection is made when a transfer opens the data channel.
pub async fn handle_port_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
    arg: &str,
) -> Result<(), ControlError> {
    let Some(addr) = parse_port_argument(arg) else {
        warn!("Invalid PORT argument: {}", arg);
        control.reply(
            ReplyCode::SyntaxErrorParameters,
            "Syntax error in parameters or arguments.",
        );
        return Ok(());
    };

    info!("PORT {} for {}", addr, session.peer);
    session
        .data
        .set_connector(Box::new(ActiveTarget::new(SocketAddr::V4(addr))));
    control.reply(ReplyCode::CommandOkay, "PORT command successful.");
    Ok(())
}

/// Parses `h1,h2,h3,h4,p1,p2`.
pub fn parse_port_argument(arg: &str) -> Option<SocketAddrV4> {
    let parts: Vec<u8> = arg
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    let [h1, h2, h3, h4, p1, p2] = parts.as_slice() else {
        return None;
    };
    let port = u16::from(*p1) * 256 + u16::from(*p2);
    if port == 0 {
        return None;
    }
    Some(SocketAddrV4::new(Ipv4Addr::new(*h1, *h2, *h3, *h4), port))
}
