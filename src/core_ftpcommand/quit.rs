use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::session::Session;
use log::info;

/// Handles the QUIT FTP command.
///
/// Stages the 221 reply; the connection loop flushes it and closes the connection.
pub async fn handle_quit_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
) -> Result<(), ControlError> {
    info!("Received QUIT command from {} ({})", session.peer, session.username());
    control.reply(ReplyCode::ClosingControl, "Service closing control connection.");
    Ok(())
}
