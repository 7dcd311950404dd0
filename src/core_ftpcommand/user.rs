use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::session::Session;
use log::info;

/// Handles the USER FTP command.
///
/// Remembers the name for the following PASS and drops any earlier login.
///
/// # Arguments
///
/// * `control` - The control connection the reply is staged on.
/// * `session` - The connection's session state.
/// * `username` - The username provided by the client.
pub async fn handle_user_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
    username: &str,
) -> Result<(), ControlError> {
    if username.is_empty() {
        control.reply(
            ReplyCode::SyntaxErrorParameters,
            "Syntax error in parameters or arguments.",
        );
        return Ok(());
    }

    info!("Received USER command with username: {}", username);
    session.user = None;
    session.pending_user = Some(username.to_string());
    control.reply(ReplyCode::NeedPassword, "User name okay, need password.");
    Ok(())
}
