use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::session::Session;

/// Handles the REST FTP command. The offset applies to the next RETR/STOR only.
pub async fn handle_rest_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
    arg: &str,
) -> Result<(), ControlError> {
    match arg.parse::<u64>() {
        Ok(offset) => {
            session.data.set_restart_offset(offset);
            control.reply(
                ReplyCode::PendingMoreInfo,
                format!(
                    "Restarting at {}. Send STORE or RETRIEVE to initiate transfer.",
                    offset
                ),
            );
        }
        Err(_) => {
            control.reply(
                ReplyCode::SyntaxErrorParameters,
                "Invalid restart offset.",
            );
        }
    }
    Ok(())
}
