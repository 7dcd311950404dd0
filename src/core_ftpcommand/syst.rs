use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};

/// Handles the SYST (System) FTP command.
///
/// Always answers "UNIX Type: L8", which is what clients expect for a Unix-like listing.
pub async fn handle_syst_command<S: ControlIo>(
    control: &mut ControlSession<S>,
) -> Result<(), ControlError> {
    control.reply(ReplyCode::SystemType, "UNIX Type: L8");
    Ok(())
}
