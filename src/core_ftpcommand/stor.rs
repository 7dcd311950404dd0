use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::TransferPipeline;
use crate::session::{Session, Site};
use log::{debug, warn};

/// Handles the STOR (Store) and, with `append`, the APPE FTP commands.
pub async fn handle_stor_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
    arg: &str,
    append: bool,
) -> Result<(), ControlError> {
    let offset = session.data.take_restart_offset();
    if arg.is_empty() {
        warn!("STOR command received with no arguments");
        control.reply(
            ReplyCode::SyntaxErrorParameters,
            "Syntax error in parameters or arguments.",
        );
        return Ok(());
    }
    if !session.data.has_connector() {
        control.reply(ReplyCode::CantOpenDataConnection, "Use PORT or PASV first.");
        return Ok(());
    }
    let Some(user) = session.user.clone() else {
        control.reply(ReplyCode::NotLoggedIn, "Please login with USER and PASS.");
        return Ok(());
    };

    let data_type = session.data.data_type();
    let outcome = TransferPipeline::new(control, &mut session.data, &user, site)
        .upload(arg, offset, data_type, append)
        .await?;
    debug!(
        "{} {}: {:?} after {} bytes in {}ms ({:?})",
        outcome.direction.as_str(),
        arg,
        outcome.reply,
        outcome.bytes,
        outcome.duration.as_millis(),
        outcome.phase
    );
    Ok(())
}
