use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::TransferPipeline;
use crate::session::{Session, Site};
use log::{debug, warn};

/// Handles the RETR (Retrieve) FTP command.
///
/// Consumes the pending REST offset and the PASV/PORT setup, then runs the download. The
/// pipeline writes its own replies.
///
/// # Arguments
///
/// * `control` - The control connection.
/// * `site` - Shared server state: file store, counters, statistics.
/// * `session` - The logged-in session.
/// * `arg` - The name of the file to retrieve.
pub async fn handle_retr_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
    arg: &str,
) -> Result<(), ControlError> {
    let offset = session.data.take_restart_offset();
    if arg.is_empty() {
        warn!("RETR command received with no arguments");
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
        .download(arg, offset, data_type)
        .await?;
    debug!(
        "RETR {}: {:?} after {} bytes in {}ms ({:?})",
        arg,
        outcome.reply,
        outcome.bytes,
        outcome.duration.as_millis(),
        outcome.phase
    );
    Ok(())
}
