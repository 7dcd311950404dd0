use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};

pub async fn handle_noop_command<S: ControlIo>(
    control: &mut ControlSession<S>,
) -> Result<(), ControlError> {
    control.reply(ReplyCode::CommandOkay, "OK, n00p n00p !");
    Ok(())
}
