use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_transfer::DataType;
use crate::session::Session;

/// Handles the TYPE FTP command.
///
/// `A` (optionally `A N`) selects ASCII, `I` and `L 8` select binary. Everything else is
/// refused with 504.
pub async fn handle_type_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
    arg: &str,
) -> Result<(), ControlError> {
    let parts: Vec<String> = arg.split_whitespace().map(str::to_uppercase).collect();
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

    let data_type = match parts.as_slice() {
        ["A"] | ["A", "N"] => Some(DataType::Ascii),
        ["I"] | ["L", "8"] => Some(DataType::Binary),
        _ => None,
    };

    match data_type {
        Some(data_type) => {
            session.data.set_data_type(data_type);
            let letter = if data_type == DataType::Ascii { 'A' } else { 'I' };
            control.reply(ReplyCode::CommandOkay, format!("Type set to {}.", letter));
        }
        None => {
            control.reply(
                ReplyCode::ParameterNotImplemented,
                "Command not implemented for that parameter.",
            );
        }
    }
    Ok(())
}
