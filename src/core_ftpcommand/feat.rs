use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};

const FEATURES: &[&str] = &["AUTH TLS", "PBSZ", "PROT", "REST STREAM", "PASV"];

/// Handles the FEAT FTP command (RFC 2389).
///
/// Feature lines are sent without a code, indented by one space. `AUTH`, `PBSZ` and `PROT`
/// are only listed when TLS is configured.
pub async fn handle_feat_command<S: ControlIo>(
    control: &mut ControlSession<S>,
) -> Result<(), ControlError> {
    control
        .send_line(ReplyCode::SystemStatus, true, "Features:")
        .await?;
    let tls = control.tls().is_enabled();
    for feature in FEATURES {
        let needs_tls = matches!(*feature, "AUTH TLS" | "PBSZ" | "PROT");
        if needs_tls && !tls {
            continue;
        }
        control
            .send_line(ReplyCode::NoCode, true, &format!(" {}", feature))
            .await?;
    }
    control.reply(ReplyCode::SystemStatus, "End");
    Ok(())
}
