use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::core_tls::TlsError;
use crate::session::Session;
use log::info;

/// Handles the AUTH FTP command (RFC 4217).
///
/// The 234 reply goes out in plaintext, then the handshake runs on the same socket. A failed
/// handshake leaves the connection unusable and is returned as an error.
pub async fn handle_auth_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    arg: &str,
) -> Result<(), ControlError> {
    let mechanism = arg.to_ascii_uppercase();
    if !matches!(mechanism.as_str(), "TLS" | "SSL" | "TLS-C") {
        control.reply(
            ReplyCode::ParameterNotImplemented,
            format!("AUTH {} not supported.", arg),
        );
        return Ok(());
    }
    if !control.tls().is_enabled() {
        control.reply(
            ReplyCode::ProtectionNotAvailable,
            TlsError::TlsNotConfigured.to_ftp_response(),
        );
        return Ok(());
    }
    if control.is_tls() {
        control.reply(
            ReplyCode::BadCommandSequence,
            TlsError::AlreadyActive.to_ftp_response(),
        );
        return Ok(());
    }

    control
        .respond(
            ReplyCode::SecurityExchangeOkay,
            format!("AUTH {} successful.", mechanism),
        )
        .await?;
    control.negotiate_tls().await?;
    info!("AUTH {} negotiated", mechanism);
    Ok(())
}

/// Handles the PBSZ FTP command. Only a buffer size of 0 makes sense for TLS.
pub async fn handle_pbsz_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    arg: &str,
) -> Result<(), ControlError> {
    if !control.is_tls() {
        control.reply(ReplyCode::BadCommandSequence, "PBSZ requires AUTH first.");
    } else if arg.parse::<u64>().is_err() {
        control.reply(
            ReplyCode::SyntaxErrorParameters,
            "Syntax error in parameters or arguments.",
        );
    } else {
        control.reply(ReplyCode::CommandOkay, "PBSZ=0");
    }
    Ok(())
}

/// Handles the PROT FTP command: `P` protects data connections with TLS, `C` turns it off.
pub async fn handle_prot_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    session: &mut Session,
    arg: &str,
) -> Result<(), ControlError> {
    match arg.to_ascii_uppercase().as_str() {
        "P" if control.is_tls() => {
            session.data.set_protection(true);
            control.reply(ReplyCode::CommandOkay, "Protection level set to P.");
        }
        "P" => {
            control.reply(ReplyCode::BadCommandSequence, "PROT P requires AUTH first.");
        }
        "C" => {
            session.data.set_protection(false);
            control.reply(ReplyCode::CommandOkay, "Protection level set to C.");
        }
        "S" | "E" => {
            control.reply(
                ReplyCode::ProtectionNotAvailable,
                "Protection level not supported.",
            );
        }
        _ => {
            control.reply(
                ReplyCode::ParameterNotImplemented,
                "Unknown protection level.",
            );
        }
    }
    Ok(())
}
