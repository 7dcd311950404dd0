use crate::core_ftp::{ControlError, ControlIo, ControlSession, ReplyCode};
use crate::session::{Session, Site};
use log::{error, info, warn};
use std::sync::Arc;

/// Handles the PASS FTP command.
///
/// Checks the password against the account named by USER. bcrypt is slow on purpose, so
/// the check runs on the blocking pool.
pub async fn handle_pass_command<S: ControlIo>(
    control: &mut ControlSession<S>,
    site: &Site,
    session: &mut Session,
    password: &str,
) -> Result<(), ControlError> {
    let Some(username) = session.pending_user.take() else {
        control.reply(ReplyCode::BadCommandSequence, "Login with USER first.");
        return Ok(());
    };

    let users = Arc::clone(&site.users);
    let password = password.to_string();
    let name = username.clone();
    let user = match tokio::task::spawn_blocking(move || users.authenticate(&name, &password)).await
    {
        Ok(user) => user,
        Err(e) => {
            error!("Password check for {} failed: {}", username, e);
            None
        }
    };

    match user {
        Some(user) => {
            info!("User {} logged in from {}", user.name, session.peer);
            session.user = Some(user);
            control.reply(ReplyCode::UserLoggedIn, "User logged in, proceed.");
        }
        None => {
            warn!("Login incorrect for {} from {}", username, session.peer);
            control.reply(ReplyCode::NotLoggedIn, "Login incorrect.");
        }
    }
    Ok(())
}
