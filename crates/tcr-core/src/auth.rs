use tracing::{error, info};

use crate::{
    errors::Error,
    ports::{Prompter, SessionPort, SignIn},
    Result,
};

pub const CODE_PROMPT: &str = "Enter the code you received: ";
pub const PASSWORD_PROMPT: &str = "Two-factor authentication enabled. Enter your password: ";

/// Make sure `session` is signed in, running the interactive login if needed.
///
/// Any failure is returned as [`Error::Auth`]; there is no retry.
pub async fn authenticate<S, P>(session: &S, phone: &str, prompter: &P) -> Result<()>
where
    S: SessionPort + ?Sized,
    P: Prompter + ?Sized,
{
    match login(session, phone, prompter).await {
        Ok(()) => {
            info!("Successfully authenticated!");
            Ok(())
        }
        Err(e) => {
            error!("Authentication failed: {e}");
            Err(match e {
                Error::Auth(msg) => Error::Auth(msg),
                other => Error::Auth(other.to_string()),
            })
        }
    }
}

async fn login<S, P>(session: &S, phone: &str, prompter: &P) -> Result<()>
where
    S: SessionPort + ?Sized,
    P: Prompter + ?Sized,
{
    if session.is_authorized().await? {
        return Ok(());
    }

    info!("User not authorized. Starting authentication process...");
    let token = session.request_login_code(phone).await?;
    let code = prompter.prompt(CODE_PROMPT).await?;

    match session.sign_in(&token, code.trim()).await? {
        SignIn::Done => {}
        SignIn::PasswordRequired(password_token) => {
            let label = match session.password_hint(&password_token) {
                Some(hint) => format!("{} (hint: {hint}) ", PASSWORD_PROMPT.trim_end()),
                None => PASSWORD_PROMPT.to_string(),
            };
            let password = prompter.prompt(&label).await?;
            session.check_password(password_token, password.trim()).await?;
        }
    }

    session.save()
}
