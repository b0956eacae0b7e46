use crate::{ClientContext, SessionError};

/// End the session on the server and locally.
///
/// The local credential is cleared when the server accepts the logout, and
/// also when it rejects it as unauthorized, since the token is invalid
/// either way. Any other failure keeps the credential so the user can try
/// again.
pub async fn logout(ctx: &ClientContext) -> Result<(), SessionError> {
    match ctx.api_client().logout().await {
        Ok(()) => {}
        Err(e) if e.is_authorization_denied() => {
            tracing::warn!("logout rejected, clearing local session: {e}");
        }
        Err(e) => return Err(e.into()),
    }
    ctx.session().clear_token()?;
    Ok(())
}
