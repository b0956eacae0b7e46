//! Login and the "who am I" lookup.
//!
//! These, together with logout, are the only operations allowed to clear
//! the session credential on their own. An authorization failure from any
//! other endpoint is returned to the caller like any other error.

use std::sync::Arc;

use payloads::requests::LoginCredentials;
use payloads::{CanonicalQueryKey, collections};
use secrecy::SecretString;

use crate::models::User;
use crate::{ClientContext, Entity, SessionError};

/// Cache key of the current user.
pub fn current_user_key() -> CanonicalQueryKey {
    CanonicalQueryKey::details(collections::USERS, "me", None)
}

/// Exchange credentials for a token and adopt it, which also clears the
/// cache.
pub async fn login(
    ctx: &ClientContext,
    credentials: &LoginCredentials,
) -> Result<(), SessionError> {
    let token = ctx.api_client().login(credentials).await?;
    ctx.session().set_token(SecretString::from(token.auth_token))?;
    tracing::info!(email = %credentials.email, "logged in");
    Ok(())
}

/// The user the current token belongs to, or `None` without a request when
/// logged out.
///
/// An authorization-denied answer means the token is no longer valid: the
/// credential is cleared before the error is returned. Any other failure
/// leaves the credential untouched.
pub async fn current_user(
    ctx: &ClientContext,
) -> Result<Option<Arc<User>>, SessionError> {
    if !ctx.session().is_logged_in() {
        return Ok(None);
    }
    let client = ctx.api_client();
    let request =
        async move { client.current_user().await.map(User::from_record) };
    match ctx.cache().fetch(&current_user_key(), request).await {
        Ok(user) => Ok(Some(user)),
        Err(e) if e.is_authorization_denied() => {
            tracing::warn!("current user rejected the token: {e}");
            ctx.session().clear_token()?;
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
