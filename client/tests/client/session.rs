use std::sync::Arc;

use client::models::Project;
use client::{
    Entity, FileCredentialStore, SessionError, current_user, login, logout,
    use_entity_list,
};
use reqwest::StatusCode;
use test_helpers::{
    alice_login_credentials, assert_status_code, bob_login_credentials,
    spawn_app,
};

fn denied_with(result: Result<impl Sized, SessionError>) -> StatusCode {
    match result {
        Err(SessionError::Client(e)) => e.status().expect("no status"),
        Err(e) => panic!("Expected a client error, got {e}"),
        Ok(_) => panic!("Expected an error"),
    }
}

#[tokio::test]
async fn logged_out_requests_have_no_authorization() -> anyhow::Result<()> {
    let app = spawn_app().await;
    assert!(!app.ctx.session().is_logged_in());

    let projects = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    projects.fetch().await?;
    assert!(app.requests().iter().all(|r| r.authorization.is_none()));

    // No request at all for the current user.
    assert!(current_user(&app.ctx).await?.is_none());
    assert_eq!(app.request_count("GET", "/api/v2/users/me"), 0);

    Ok(())
}

#[tokio::test]
async fn login_sends_token_and_resets_cache() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let projects = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    projects.fetch().await?;
    drop(projects);
    assert!(!app.ctx.cache().is_empty());

    app.login_alice().await?;
    assert!(app.ctx.session().is_logged_in());
    assert!(app.ctx.cache().is_empty());

    let user = current_user(&app.ctx).await?.expect("logged in");
    assert_eq!(user.email, test_helpers::mock::ALICE_EMAIL);
    assert_eq!(user.display_name(), "Alice");
    let requests = app.requests_to("GET", "/api/v2/users/me");
    let authorization = requests[0].authorization.as_deref().unwrap_or("");
    assert!(authorization.starts_with("Token "), "{authorization}");

    Ok(())
}

#[tokio::test]
async fn switching_users_never_shows_stale_identity() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.login_alice().await?;
    let alice = current_user(&app.ctx).await?.expect("logged in");

    app.login_bob().await?;
    let bob = current_user(&app.ctx).await?.expect("logged in");

    assert_ne!(alice.id, bob.id);
    assert_eq!(bob.name, "Bob");
    assert_eq!(app.request_count("GET", "/api/v2/users/me"), 2);

    Ok(())
}

#[tokio::test]
async fn wrong_password_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut credentials = alice_login_credentials();
    credentials.password = "not-the-password".into();
    let status = denied_with(login(&app.ctx, &credentials).await);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn revoked_token_clears_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let projects = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    projects.fetch().await?;
    drop(projects);

    app.state.revoke_tokens();
    let status = denied_with(current_user(&app.ctx).await);

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!app.ctx.session().is_logged_in());
    assert!(app.ctx.cache().is_empty());
    // Logged out now, so no further request is made.
    assert!(current_user(&app.ctx).await?.is_none());
    assert_eq!(app.request_count("GET", "/api/v2/users/me"), 1);

    Ok(())
}

#[tokio::test]
async fn forbidden_current_user_clears_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.override_status("GET", "/api/v2/users/me", 403);

    let status = denied_with(current_user(&app.ctx).await);
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn server_error_keeps_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.override_status("GET", "/api/v2/users/me", 500);

    let status = denied_with(current_user(&app.ctx).await);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn denial_from_other_endpoints_keeps_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.override_status("GET", "/api/v2/projects", 403);

    let projects = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    assert_status_code(projects.fetch().await, StatusCode::FORBIDDEN);
    assert!(app.ctx.session().is_logged_in());
    assert!(projects.state().error.is_some());

    Ok(())
}

#[tokio::test]
async fn logout_clears_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    logout(&app.ctx).await?;
    assert!(!app.ctx.session().is_logged_in());
    let requests = app.requests_to("POST", "/api/v2/auth/token/logout");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_some());

    Ok(())
}

#[tokio::test]
async fn rejected_logout_still_clears_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.state.revoke_tokens();

    logout(&app.ctx).await?;
    assert!(!app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn forbidden_logout_still_clears_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.override_status("POST", "/api/v2/auth/token/logout", 403);

    logout(&app.ctx).await?;
    assert!(!app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn failed_logout_keeps_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.override_status("POST", "/api/v2/auth/token/logout", 500);

    let status = denied_with(logout(&app.ctx).await);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn file_store_survives_restart() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let dir = tempfile::tempdir()?;
    let store = || Arc::new(FileCredentialStore::in_dir(dir.path()));

    let ctx = app.context_with_store(store());
    login(&ctx, &bob_login_credentials()).await?;
    drop(ctx);

    let ctx = app.context_with_store(store());
    assert!(ctx.session().is_logged_in());
    let user = current_user(&ctx).await?.expect("restored session");
    assert_eq!(user.name, "Bob");

    logout(&ctx).await?;
    let ctx = app.context_with_store(store());
    assert!(!ctx.session().is_logged_in());

    Ok(())
}

#[tokio::test]
async fn contexts_do_not_share_sessions() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    let other = app.new_context();
    assert!(!other.session().is_logged_in());
    assert!(current_user(&other).await?.is_none());

    Ok(())
}
