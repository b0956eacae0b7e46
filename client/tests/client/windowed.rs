use std::collections::HashSet;
use std::time::Duration;

use client::use_session_captures;
use payloads::collections;
use serde_json::json;
use test_helpers::mock::LONG_SESSION_CAPTURES;
use test_helpers::{spawn_app, wait_until};

#[tokio::test]
async fn window_grows_in_both_directions() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let captures = &app.dataset.captures;

    // Page size 10, so offset 12 lands in the second page.
    let window = use_session_captures(&app.ctx, app.dataset.long_session, 12);
    window.fetch_initial_page().await?;

    let state = window.state();
    assert_eq!(state.first_offset(window.page_size()), Some(10));
    assert_eq!(state.count, Some(LONG_SESSION_CAPTURES as u64));
    assert!(state.has_previous_page);
    assert!(state.has_next_page);
    let ids: Vec<_> = state.items().iter().map(|c| c.id).collect();
    assert_eq!(ids, captures[10..20]);

    assert!(window.fetch_next_page().await?);
    let state = window.state();
    assert_eq!(state.items().len(), 15);
    assert!(!state.has_next_page);
    assert!(!window.fetch_next_page().await?);

    assert!(window.fetch_previous_page().await?);
    let state = window.state();
    assert!(!state.has_previous_page);
    assert!(!window.fetch_previous_page().await?);
    let ids: Vec<_> = state.items().iter().map(|c| c.id).collect();
    assert_eq!(ids, *captures);

    let offsets: Vec<_> = app
        .requests_to("GET", "/api/v2/captures")
        .iter()
        .filter_map(|r| r.query_param("offset"))
        .collect();
    assert_eq!(offsets, ["10", "20", "0"]);

    Ok(())
}

#[tokio::test]
async fn captures_are_requested_in_time_order() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    window.fetch_initial_page().await?;

    let requests = app.requests_to("GET", "/api/v2/captures");
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].query_param("event"),
        Some(app.dataset.long_session.to_string())
    );
    assert_eq!(
        requests[0].query_param("ordering").as_deref(),
        Some("timestamp")
    );
    assert_eq!(requests[0].query_param("limit").as_deref(), Some("10"));

    let state = window.state();
    assert!(!state.has_previous_page);
    let timestamps: Vec<_> =
        state.items().iter().map(|c| c.timestamp).collect();
    assert!(timestamps.is_sorted());

    Ok(())
}

#[tokio::test]
async fn overlapping_pages_do_not_repeat_items() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    window.fetch_initial_page().await?;

    // An earlier capture arrives, shifting every later page by one.
    app.state.insert(
        collections::CAPTURES,
        json!({
            "deployment": {
                "id": app.dataset.deployments[0].0,
                "name": "Vermont North",
            },
            "event": { "id": app.dataset.long_session.0 },
            "timestamp": "2023-06-01T21:50:00Z",
            "path": "north/late-upload.jpg",
        }),
    );
    assert!(window.fetch_next_page().await?);

    let state = window.state();
    assert_eq!(state.count, Some(LONG_SESSION_CAPTURES as u64 + 1));
    let items = state.items();
    assert_eq!(items.len(), 19);
    let unique: HashSet<_> = items.iter().map(|c| c.id).collect();
    assert_eq!(unique.len(), items.len());

    Ok(())
}

#[tokio::test]
async fn failed_page_is_reported() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.override_status("GET", "/api/v2/captures", 500);

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    assert!(window.fetch_initial_page().await.is_err());

    let state = window.state();
    assert!(state.error.is_some());
    assert!(state.items().is_empty());
    assert!(!state.has_next_page);

    Ok(())
}

#[tokio::test]
async fn clearing_the_session_empties_the_window() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    window.fetch_initial_page().await?;
    assert_eq!(window.state().items().len(), 10);

    // Anonymous reads are refused, so the reload after logout fails.
    app.override_status("GET", "/api/v2/captures", 403);
    app.ctx.session().clear_token()?;
    assert!(window.state().items().is_empty());

    wait_until(|| window.state().error.is_some()).await?;
    let state = window.state();
    assert!(state.items().is_empty());
    assert!(!state.has_next_page);

    Ok(())
}

#[tokio::test]
async fn page_requested_before_clear_is_dropped() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let captures = &app.dataset.captures;

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    window.fetch_initial_page().await?;

    app.set_latency(Duration::from_millis(200));
    let logout = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.ctx.session().clear_token()
    };
    let (next, cleared) = tokio::join!(window.fetch_next_page(), logout);
    cleared?;
    next?;

    let state = window.state();
    assert!(state.items().len() <= 10);
    assert!(state.items().iter().all(|c| !captures[10..20].contains(&c.id)));

    // The reload after the clear brings back only the first page.
    app.set_latency(Duration::ZERO);
    wait_until(|| window.state().items().len() == 10).await?;

    Ok(())
}

#[tokio::test]
async fn abandoned_page_load_can_be_retried() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let window = use_session_captures(&app.ctx, app.dataset.long_session, 0);
    window.fetch_initial_page().await?;

    app.set_latency(Duration::from_millis(200));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        window.fetch_next_page(),
    )
    .await;
    assert!(abandoned.is_err());
    app.set_latency(Duration::ZERO);

    assert!(!window.state().is_fetching_next_page);
    assert!(window.fetch_next_page().await?);
    assert_eq!(window.state().items().len(), 20);

    Ok(())
}
