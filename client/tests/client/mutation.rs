use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use client::models::{Deployment, Job, Project};
use client::{
    MutationStatus, use_create_entity, use_delete_entity, use_entity_action,
    use_entity_details,
};
use payloads::requests::CreateProject;
use payloads::responses::JobStatus;
use reqwest::StatusCode;
use test_helpers::{assert_status_code, spawn_app, wait_until};

#[tokio::test]
async fn delete_is_not_resent_while_success_shows() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let [north, south] = app.dataset.deployments[..] else {
        panic!("expected two deployments");
    };

    let delete = use_delete_entity::<Deployment>(&app.ctx);
    assert_eq!(delete.mutate(south).await?, Some(()));
    assert!(delete.state().is_success());

    // Still showing the success, so this is dropped.
    assert_eq!(delete.mutate(north).await?, None);
    let deletes: Vec<_> = app
        .requests()
        .into_iter()
        .filter(|r| r.method == "DELETE")
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, format!("/api/v2/deployments/{south}"));

    wait_until(|| delete.state().status == MutationStatus::Idle).await?;
    assert_eq!(delete.mutate(north).await?, Some(()));
    assert!(app.state.records("deployments").is_empty());

    Ok(())
}

#[tokio::test]
async fn reset_allows_an_immediate_retry() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let create = use_create_entity::<Project, CreateProject>(&app.ctx)
        .on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let body = |name: &str| CreateProject {
        name: name.into(),
        description: String::new(),
    };
    let first = create.mutate(body("Costa Rica")).await?;
    assert_eq!(first.map(|p| p.name).as_deref(), Some("Costa Rica"));
    create.reset();
    assert_eq!(create.state().status, MutationStatus::Idle);

    assert!(create.mutate(body("Kenya")).await?.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(app.request_count("POST", "/api/v2/projects"), 2);

    Ok(())
}

#[tokio::test]
async fn validation_errors_are_returned_raw() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    let create = use_create_entity::<Project, CreateProject>(&app.ctx);
    let result = create
        .mutate(CreateProject {
            name: String::new(),
            description: "No name".into(),
        })
        .await;
    let message = match &result {
        Err(e) => e.to_string(),
        Ok(_) => panic!("blank name accepted"),
    };
    assert!(message.contains("This field may not be blank."), "{message}");
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let state = create.state();
    assert_eq!(state.status, MutationStatus::Error);
    assert!(state.error.is_some());

    // An error does not block the next attempt.
    let project = create
        .mutate(CreateProject {
            name: "Named".into(),
            description: String::new(),
        })
        .await?;
    assert!(project.is_some());

    Ok(())
}

#[tokio::test]
async fn writes_require_a_session() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let delete = use_delete_entity::<Deployment>(&app.ctx);
    let result = delete.mutate(app.dataset.deployments[0]).await;
    assert_status_code(result, StatusCode::FORBIDDEN);
    assert_eq!(app.state.records("deployments").len(), 2);

    Ok(())
}

#[tokio::test]
async fn job_action_refreshes_job_details() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let id = app.dataset.failed_job;

    let details = use_entity_details::<Job>(&app.ctx, id, None);
    assert_eq!(details.fetch().await?.status, JobStatus::Failure);

    let retry = use_entity_action::<Job>(&app.ctx, "retry");
    retry.mutate(id).await?;
    assert_eq!(
        app.request_count("POST", &format!("/api/v2/jobs/{id}/retry")),
        1
    );

    wait_until(|| {
        details
            .state()
            .item
            .is_some_and(|job| job.status == JobStatus::Pending)
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn abandoned_mutation_still_settles() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let before = app.state.records("projects").len();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let create = use_create_entity::<Project, CreateProject>(&app.ctx)
        .on_success(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let body = |name: &str| CreateProject {
        name: name.into(),
        description: String::new(),
    };

    app.set_latency(Duration::from_millis(200));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        create.mutate(body("Costa Rica")),
    )
    .await;
    assert!(abandoned.is_err());
    app.set_latency(Duration::ZERO);

    wait_until(|| calls.load(Ordering::SeqCst) == 1).await?;
    assert_ne!(create.state().status, MutationStatus::Pending);
    assert_eq!(app.state.records("projects").len(), before + 1);

    create.reset();
    assert!(create.mutate(body("Kenya")).await?.is_some());
    assert_eq!(app.state.records("projects").len(), before + 2);

    Ok(())
}
