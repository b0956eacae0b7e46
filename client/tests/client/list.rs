use std::time::Duration;

use client::models::{Deployment, Job, Occurrence, Project};
use client::{
    Entity, use_create_entity, use_entity_action, use_entity_details,
    use_entity_list, use_jobs, use_update_entity,
};
use payloads::SortOrder;
use payloads::requests::{CreateDeployment, UpdateDeployment};
use test_helpers::{spawn_app, spawn_app_with, wait_until};

#[tokio::test]
async fn concurrent_lists_share_one_request() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.set_latency(Duration::from_millis(50));

    let first = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    let second = use_entity_list::<Project>(&app.ctx, Project::list_spec());
    let (a, b) = tokio::join!(first.fetch(), second.fetch());

    assert_eq!(a?, b?);
    assert_eq!(app.request_count("GET", "/api/v2/projects"), 1);

    Ok(())
}

#[tokio::test]
async fn filter_order_does_not_split_the_cache() -> anyhow::Result<()> {
    let app = spawn_app_with(|config| {
        config.stale_time = Duration::from_secs(60);
    })
    .await;
    let session = app.dataset.long_session.to_string();
    let deployment = app.dataset.deployments[0].to_string();

    let a = use_entity_list::<Occurrence>(
        &app.ctx,
        Occurrence::list_spec()
            .filter("event", session.clone())
            .filter("deployment", deployment.clone()),
    );
    let b = use_entity_list::<Occurrence>(
        &app.ctx,
        Occurrence::list_spec()
            .filter("deployment", deployment)
            .filter("event", session),
    );
    a.fetch().await?;
    b.fetch().await?;

    assert_eq!(app.request_count("GET", "/api/v2/occurrences"), 1);
    assert_eq!(b.state().items().len(), 6);

    Ok(())
}

#[tokio::test]
async fn list_request_carries_canonical_parameters() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let deployments = use_entity_list::<Deployment>(
        &app.ctx,
        Deployment::list_spec()
            .project(app.dataset.project)
            .page(0, 1)
            .sort("name", SortOrder::Desc),
    );
    let page = deployments.fetch().await?;

    assert_eq!(page.count, 2);
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].name, "Vermont South");

    let requests = app.requests_to("GET", "/api/v2/deployments");
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request.query_param("project_id"),
        Some(app.dataset.project.to_string())
    );
    assert_eq!(request.query_param("limit").as_deref(), Some("1"));
    assert_eq!(request.query_param("offset").as_deref(), Some("0"));
    assert_eq!(request.query_param("ordering").as_deref(), Some("-name"));

    Ok(())
}

#[tokio::test]
async fn changing_the_spec_switches_keys() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut deployments = use_entity_list::<Deployment>(
        &app.ctx,
        Deployment::list_spec().project(app.dataset.project),
    );
    deployments.fetch().await?;
    assert_eq!(deployments.state().total(), Some(2));

    let page = deployments
        .set_spec(Deployment::list_spec().project(app.dataset.other_project))
        .await?;
    assert_eq!(page.count, 0);
    assert!(deployments.state().items().is_empty());
    assert_eq!(app.request_count("GET", "/api/v2/deployments"), 2);

    Ok(())
}

#[tokio::test]
async fn creating_invalidates_and_refetches_lists() -> anyhow::Result<()> {
    let app = spawn_app_with(|config| {
        config.stale_time = Duration::from_secs(60);
    })
    .await;
    app.login_alice().await?;

    let deployments = use_entity_list::<Deployment>(
        &app.ctx,
        Deployment::list_spec().project(app.dataset.project),
    );
    deployments.fetch().await?;
    assert!(!deployments.state().is_stale);

    let create = use_create_entity::<Deployment, CreateDeployment>(&app.ctx);
    let created = create
        .mutate(CreateDeployment {
            project: app.dataset.project,
            name: "Vermont East".into(),
            description: "A third trap".into(),
            latitude: Some(44.0),
            longitude: Some(-71.9),
            data_source: None,
        })
        .await?
        .expect("mutation was idle");
    assert_eq!(created.name, "Vermont East");

    // Marked before anything else gets to run.
    assert!(deployments.state().is_stale);

    wait_until(|| {
        let state = deployments.state();
        !state.is_stale && state.total() == Some(3)
    })
    .await?;
    assert!(
        deployments
            .state()
            .items()
            .iter()
            .any(|deployment| deployment.id == created.id)
    );

    Ok(())
}

#[tokio::test]
async fn details_follow_updates() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let id = app.dataset.deployments[0];

    let project_id = app.dataset.project.to_string();
    let details =
        use_entity_details::<Deployment>(&app.ctx, id, Some(&project_id));
    let deployment = details.fetch().await?;
    assert_eq!(deployment.name, "Vermont North");

    let requests =
        app.requests_to("GET", &format!("/api/v2/deployments/{id}"));
    assert_eq!(requests[0].query_param("project_id"), Some(project_id));

    let update = use_update_entity::<Deployment, UpdateDeployment>(&app.ctx);
    update
        .mutate((
            id,
            UpdateDeployment {
                name: Some("Vermont North (moved)".into()),
                ..Default::default()
            },
        ))
        .await?;

    wait_until(|| {
        details
            .state()
            .item
            .is_some_and(|d| d.name == "Vermont North (moved)")
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn job_list_polls_while_jobs_run() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;

    let mut jobs =
        use_jobs(&app.ctx, Job::list_spec().project(app.dataset.project));
    jobs.fetch().await?;
    assert!(jobs.sync_polling());
    assert!(jobs.is_polling());

    app.clear_requests();
    wait_until(|| app.request_count("GET", "/api/v2/jobs") >= 2).await?;

    let cancel = use_entity_action::<Job>(&app.ctx, "cancel");
    cancel.mutate(app.dataset.running_job).await?;
    wait_until(|| {
        jobs.state()
            .items()
            .iter()
            .all(|job| !job.is_in_progress())
    })
    .await?;

    assert!(!jobs.sync_polling());
    assert!(!jobs.is_polling());

    // Let anything already in flight land before counting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.clear_requests();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(app.request_count("GET", "/api/v2/jobs"), 0);

    Ok(())
}

#[tokio::test]
async fn dropped_list_stops_polling() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let mut projects =
        use_entity_list::<Project>(&app.ctx, Project::list_spec());
    projects.fetch().await?;
    projects.set_poll(true);
    wait_until(|| app.request_count("GET", "/api/v2/projects") >= 3).await?;

    drop(projects);
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.clear_requests();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(app.request_count("GET", "/api/v2/projects"), 0);

    Ok(())
}
