use std::collections::HashSet;
use std::time::Duration;

use client::models::Occurrence;
use client::{BatchError, Entity, use_create_identifications, use_entity_list};
use payloads::requests::CreateIdentification;
use payloads::{OccurrenceId, TaxonId};
use serde_json::Value;
use test_helpers::{spawn_app, wait_until};

fn identify(
    occurrences: &[OccurrenceId],
    taxon: TaxonId,
) -> Vec<CreateIdentification> {
    occurrences
        .iter()
        .map(|&occurrence| CreateIdentification {
            occurrence,
            taxon_id: taxon,
            comment: String::new(),
        })
        .collect()
}

#[tokio::test]
async fn partial_failure_reports_and_retries_failed_items()
-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let occurrences = &app.dataset.occurrences[..5];
    let taxon = app.dataset.taxa[3];

    for index in [1, 3] {
        app.fail_when(
            "POST",
            "identifications",
            "occurrence",
            occurrences[index].0,
            500,
        );
    }

    let batch =
        use_create_identifications(&app.ctx, identify(occurrences, taxon));
    let error = batch.run().await.unwrap_err();
    assert_eq!(
        error,
        BatchError::Partial {
            failed: 2,
            total: 5,
            plural: "identifications",
        }
    );
    assert_eq!(error.to_string(), "2/5 identifications could not be saved");

    let state = batch.state();
    assert!(!state.is_success());
    assert_eq!(state.failed_indices(), [1, 3]);
    let saved = state
        .outcomes
        .as_ref()
        .map(|outcomes| outcomes.iter().filter(|o| o.is_ok()).count());
    assert_eq!(saved, Some(3));

    app.clear_failures();
    app.clear_requests();
    batch.run().await?;

    let resent: HashSet<_> = app
        .requests_to("POST", "/api/v2/identifications")
        .into_iter()
        .filter_map(|r| r.body?.get("occurrence").and_then(Value::as_i64))
        .collect();
    assert_eq!(resent, HashSet::from([occurrences[1].0, occurrences[3].0]));

    let state = batch.state();
    assert!(state.is_success());
    assert!(state.failed_indices().is_empty());
    assert_eq!(app.state.records("identifications").len(), 5);

    Ok(())
}

#[tokio::test]
async fn single_item_failure_uses_singular_message() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let occurrence = app.dataset.occurrences[4];
    app.fail_when("POST", "identifications", "occurrence", occurrence.0, 400);

    let batch = use_create_identifications(
        &app.ctx,
        identify(&[occurrence], app.dataset.taxa[2]),
    );
    let error = batch.run().await.unwrap_err();
    assert_eq!(error.to_string(), "The identification could not be saved");

    Ok(())
}

#[tokio::test]
async fn changed_item_count_starts_over() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let occurrences = &app.dataset.occurrences;
    let taxon = app.dataset.taxa[2];
    app.fail_when(
        "POST",
        "identifications",
        "occurrence",
        occurrences[0].0,
        500,
    );

    let batch = use_create_identifications(
        &app.ctx,
        identify(&occurrences[..2], taxon),
    );
    assert!(batch.run().await.is_err());

    app.clear_failures();
    batch.set_items(identify(&occurrences[..3], taxon));
    assert!(batch.state().outcomes.is_none());

    app.clear_requests();
    batch.run().await?;
    assert_eq!(app.request_count("POST", "/api/v2/identifications"), 3);

    Ok(())
}

#[tokio::test]
async fn identifications_refresh_occurrence_lists() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let undetermined = app.dataset.occurrences[5];
    let taxon = app.dataset.taxa[3];

    let occurrences = use_entity_list::<Occurrence>(
        &app.ctx,
        Occurrence::list_spec().project(app.dataset.project),
    );
    occurrences.fetch().await?;
    let label = |state: &client::ListState<Occurrence>| {
        state
            .items()
            .iter()
            .find(|o| o.id == undetermined)
            .map(|o| o.determination_label.clone())
    };
    assert_eq!(label(&occurrences.state()).as_deref(), Some("Unknown"));

    let batch =
        use_create_identifications(&app.ctx, identify(&[undetermined], taxon));
    batch.run().await?;

    wait_until(|| {
        label(&occurrences.state()).as_deref() == Some("Hypoprepia fucosa")
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn abandoned_run_still_records_outcomes() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let occurrences = &app.dataset.occurrences[..3];
    let taxon = app.dataset.taxa[2];
    app.fail_when(
        "POST",
        "identifications",
        "occurrence",
        occurrences[1].0,
        500,
    );

    let batch =
        use_create_identifications(&app.ctx, identify(occurrences, taxon));
    app.set_latency(Duration::from_millis(200));
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), batch.run()).await;
    assert!(abandoned.is_err());
    app.set_latency(Duration::ZERO);

    wait_until(|| !batch.state().is_loading).await?;
    assert_eq!(batch.state().failed_indices(), [1]);

    app.clear_failures();
    app.clear_requests();
    batch.run().await?;
    assert_eq!(app.request_count("POST", "/api/v2/identifications"), 1);
    assert!(batch.state().is_success());

    Ok(())
}
