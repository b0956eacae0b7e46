//! Development dataset for the mock API
//!
//! This module provides realistic monitoring data used by:
//! - The development server (dev-server)
//! - The client's integration tests
//!
//! The data mirrors a small real deployment:
//! - Two projects, the first with two light-trap deployments
//! - One long night of captures (enough for several windowed pages) and a
//!   short second night
//! - Occurrences with and without a determination
//! - Jobs in running, finished and failed states

use anyhow::Result;
use jiff::{SignedDuration, Timestamp};
use payloads::{
    CaptureId, DeploymentId, JobId, OccurrenceId, PipelineId, ProjectId,
    SessionId, StorageSourceId, TaxonId, collections,
};
use serde_json::{Value, json};

use crate::MockState;

pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_PASSWORD: &str = "password123";
pub const BOB_EMAIL: &str = "bob@example.com";
pub const BOB_PASSWORD: &str = "password456";

/// Captures in the first night.
pub const LONG_SESSION_CAPTURES: usize = 25;

/// Ids of the seeded records tests refer to.
pub struct DevDataset {
    pub alice_id: i64,
    pub project: ProjectId,
    pub other_project: ProjectId,
    pub deployments: Vec<DeploymentId>,
    pub long_session: SessionId,
    pub short_session: SessionId,
    /// Captures of the long session in time order.
    pub captures: Vec<CaptureId>,
    pub occurrences: Vec<OccurrenceId>,
    /// Order, family, then two species.
    pub taxa: Vec<TaxonId>,
    pub running_job: JobId,
    pub finished_job: JobId,
    pub failed_job: JobId,
    pub pipeline: PipelineId,
    pub storage_source: StorageSourceId,
}

impl DevDataset {
    pub fn create(state: &MockState) -> Result<Self> {
        let base: Timestamp = "2023-06-01T22:00:00Z".parse()?;
        let created = at(base, -60 * 24 * 30)?;

        tracing::info!("👤 Creating users");
        let alice_id = state.add_user("Alice", ALICE_EMAIL, ALICE_PASSWORD);
        state.add_user("Bob", BOB_EMAIL, BOB_PASSWORD);

        tracing::info!("🗂️ Creating projects and deployments");
        let project = ProjectId(state.insert(
            collections::PROJECTS,
            json!({
                "name": "Vermont Atlas of Life",
                "description": "Nightly moth monitoring across Vermont",
                "created_at": created,
                "updated_at": created,
                "deployments_count": 2,
            }),
        ));
        let other_project = ProjectId(state.insert(
            collections::PROJECTS,
            json!({
                "name": "Panama Plus",
                "description": "Insect monitoring at Barro Colorado Island",
                "created_at": created,
                "updated_at": created,
                "deployments_count": 0,
            }),
        ));

        let pipeline = PipelineId(state.insert(
            collections::PIPELINES,
            json!({
                "name": "Quebec & Vermont Species Classifier",
                "slug": "quebec-vermont-species",
                "description": "Moth species classifier for the north-east",
                "version": 2,
                "created_at": created,
            }),
        ));
        state.insert(
            collections::PIPELINES,
            json!({
                "name": "Moth Detector",
                "slug": "moth-detector",
                "description": "Object detection only",
                "version": 1,
                "created_at": created,
            }),
        );

        let storage_source = StorageSourceId(state.insert(
            collections::STORAGE_SOURCES,
            json!({
                "project": project.0,
                "name": "Vermont camera uploads",
                "bucket": "ami-vermont",
                "prefix": "deployments/",
                "endpoint_url": "https://s3.example.org",
                "public_base_url": "https://images.example.org",
                "total_files": 1520,
                "total_size": 3_221_225_472u64,
                "created_at": created,
                "updated_at": created,
            }),
        ));

        let north = create_deployment(
            state,
            project,
            "Vermont North",
            (44.9, -72.4),
            Some(storage_source),
            &created,
        );
        let south = create_deployment(
            state,
            project,
            "Vermont South",
            (42.8, -72.6),
            None,
            &created,
        );

        tracing::info!("🦋 Creating taxa");
        let order = create_taxon(state, "Lepidoptera", "ORDER", None);
        let family = create_taxon(state, "Erebidae", "FAMILY", Some(order));
        let relicta =
            create_taxon(state, "Catocala relicta", "SPECIES", Some(family));
        let fucosa =
            create_taxon(state, "Hypoprepia fucosa", "SPECIES", Some(family));

        tracing::info!("🌙 Creating sessions and captures");
        let long_session = SessionId(state.insert(
            collections::SESSIONS,
            json!({
                "deployment": north.1,
                "start": at(base, 0)?,
                "end": at(base, 10 * LONG_SESSION_CAPTURES as i64)?,
                "captures_count": LONG_SESSION_CAPTURES,
                "occurrences_count": 6,
                "taxa_count": 2,
            }),
        ));
        let night_two = at(base, 24 * 60)?;
        let short_session = SessionId(state.insert(
            collections::SESSIONS,
            json!({
                "deployment": north.1,
                "start": night_two,
                "end": at(base, 24 * 60 + 50)?,
                "captures_count": 5,
                "occurrences_count": 0,
                "taxa_count": 0,
            }),
        ));

        let mut captures = Vec::with_capacity(LONG_SESSION_CAPTURES);
        for i in 0..LONG_SESSION_CAPTURES {
            let timestamp = at(base, 10 * i as i64)?;
            captures.push(CaptureId(create_capture(
                state,
                &north.1,
                long_session,
                &timestamp,
            )));
        }
        for i in 0..5 {
            let timestamp = at(base, 24 * 60 + 10 * i)?;
            create_capture(state, &north.1, short_session, &timestamp);
        }

        tracing::info!("🔍 Creating occurrences");
        let mut occurrences = Vec::new();
        let session_start = at(base, 0)?;
        for i in 0..6 {
            let determination = match i {
                0 | 1 => Some((relicta, "Catocala relicta")),
                2 => Some((fucosa, "Hypoprepia fucosa")),
                _ => None,
            }
            .map(|(id, name)| {
                json!({ "id": id.0, "name": name, "rank": "SPECIES" })
            });
            let score = determination.as_ref().map(|_| 0.87);
            let first = at(base, 10 * i)?;
            let last = at(base, 10 * i + 45)?;
            occurrences.push(OccurrenceId(state.insert(
                collections::OCCURRENCES,
                json!({
                    "deployment": north.1,
                    "event": { "id": long_session.0, "start": session_start },
                    "determination": determination,
                    "determination_score": score,
                    "detections_count": 3,
                    "first_appearance_timestamp": first,
                    "last_appearance_timestamp": last,
                    "identifications_count": 0,
                }),
            )));
        }

        tracing::info!("⚙️ Creating jobs");
        let job = |name: &str, status: &str, progress: f64| {
            let started_at = match status {
                "CREATED" => Value::Null,
                _ => json!(created),
            };
            json!({
                "project": project.0,
                "name": name,
                "status": status,
                "progress": progress,
                "job_type_key": "ml",
                "pipeline": {
                    "id": pipeline.0,
                    "name": "Quebec & Vermont Species Classifier",
                },
                "created_at": created,
                "started_at": started_at,
                "finished_at": Value::Null,
            })
        };
        let running_job = JobId(state.insert(
            collections::JOBS,
            job("Process first night", "STARTED", 0.4),
        ));
        let finished_job = JobId(state.insert(
            collections::JOBS,
            job("Sync captures", "SUCCESS", 1.0),
        ));
        let failed_job = JobId(state.insert(
            collections::JOBS,
            job("Export occurrences", "FAILURE", 0.1),
        ));

        Ok(Self {
            alice_id,
            project,
            other_project,
            deployments: vec![DeploymentId(north.0), DeploymentId(south.0)],
            long_session,
            short_session,
            captures,
            occurrences,
            taxa: vec![order, family, relicta, fucosa],
            running_job,
            finished_job,
            failed_job,
            pipeline,
            storage_source,
        })
    }

    pub fn print_summary(&self) {
        tracing::info!("📋 Development data summary:");
        tracing::info!(
            "   Login: {ALICE_EMAIL} / {ALICE_PASSWORD} \
             (or {BOB_EMAIL} / {BOB_PASSWORD})"
        );
        tracing::info!(
            "   Projects: {} (main), {} (empty)",
            self.project,
            self.other_project
        );
        tracing::info!(
            "   Session {} has {} captures, session {} has 5",
            self.long_session,
            self.captures.len(),
            self.short_session
        );
        tracing::info!(
            "   Jobs: {} running, {} finished, {} failed",
            self.running_job,
            self.finished_job,
            self.failed_job
        );
    }
}

/// `base` shifted by `minutes`, in the server's timestamp format.
fn at(base: Timestamp, minutes: i64) -> Result<String> {
    Ok(base
        .checked_add(SignedDuration::from_mins(minutes))?
        .to_string())
}

/// Returns the new id and the reference embedded in child records.
fn create_deployment(
    state: &MockState,
    project: ProjectId,
    name: &str,
    (latitude, longitude): (f64, f64),
    data_source: Option<StorageSourceId>,
    created: &str,
) -> (i64, Value) {
    let id = state.insert(
        collections::DEPLOYMENTS,
        json!({
            "project": project.0,
            "name": name,
            "description": format!("Light trap at {name}"),
            "latitude": latitude,
            "longitude": longitude,
            "data_source": data_source.map(|s| s.0),
            "first_date": "2023-06-01T22:00:00Z",
            "last_date": "2023-06-02T22:50:00Z",
            "captures_count": LONG_SESSION_CAPTURES + 5,
            "occurrences_count": 6,
            "taxa_count": 2,
            "created_at": created,
            "updated_at": created,
        }),
    );
    (id, json!({ "id": id, "name": name }))
}

fn create_taxon(
    state: &MockState,
    name: &str,
    rank: &str,
    parent: Option<TaxonId>,
) -> TaxonId {
    let parent = parent.and_then(|parent| {
        state.get(collections::SPECIES, parent.0).map(|record| {
            json!({
                "id": parent.0,
                "name": record["name"],
                "rank": record["rank"],
            })
        })
    });
    TaxonId(state.insert(
        collections::SPECIES,
        json!({
            "name": name,
            "rank": rank,
            "parent": parent,
            "occurrences_count": 0,
            "last_detected": Value::Null,
        }),
    ))
}

fn create_capture(
    state: &MockState,
    deployment: &Value,
    session: SessionId,
    timestamp: &str,
) -> i64 {
    let path = format!("north/{}.jpg", timestamp.replace(':', ""));
    state.insert(
        collections::CAPTURES,
        json!({
            "deployment": deployment,
            "event": { "id": session.0 },
            "timestamp": timestamp,
            "url": format!("https://images.example.org/{path}"),
            "path": path,
            "width": 4096,
            "height": 2160,
            "detections_count": 2,
        }),
    )
}
