//! Records exactly as the server returns them.

use crate::{
    CaptureId, DeploymentId, IdentificationId, JobId, OccurrenceId,
    PipelineId, ProjectId, SessionId, StorageSourceId, TaxonId, UserId,
};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Total number of records matching the query, across all pages.
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRef {
    pub id: DeploymentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRef {
    pub id: SessionId,
    #[serde(default)]
    pub start: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRef {
    pub id: TaxonId,
    pub name: String,
    #[serde(default)]
    pub rank: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: PipelineId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Only present when requested with `with_counts`.
    #[serde(default)]
    pub deployments_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub project: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub data_source: Option<StorageSourceId>,
    #[serde(default)]
    pub first_date: Option<Timestamp>,
    #[serde(default)]
    pub last_date: Option<Timestamp>,
    #[serde(default)]
    pub captures_count: Option<u64>,
    #[serde(default)]
    pub occurrences_count: Option<u64>,
    #[serde(default)]
    pub taxa_count: Option<u64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A monitoring session, usually one night of captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub deployment: DeploymentRef,
    pub start: Timestamp,
    #[serde(default)]
    pub end: Option<Timestamp>,
    #[serde(default)]
    pub captures_count: Option<u64>,
    #[serde(default)]
    pub occurrences_count: Option<u64>,
    #[serde(default)]
    pub taxa_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub id: CaptureId,
    pub deployment: DeploymentRef,
    #[serde(default)]
    pub event: Option<SessionRef>,
    pub timestamp: Timestamp,
    pub path: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub detections_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub deployment: DeploymentRef,
    #[serde(default)]
    pub event: Option<SessionRef>,
    #[serde(default)]
    pub determination: Option<TaxonRef>,
    #[serde(default)]
    pub determination_score: Option<f64>,
    #[serde(default)]
    pub detections_count: Option<u64>,
    #[serde(default)]
    pub first_appearance_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub last_appearance_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub identifications_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    pub id: TaxonId,
    pub name: String,
    pub rank: String,
    #[serde(default)]
    pub parent: Option<TaxonRef>,
    #[serde(default)]
    pub occurrences_count: Option<u64>,
    #[serde(default)]
    pub last_detected: Option<Timestamp>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Created,
    Pending,
    Started,
    Success,
    Failure,
    Retry,
    Cancelling,
    Revoked,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project: ProjectId,
    pub name: String,
    #[serde(default)]
    pub status: JobStatus,
    /// Fraction complete, 0.0 to 1.0.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub job_type_key: String,
    #[serde(default)]
    pub pipeline: Option<PipelineRef>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<u32>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSource {
    pub id: StorageSourceId,
    pub project: ProjectId,
    pub name: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default)]
    pub total_files: Option<u64>,
    /// Bytes.
    #[serde(default)]
    pub total_size: Option<u64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub id: IdentificationId,
    pub occurrence: OccurrenceId,
    pub taxon: TaxonRef,
    #[serde(default)]
    pub comment: String,
    pub created_at: Timestamp,
}
