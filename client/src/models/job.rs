use jiff::Timestamp;
use payloads::{JobId, ProjectId, collections, responses};
use payloads::responses::JobStatus;

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub project: ProjectId,
    pub name: String,
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub job_type_key: String,
    pub pipeline: Option<responses::PipelineRef>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub status_label: &'static str,
    /// Whole percent, e.g. `"45%"`.
    pub progress_label: Option<String>,
    pub created_label: String,
}

impl Job {
    /// Whether the server may still change this job without user action.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Created
                | JobStatus::Pending
                | JobStatus::Started
                | JobStatus::Retry
                | JobStatus::Cancelling
        )
    }
}

impl Entity for Job {
    type Id = JobId;
    type Record = responses::Job;

    const COLLECTION: &'static str = collections::JOBS;

    fn from_record(record: responses::Job) -> Self {
        Self {
            id: record.id,
            project: record.project,
            name: record.name,
            status: record.status,
            progress: record.progress,
            job_type_key: record.job_type_key,
            pipeline: record.pipeline,
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            status_label: status_label(record.status),
            progress_label: record
                .progress
                .map(|p| format!("{:.0}%", (p * 100.0).clamp(0.0, 100.0))),
            created_label: format::date_time_label(record.created_at),
        }
    }

    fn id(&self) -> JobId {
        self.id
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Created => "Created",
        JobStatus::Pending => "Pending",
        JobStatus::Started => "Running",
        JobStatus::Success => "Completed",
        JobStatus::Failure => "Failed",
        JobStatus::Retry => "Retrying",
        JobStatus::Cancelling => "Cancelling",
        JobStatus::Revoked => "Cancelled",
        JobStatus::Unknown => "Unknown",
    }
}
