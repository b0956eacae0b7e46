pub mod api_client;
pub mod query;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError};
pub use query::{
    CanonicalQueryKey, FetchSpecification, Filter, Pagination, Sort,
    SortOrder, build_details_url, build_fetch_url,
};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Prefix shared by every endpoint of the remote API.
pub const API_ROOT: &str = "/api/v2";

/// Collection names as they appear in endpoint paths.
pub mod collections {
    pub const PROJECTS: &str = "projects";
    pub const DEPLOYMENTS: &str = "deployments";
    /// Monitoring sessions are called events by the server.
    pub const SESSIONS: &str = "events";
    pub const CAPTURES: &str = "captures";
    pub const OCCURRENCES: &str = "occurrences";
    pub const SPECIES: &str = "taxa";
    pub const JOBS: &str = "jobs";
    pub const PIPELINES: &str = "pipelines";
    pub const STORAGE_SOURCES: &str = "storage";
    pub const IDENTIFICATIONS: &str = "identifications";
    pub const USERS: &str = "users";
}

/// Id type wrappers help ensure we don't mix up ids for different
/// collections.
macro_rules! id_type {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Debug,
                Clone,
                Copy,
                PartialEq,
                Eq,
                Hash,
                PartialOrd,
                Ord,
                Display,
                Serialize,
                Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i64);
        )*
    };
}

id_type!(
    ProjectId,
    DeploymentId,
    SessionId,
    CaptureId,
    OccurrenceId,
    TaxonId,
    JobId,
    PipelineId,
    StorageSourceId,
    IdentificationId,
    UserId,
);
