//! Client view-models built from server records.
//!
//! Every view-model is recreated from its record on each fetch and never
//! mutated afterwards. Display fields are derived once, at conversion time.

mod capture;
mod deployment;
pub mod format;
mod identification;
mod job;
mod occurrence;
mod pipeline;
mod project;
mod session;
mod species;
mod storage_source;
mod user;

pub use capture::Capture;
pub use deployment::Deployment;
pub use identification::Identification;
pub use job::Job;
pub use occurrence::Occurrence;
pub use pipeline::Pipeline;
pub use project::Project;
pub use session::Session;
pub use species::Species;
pub use storage_source::StorageSource;
pub use user::User;

use std::fmt::Display;
use std::hash::Hash;

use payloads::FetchSpecification;
use payloads::responses::Paginated;
use serde::de::DeserializeOwned;

/// A view-model backed by one collection of the remote API.
pub trait Entity: Sized + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Display + Send + Sync + 'static;
    type Record: DeserializeOwned + Send + 'static;

    /// Path segment of the collection, e.g. `"events"`.
    const COLLECTION: &'static str;
    /// Other collections whose cached data embeds this entity, and which
    /// therefore go stale when it is written.
    const RELATED: &'static [&'static str] = &[];

    fn from_record(record: Self::Record) -> Self;

    fn id(&self) -> Self::Id;

    fn list_spec() -> FetchSpecification {
        FetchSpecification::new(Self::COLLECTION)
    }
}

/// One fetched page of an ordered collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Server-reported total across all pages of the query.
    pub count: u64,
    pub page: u64,
}

impl<T> Page<T> {
    pub fn from_response<R>(
        response: Paginated<R>,
        page: u64,
        convert: impl Fn(R) -> T,
    ) -> Self {
        Self {
            results: response.results.into_iter().map(convert).collect(),
            count: response.count,
            page,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
