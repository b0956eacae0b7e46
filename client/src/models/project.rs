use jiff::Timestamp;
use payloads::{ProjectId, collections, responses};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deployments_count: Option<u64>,
    pub created_label: String,
    pub updated_label: String,
}

impl Entity for Project {
    type Id = ProjectId;
    type Record = responses::Project;

    const COLLECTION: &'static str = collections::PROJECTS;

    fn from_record(record: responses::Project) -> Self {
        Self {
            id: record.id,
            created_label: format::date_label(record.created_at),
            updated_label: format::date_label(record.updated_at),
            name: record.name,
            description: record.description,
            created_at: record.created_at,
            updated_at: record.updated_at,
            deployments_count: record.deployments_count,
        }
    }

    fn id(&self) -> ProjectId {
        self.id
    }
}
