use jiff::Timestamp;
use payloads::{PipelineId, collections, responses};

use super::Entity;

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub version: Option<u32>,
    pub created_at: Timestamp,
    pub version_label: Option<String>,
}

impl Entity for Pipeline {
    type Id = PipelineId;
    type Record = responses::Pipeline;

    const COLLECTION: &'static str = collections::PIPELINES;

    fn from_record(record: responses::Pipeline) -> Self {
        Self {
            id: record.id,
            name: record.name,
            slug: record.slug,
            description: record.description,
            version: record.version,
            created_at: record.created_at,
            version_label: record.version.map(|v| format!("v{v}")),
        }
    }

    fn id(&self) -> PipelineId {
        self.id
    }
}
