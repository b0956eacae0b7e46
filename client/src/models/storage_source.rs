use jiff::Timestamp;
use payloads::{ProjectId, StorageSourceId, collections, responses};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSource {
    pub id: StorageSourceId,
    pub project: ProjectId,
    pub name: String,
    pub bucket: String,
    pub prefix: String,
    pub endpoint_url: Option<String>,
    pub public_base_url: Option<String>,
    pub total_files: u64,
    pub total_size: u64,
    pub updated_at: Timestamp,
    /// `"s3://bucket/prefix"`.
    pub uri: String,
    pub size_label: String,
    pub files_label: String,
}

impl Entity for StorageSource {
    type Id = StorageSourceId;
    type Record = responses::StorageSource;

    const COLLECTION: &'static str = collections::STORAGE_SOURCES;
    const RELATED: &'static [&'static str] = &[collections::DEPLOYMENTS];

    fn from_record(record: responses::StorageSource) -> Self {
        let prefix = record.prefix.trim_matches('/');
        let uri = if prefix.is_empty() {
            format!("s3://{}", record.bucket)
        } else {
            format!("s3://{}/{prefix}", record.bucket)
        };
        let total_files = record.total_files.unwrap_or_default();
        let total_size = record.total_size.unwrap_or_default();

        Self {
            id: record.id,
            project: record.project,
            name: record.name,
            uri,
            bucket: record.bucket,
            prefix: record.prefix,
            endpoint_url: record.endpoint_url,
            public_base_url: record.public_base_url,
            total_files,
            total_size,
            updated_at: record.updated_at,
            size_label: format::file_size_label(total_size),
            files_label: format::count_label(total_files),
        }
    }

    fn id(&self) -> StorageSourceId {
        self.id
    }
}
