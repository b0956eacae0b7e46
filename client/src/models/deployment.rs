use jiff::Timestamp;
use payloads::{
    DeploymentId, ProjectId, StorageSourceId, collections, responses,
};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub id: DeploymentId,
    pub project: ProjectId,
    pub name: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub data_source: Option<StorageSourceId>,
    pub first_date: Option<Timestamp>,
    pub last_date: Option<Timestamp>,
    pub captures_count: u64,
    pub occurrences_count: u64,
    pub taxa_count: u64,
    pub updated_at: Timestamp,
    /// `"51.5000, -0.1200"` when both coordinates are known.
    pub coordinates_label: Option<String>,
    pub date_range_label: Option<String>,
    pub captures_label: String,
}

impl Entity for Deployment {
    type Id = DeploymentId;
    type Record = responses::Deployment;

    const COLLECTION: &'static str = collections::DEPLOYMENTS;
    // Projects embed a deployment count.
    const RELATED: &'static [&'static str] = &[collections::PROJECTS];

    fn from_record(record: responses::Deployment) -> Self {
        let coordinates_label = record
            .latitude
            .zip(record.longitude)
            .map(|(lat, long)| format!("{lat:.4}, {long:.4}"));
        let date_range_label = match (record.first_date, record.last_date) {
            (Some(first), Some(last)) => Some(format!(
                "{} - {}",
                format::date_label(first),
                format::date_label(last)
            )),
            (Some(only), None) | (None, Some(only)) => {
                Some(format::date_label(only))
            }
            (None, None) => None,
        };
        let captures_count = record.captures_count.unwrap_or_default();

        Self {
            id: record.id,
            project: record.project,
            name: record.name,
            description: record.description,
            latitude: record.latitude,
            longitude: record.longitude,
            data_source: record.data_source,
            first_date: record.first_date,
            last_date: record.last_date,
            captures_count,
            occurrences_count: record.occurrences_count.unwrap_or_default(),
            taxa_count: record.taxa_count.unwrap_or_default(),
            updated_at: record.updated_at,
            coordinates_label,
            date_range_label,
            captures_label: format::count_label(captures_count),
        }
    }

    fn id(&self) -> DeploymentId {
        self.id
    }
}
