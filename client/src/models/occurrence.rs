use jiff::Timestamp;
use payloads::{OccurrenceId, SessionId, collections, responses};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub deployment: responses::DeploymentRef,
    pub session: Option<SessionId>,
    pub determination: Option<responses::TaxonRef>,
    pub determination_score: Option<f64>,
    pub detections_count: u64,
    pub identifications_count: u64,
    pub first_appearance: Option<Timestamp>,
    /// Taxon name, or `"Unknown"` before any determination.
    pub determination_label: String,
    pub score_label: Option<String>,
    pub date_label: Option<String>,
    pub duration_label: Option<String>,
}

impl Entity for Occurrence {
    type Id = OccurrenceId;
    type Record = responses::Occurrence;

    const COLLECTION: &'static str = collections::OCCURRENCES;
    // Species lists carry occurrence counts.
    const RELATED: &'static [&'static str] = &[collections::SPECIES];

    fn from_record(record: responses::Occurrence) -> Self {
        let determination_label = record
            .determination
            .as_ref()
            .map(|taxon| taxon.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let duration_label = record
            .first_appearance_timestamp
            .zip(record.last_appearance_timestamp)
            .map(|(first, last)| {
                format::duration_label(last.duration_since(first))
            });

        Self {
            id: record.id,
            deployment: record.deployment,
            session: record.event.map(|event| event.id),
            determination: record.determination,
            determination_score: record.determination_score,
            detections_count: record.detections_count.unwrap_or_default(),
            identifications_count: record
                .identifications_count
                .unwrap_or_default(),
            first_appearance: record.first_appearance_timestamp,
            determination_label,
            score_label: record.determination_score.map(format::score_label),
            date_label: record
                .first_appearance_timestamp
                .map(format::date_label),
            duration_label,
        }
    }

    fn id(&self) -> OccurrenceId {
        self.id
    }
}
