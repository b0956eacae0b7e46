use jiff::Timestamp;
use payloads::{IdentificationId, OccurrenceId, collections, responses};

use super::{Entity, format};

/// A user's taxon suggestion for one occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub id: IdentificationId,
    pub occurrence: OccurrenceId,
    pub taxon: responses::TaxonRef,
    pub comment: String,
    pub created_at: Timestamp,
    pub created_label: String,
}

impl Entity for Identification {
    type Id = IdentificationId;
    type Record = responses::Identification;

    const COLLECTION: &'static str = collections::IDENTIFICATIONS;
    // An identification changes the occurrence's determination and the
    // species counts derived from it.
    const RELATED: &'static [&'static str] =
        &[collections::OCCURRENCES, collections::SPECIES];

    fn from_record(record: responses::Identification) -> Self {
        Self {
            id: record.id,
            occurrence: record.occurrence,
            taxon: record.taxon,
            comment: record.comment,
            created_label: format::date_time_label(record.created_at),
            created_at: record.created_at,
        }
    }

    fn id(&self) -> IdentificationId {
        self.id
    }
}
