use jiff::Timestamp;
use payloads::{TaxonId, collections, responses};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub id: TaxonId,
    pub name: String,
    pub rank: String,
    pub parent: Option<responses::TaxonRef>,
    pub occurrences_count: u64,
    pub last_detected: Option<Timestamp>,
    /// `"SPECIES"` becomes `"Species"`.
    pub rank_label: String,
    pub last_detected_label: Option<String>,
}

impl Entity for Species {
    type Id = TaxonId;
    type Record = responses::Taxon;

    const COLLECTION: &'static str = collections::SPECIES;

    fn from_record(record: responses::Taxon) -> Self {
        Self {
            id: record.id,
            rank_label: capitalize(&record.rank),
            last_detected_label: record.last_detected.map(format::date_label),
            name: record.name,
            rank: record.rank,
            parent: record.parent,
            occurrences_count: record.occurrences_count.unwrap_or_default(),
            last_detected: record.last_detected,
        }
    }

    fn id(&self) -> TaxonId {
        self.id
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
