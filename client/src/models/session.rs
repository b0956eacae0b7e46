use jiff::Timestamp;
use payloads::{SessionId, collections, responses};

use super::{Entity, format};

/// A monitoring session, shown to users as one night of captures.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub deployment: responses::DeploymentRef,
    pub start: Timestamp,
    pub end: Option<Timestamp>,
    pub captures_count: u64,
    pub occurrences_count: u64,
    pub taxa_count: u64,
    pub date_label: String,
    /// `"22:00 - 04:15"`, or only the start while the session is open.
    pub time_range_label: String,
    pub duration_label: Option<String>,
}

impl Entity for Session {
    type Id = SessionId;
    type Record = responses::Session;

    const COLLECTION: &'static str = collections::SESSIONS;
    const RELATED: &'static [&'static str] = &[collections::DEPLOYMENTS];

    fn from_record(record: responses::Session) -> Self {
        let time_range_label = match record.end {
            Some(end) => format!(
                "{} - {}",
                format::time_label(record.start),
                format::time_label(end)
            ),
            None => format::time_label(record.start),
        };
        Self {
            id: record.id,
            deployment: record.deployment,
            start: record.start,
            end: record.end,
            captures_count: record.captures_count.unwrap_or_default(),
            occurrences_count: record.occurrences_count.unwrap_or_default(),
            taxa_count: record.taxa_count.unwrap_or_default(),
            date_label: format::date_label(record.start),
            time_range_label,
            duration_label: record.end.map(|end| {
                format::duration_label(end.duration_since(record.start))
            }),
        }
    }

    fn id(&self) -> SessionId {
        self.id
    }
}
