use jiff::Timestamp;
use payloads::{CaptureId, DeploymentId, SessionId, collections, responses};

use super::{Entity, format};

#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub id: CaptureId,
    pub deployment: DeploymentId,
    pub session: Option<SessionId>,
    pub timestamp: Timestamp,
    pub path: String,
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub detections_count: u64,
    pub date_label: String,
    pub time_label: String,
}

impl Entity for Capture {
    type Id = CaptureId;
    type Record = responses::Capture;

    const COLLECTION: &'static str = collections::CAPTURES;

    fn from_record(record: responses::Capture) -> Self {
        Self {
            id: record.id,
            deployment: record.deployment.id,
            session: record.event.map(|event| event.id),
            date_label: format::date_label(record.timestamp),
            time_label: format::time_label(record.timestamp),
            timestamp: record.timestamp,
            path: record.path,
            url: record.url,
            width: record.width,
            height: record.height,
            detections_count: record.detections_count.unwrap_or_default(),
        }
    }

    fn id(&self) -> CaptureId {
        self.id
    }
}
