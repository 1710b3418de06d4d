use serde::Serialize;
use serde_json::Value;

use crate::attribute::convert_map;
use crate::record::{EventName, StreamRecord};

/// The JSON envelope published to JetStream for a single change, per §6.
///
/// Field presence mirrors `StreamRecord`: `new_image`/`old_image` are
/// `null` when the source record didn't carry one, never fabricated.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedEvent {
    pub event_id: String,
    pub event_name: EventName,
    pub table_name: String,
    pub sequence_number: String,
    pub approximate_creation_time: chrono::DateTime<chrono::Utc>,
    pub keys: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Value>,
}

impl PublishedEvent {
    /// Builds the published envelope for `record` read from `table_name`,
    /// converting its attribute maps via the Record Converter (§4.1).
    pub fn from_record(table_name: &str, record: &StreamRecord) -> Self {
        PublishedEvent {
            event_id: record.event_id.clone(),
            event_name: record.event_name,
            table_name: table_name.to_string(),
            sequence_number: record.sequence_number.clone(),
            approximate_creation_time: record.approximate_creation_time,
            keys: convert_map(Some(&record.keys)).unwrap_or(Value::Object(Default::default())),
            new_image: convert_map(record.new_image.as_ref()),
            old_image: convert_map(record.old_image.as_ref()),
        }
    }
}
