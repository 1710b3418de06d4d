use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeMap;

/// The kind of mutation that produced a stream record, per §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "MODIFY")]
    Modify,
    #[serde(rename = "REMOVE")]
    Remove,
}

/// A single record read from a DynamoDB Streams shard.
///
/// `new_image` and `old_image` are present or absent according to the
/// table's stream view type and `event_name`: a `Remove` record never
/// carries a `new_image`, and an `Insert` record never carries an
/// `old_image`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub event_id: String,
    pub event_name: EventName,
    pub sequence_number: String,
    pub approximate_creation_time: DateTime<Utc>,
    pub keys: AttributeMap,
    pub new_image: Option<AttributeMap>,
    pub old_image: Option<AttributeMap>,
}
