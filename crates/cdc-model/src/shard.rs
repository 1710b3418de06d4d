/// Where a newly discovered shard's worker should begin reading, per §4.4.
///
/// Applies only to shards with no existing checkpoint; a shard resumed
/// from a checkpoint always starts at the checkpointed sequence number
/// regardless of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// Start at the oldest available record (`TRIM_HORIZON`).
    TrimHorizon,
    /// Start after the newest available record (`LATEST`).
    Latest,
}

impl StartPolicy {
    /// Maps the bridge's `start_from_latest` config flag (§6) to a policy.
    pub fn from_start_from_latest(start_from_latest: bool) -> Self {
        if start_from_latest {
            StartPolicy::Latest
        } else {
            StartPolicy::TrimHorizon
        }
    }
}

/// A DynamoDB Streams shard descriptor, as returned by shard enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub shard_id: String,
    pub parent_shard_id: Option<String>,
    /// `true` once the shard has stopped accepting new records (it has a
    /// defined `ending_sequence_number`), though it may still hold unread
    /// records a worker has not yet caught up to.
    pub is_closed: bool,
}

impl Shard {
    /// Whether this shard descends from `shard_id`. The Shard Discoverer
    /// uses this to recognize a freshly enumerated child of a shard it
    /// just retired, for the adoption log line in §4.5.
    pub fn parent_is(&self, shard_id: &str) -> bool {
        self.parent_shard_id.as_deref() == Some(shard_id)
    }
}
