//! The Publisher (§4.2) and Checkpoint Store (§4.3) contracts and their
//! NATS JetStream implementations.

mod checkpoint;
mod error;
pub mod fake;
mod publisher;

pub use checkpoint::{checkpoint_key, CheckpointStore, KvCheckpointStore};
pub use error::SinkError;
pub use publisher::{subject_for, JetStreamPublisher, Publisher};

/// Minimum broker-side deduplication window the bridge requires of its
/// JetStream stream (§6). Resource creation is out of scope for this
/// crate, but the constant documents the contract callers must satisfy.
pub const MIN_DEDUP_WINDOW: std::time::Duration = std::time::Duration::from_secs(120);

/// Required history depth for the checkpoint key-value bucket (§6): only
/// the latest value per key is retained.
pub const HISTORY_DEPTH: i64 = 1;
