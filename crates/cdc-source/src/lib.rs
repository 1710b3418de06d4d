//! The abstract change-stream source (§4.4–§4.6) and its DynamoDB Streams
//! implementation.
//!
//! `StreamSource` is the only seam between the Shard Worker / Shard
//! Discoverer (`cdc-engine`) and the concrete stream API. Tests in
//! `cdc-engine` drive the state machines against [`fake::FakeSource`]
//! instead of a live AWS endpoint.

mod dynamo;
mod error;
pub mod fake;

pub use cdc_model::{Shard, StreamRecord};
pub use dynamo::DynamoStreamsSource;
pub use error::SourceError;

/// An opaque handle to a table's change stream, resolved once at Table
/// Consumer startup (§4.6) and reused for every subsequent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle(pub String);

/// Where a freshly obtained iterator should begin reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    TrimHorizon,
    Latest,
    /// Strictly after the given sequence number, used when resuming from a
    /// checkpoint (§4.4 Resuming state).
    AfterSequenceNumber(String),
}

/// The result of a single shard poll (§4.4 Polling state).
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub records: Vec<StreamRecord>,
    /// `None` means the shard is closed and has no further records: the
    /// worker should drain `records` and transition to `Terminated(clean)`.
    pub next_iterator: Option<String>,
}

/// The abstract change-record stream API a Shard Worker and Shard
/// Discoverer depend on. All operations are cancellation-observing
/// suspension points per §5.
#[async_trait::async_trait]
pub trait StreamSource: Send + Sync {
    /// One-time lookup from table name to stream handle (§4.6). Returns
    /// [`SourceError::StreamNotEnabled`] if the table has no active stream.
    async fn stream_handle(&self, table_name: &str) -> Result<StreamHandle, SourceError>;

    /// Enumerates the stream's current shards (§4.5).
    async fn list_shards(&self, stream: &StreamHandle) -> Result<Vec<Shard>, SourceError>;

    /// Obtains an iterator positioned per `position`. Returns
    /// [`SourceError::TrimHorizonExpired`] when `position` names a
    /// sequence number that has aged out of retained history.
    async fn get_iterator(
        &self,
        stream: &StreamHandle,
        shard_id: &str,
        position: IteratorPosition,
    ) -> Result<String, SourceError>;

    /// Fetches the next batch of records for `iterator`.
    async fn fetch(&self, stream: &StreamHandle, iterator: &str) -> Result<FetchResult, SourceError>;
}
