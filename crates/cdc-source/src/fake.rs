//! An in-memory [`crate::StreamSource`] for driving Shard Worker and Shard
//! Discoverer tests without a live DynamoDB Streams endpoint.

use std::collections::HashMap;
use std::sync::Mutex;

use cdc_model::{Shard, StreamRecord};

use crate::{FetchResult, IteratorPosition, SourceError, StreamSource, StreamHandle};

struct FakeShard {
    descriptor: Shard,
    records: Vec<StreamRecord>,
}

/// Fixed-content fake: shards and their records are seeded up front via
/// [`FakeSource::with_shard`], then [`FakeSource::close_shard`] and
/// [`FakeSource::remove_shard`] model the discovery-cycle transitions
/// (shard close, shard-split retirement) that tests drive against.
pub struct FakeSource {
    shards: Mutex<HashMap<String, FakeShard>>,
    /// Iterators are just `"{shard_id}@{offset}"`; `fetch` advances the
    /// offset and caps batches at this size.
    batch_size: usize,
    trim_horizon_expired: Mutex<std::collections::HashSet<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        FakeSource {
            shards: Mutex::new(HashMap::new()),
            batch_size: 10,
            trim_horizon_expired: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_shard(&self, shard_id: &str, parent_shard_id: Option<&str>, records: Vec<StreamRecord>) {
        self.shards.lock().unwrap().insert(
            shard_id.to_string(),
            FakeShard {
                descriptor: Shard {
                    shard_id: shard_id.to_string(),
                    parent_shard_id: parent_shard_id.map(|s| s.to_string()),
                    is_closed: false,
                },
                records,
            },
        );
    }

    pub fn close_shard(&self, shard_id: &str) {
        if let Some(shard) = self.shards.lock().unwrap().get_mut(shard_id) {
            shard.descriptor.is_closed = true;
        }
    }

    pub fn remove_shard(&self, shard_id: &str) {
        self.shards.lock().unwrap().remove(shard_id);
    }

    /// Makes the next iterator request for `shard_id` fail with
    /// `TrimHorizonExpired`, simulating an AfterSequenceNumber request
    /// against a checkpoint that has aged out of retained history.
    pub fn expire_trim_horizon(&self, shard_id: &str) {
        self.trim_horizon_expired.lock().unwrap().insert(shard_id.to_string());
    }
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StreamSource for FakeSource {
    async fn stream_handle(&self, table_name: &str) -> Result<StreamHandle, SourceError> {
        Ok(StreamHandle(format!("fake-stream/{table_name}")))
    }

    async fn list_shards(&self, _stream: &StreamHandle) -> Result<Vec<Shard>, SourceError> {
        Ok(self.shards.lock().unwrap().values().map(|s| s.descriptor.clone()).collect())
    }

    async fn get_iterator(
        &self,
        _stream: &StreamHandle,
        shard_id: &str,
        position: IteratorPosition,
    ) -> Result<String, SourceError> {
        if self.trim_horizon_expired.lock().unwrap().remove(shard_id) {
            return Err(SourceError::TrimHorizonExpired(shard_id.to_string()));
        }

        let shards = self.shards.lock().unwrap();
        let shard = shards
            .get(shard_id)
            .ok_or_else(|| SourceError::transient(FakeError(format!("unknown shard {shard_id}"))))?;

        let offset = match position {
            IteratorPosition::TrimHorizon => 0,
            IteratorPosition::Latest => shard.records.len(),
            IteratorPosition::AfterSequenceNumber(seq) => shard
                .records
                .iter()
                .position(|r| r.sequence_number == seq)
                .map(|i| i + 1)
                .unwrap_or(shard.records.len()),
        };

        Ok(format!("{shard_id}@{offset}"))
    }

    async fn fetch(&self, _stream: &StreamHandle, iterator: &str) -> Result<FetchResult, SourceError> {
        let (shard_id, offset) = iterator
            .rsplit_once('@')
            .ok_or_else(|| SourceError::transient(FakeError(format!("malformed iterator {iterator}"))))?;
        let offset: usize = offset
            .parse()
            .map_err(|_| SourceError::transient(FakeError(format!("malformed iterator {iterator}"))))?;

        let shards = self.shards.lock().unwrap();
        let shard = shards
            .get(shard_id)
            .ok_or_else(|| SourceError::transient(FakeError(format!("unknown shard {shard_id}"))))?;

        let end = (offset + self.batch_size).min(shard.records.len());
        let records = shard.records[offset.min(shard.records.len())..end].to_vec();

        let next_iterator = if end == shard.records.len() && shard.descriptor.is_closed {
            None
        } else {
            Some(format!("{shard_id}@{end}"))
        };

        Ok(FetchResult { records, next_iterator })
    }
}

#[derive(Debug)]
struct FakeError(String);

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FakeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_model::EventName;

    fn record(seq: &str) -> StreamRecord {
        StreamRecord {
            event_id: seq.to_string(),
            event_name: EventName::Insert,
            sequence_number: seq.to_string(),
            approximate_creation_time: chrono::Utc::now(),
            keys: Default::default(),
            new_image: None,
            old_image: None,
        }
    }

    #[tokio::test]
    async fn trim_horizon_starts_at_offset_zero() {
        let source = FakeSource::new();
        source.with_shard("shardA", None, vec![record("001"), record("002")]);
        let handle = source.stream_handle("t").await.unwrap();

        let iter = source.get_iterator(&handle, "shardA", IteratorPosition::TrimHorizon).await.unwrap();
        let batch = source.fetch(&handle, &iter).await.unwrap();
        assert_eq!(batch.records.len(), 2);
    }

    #[tokio::test]
    async fn after_sequence_number_resumes_past_checkpoint() {
        let source = FakeSource::new();
        source.with_shard("shardA", None, vec![record("001"), record("002"), record("003")]);
        let handle = source.stream_handle("t").await.unwrap();

        let iter = source
            .get_iterator(&handle, "shardA", IteratorPosition::AfterSequenceNumber("002".into()))
            .await
            .unwrap();
        let batch = source.fetch(&handle, &iter).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].sequence_number, "003");
    }

    #[tokio::test]
    async fn fetch_paginates_when_batch_size_is_exceeded() {
        let source = FakeSource::new().with_batch_size(1);
        source.with_shard("shardA", None, vec![record("001"), record("002")]);
        let handle = source.stream_handle("t").await.unwrap();

        let iter = source.get_iterator(&handle, "shardA", IteratorPosition::TrimHorizon).await.unwrap();
        let first = source.fetch(&handle, &iter).await.unwrap();
        assert_eq!(first.records.len(), 1);
        assert_eq!(first.records[0].sequence_number, "001");
        let next_iter = first.next_iterator.expect("open shard always has a next iterator");

        let second = source.fetch(&handle, &next_iter).await.unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].sequence_number, "002");
    }

    #[tokio::test]
    async fn closed_shard_yields_no_next_iterator_once_drained() {
        let source = FakeSource::new();
        source.with_shard("shardA", None, vec![record("001")]);
        source.close_shard("shardA");
        let handle = source.stream_handle("t").await.unwrap();

        let iter = source.get_iterator(&handle, "shardA", IteratorPosition::TrimHorizon).await.unwrap();
        let batch = source.fetch(&handle, &iter).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(batch.next_iterator.is_none());
    }

    #[tokio::test]
    async fn trim_horizon_expiry_is_reported_once() {
        let source = FakeSource::new();
        source.with_shard("shardA", None, vec![record("001")]);
        source.expire_trim_horizon("shardA");
        let handle = source.stream_handle("t").await.unwrap();

        let err = source
            .get_iterator(&handle, "shardA", IteratorPosition::AfterSequenceNumber("stale".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::TrimHorizonExpired(_)));

        // Second attempt succeeds: the expiry is a one-shot trigger.
        source.get_iterator(&handle, "shardA", IteratorPosition::TrimHorizon).await.unwrap();
    }
}

