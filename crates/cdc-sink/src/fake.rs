//! In-memory [`Publisher`] and [`CheckpointStore`] fakes for driving Shard
//! Worker tests without a live NATS broker.

use std::collections::HashMap;
use std::sync::Mutex;

use cdc_model::PublishedEvent;

use crate::{CheckpointStore, Publisher, SinkError};

/// Records every accepted publish, deduplicated by `Nats-Msg-Id` (the
/// record's sequence number) the way a real dedup-window stream would.
#[derive(Default)]
pub struct FakePublisher {
    published: Mutex<Vec<(String, PublishedEvent)>>,
    dedup_keys: Mutex<std::collections::HashSet<String>>,
    fail_next: Mutex<bool>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_publish(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    /// Returns the events actually accepted by the broker, i.e. with
    /// duplicate sequence numbers collapsed, in acceptance order.
    pub fn accepted(&self) -> Vec<PublishedEvent> {
        self.published.lock().unwrap().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.published.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, subject: &str, event: &PublishedEvent) -> Result<(), SinkError> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(SinkError::publish(subject, FakeError("publish failed".into())));
        }

        let mut keys = self.dedup_keys.lock().unwrap();
        if !keys.insert(event.sequence_number.clone()) {
            return Ok(());
        }
        drop(keys);

        self.published.lock().unwrap().push((subject.to_string(), event.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCheckpointStore {
    values: Mutex<HashMap<String, String>>,
    fail_next_put: Mutex<bool>,
}

impl FakeCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_put(&self) {
        *self.fail_next_put.lock().unwrap() = true;
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for FakeCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SinkError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, sequence_number: &str) -> Result<(), SinkError> {
        if std::mem::take(&mut *self.fail_next_put.lock().unwrap()) {
            return Err(SinkError::checkpoint(key, FakeError("put failed".into())));
        }
        self.values.lock().unwrap().insert(key.to_string(), sequence_number.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SinkError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
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

    fn event(seq: &str) -> PublishedEvent {
        PublishedEvent {
            event_id: seq.to_string(),
            event_name: EventName::Insert,
            table_name: "orders".to_string(),
            sequence_number: seq.to_string(),
            approximate_creation_time: chrono::Utc::now(),
            keys: serde_json::json!({}),
            new_image: None,
            old_image: None,
        }
    }

    #[tokio::test]
    async fn duplicate_sequence_number_collapses_to_one_accepted_event() {
        let publisher = FakePublisher::new();
        publisher.publish("orders", &event("001")).await.unwrap();
        publisher.publish("orders", &event("001")).await.unwrap();
        assert_eq!(publisher.accepted().len(), 1);
    }

    #[tokio::test]
    async fn checkpoint_round_trips_through_put_get_delete() {
        let store = FakeCheckpointStore::new();
        store.put("orders.shardA", "002").await.unwrap();
        assert_eq!(store.get("orders.shardA").await.unwrap(), Some("002".to_string()));
        store.delete("orders.shardA").await.unwrap();
        assert_eq!(store.get("orders.shardA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn subjects_records_the_routed_subject_per_accepted_event() {
        let publisher = FakePublisher::new();
        publisher.publish("dynamodb_streams.orders", &event("001")).await.unwrap();
        publisher.publish("dynamodb_streams.users", &event("002")).await.unwrap();
        assert_eq!(publisher.subjects(), vec!["dynamodb_streams.orders", "dynamodb_streams.users"]);
    }

    #[tokio::test]
    async fn fail_next_put_surfaces_once_then_recovers() {
        let store = FakeCheckpointStore::new();
        store.fail_next_put();
        assert!(store.put("orders.shardA", "001").await.is_err());
        assert_eq!(store.get("orders.shardA").await.unwrap(), None);

        store.put("orders.shardA", "001").await.unwrap();
        assert_eq!(store.get("orders.shardA").await.unwrap(), Some("001".to_string()));
    }
}
