use crate::SinkError;

/// Durable per-shard sequence-number cursor, per §4.3.
///
/// `key = "{table_name}.{shard_id}"`. Implementations retain only the
/// latest value per key (history depth 1); no compare-and-swap is
/// required since at most one worker writes a given key (§3 invariants).
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the last successfully published sequence number for `key`,
    /// or `None` if the shard has never been checkpointed.
    async fn get(&self, key: &str) -> Result<Option<String>, SinkError>;

    /// Overwrites the checkpoint for `key`. Must be called only after the
    /// corresponding publish has been acknowledged by the broker.
    async fn put(&self, key: &str, sequence_number: &str) -> Result<(), SinkError>;

    /// Removes the checkpoint for `key`, called when a shard closes and
    /// drains cleanly (§4.4 Terminated(clean)).
    async fn delete(&self, key: &str) -> Result<(), SinkError>;
}

/// Formats the checkpoint key for a `(table_name, shard_id)` pair.
pub fn checkpoint_key(table_name: &str, shard_id: &str) -> String {
    format!("{table_name}.{shard_id}")
}

/// A [`CheckpointStore`] backed by a NATS JetStream key-value bucket
/// (history depth 1, per §6).
pub struct KvCheckpointStore {
    store: async_nats::jetstream::kv::Store,
}

impl KvCheckpointStore {
    pub fn new(store: async_nats::jetstream::kv::Store) -> Self {
        KvCheckpointStore { store }
    }
}

#[async_trait::async_trait]
impl CheckpointStore for KvCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SinkError> {
        let entry = self
            .store
            .get(key)
            .await
            .map_err(|e| SinkError::checkpoint(key, e))?;

        Ok(entry.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn put(&self, key: &str, sequence_number: &str) -> Result<(), SinkError> {
        self.store
            .put(key, sequence_number.as_bytes().to_vec().into())
            .await
            .map_err(|e| SinkError::checkpoint(key, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SinkError> {
        self.store.delete(key).await.map_err(|e| SinkError::checkpoint(key, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_joins_table_and_shard() {
        assert_eq!(checkpoint_key("billing.events", "shardA"), "billing.events.shardA");
    }
}
