use std::sync::Arc;
use std::time::Duration;

use cdc_model::{PublishedEvent, StartPolicy};
use cdc_sink::{checkpoint_key, subject_for, CheckpointStore, Publisher};
use cdc_source::{IteratorPosition, SourceError, StreamHandle, StreamSource};
use tokio_util::sync::CancellationToken;

use crate::EngineError;

/// How a Shard Worker's run ended, driving the Shard Discoverer's
/// bookkeeping (§4.5).
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The shard closed and was fully drained; its checkpoint was deleted.
    ShardClosed,
    /// A trim-horizon-expired error: the checkpoint is left intact for an
    /// operator to inspect; the discoverer will keep retrying the shard.
    Fatal(EngineError),
    /// A transient failure (network, broker); the discoverer respawns the
    /// worker on its next cycle.
    Transient(EngineError),
    /// Cancelled before reaching a terminal state. No checkpoint advance
    /// occurred for any in-flight record.
    Cancelled,
}

/// Runs a single Shard Worker to completion, implementing the state
/// machine of §4.4.
///
/// `source`, `publisher`, and `checkpoints` are shared across every
/// worker of every table; this function owns no state beyond its
/// arguments and the local iterator cursor.
pub async fn run_shard_worker(
    source: Arc<dyn StreamSource>,
    publisher: Arc<dyn Publisher>,
    checkpoints: Arc<dyn CheckpointStore>,
    stream: StreamHandle,
    table_name: String,
    shard_id: String,
    subject_prefix: String,
    start_policy: StartPolicy,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> WorkerOutcome {
    let key = checkpoint_key(&table_name, &shard_id);
    let subject = subject_for(&subject_prefix, &table_name);

    // Init: read the checkpoint to decide Resuming vs Fresh.
    if cancel.is_cancelled() {
        return WorkerOutcome::Cancelled;
    }
    let checkpoint = tokio::select! {
        result = checkpoints.get(&key) => match result {
            Ok(value) => value,
            Err(err) => return WorkerOutcome::Transient(EngineError::Sink(err)),
        },
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
    };

    let position = match checkpoint {
        Some(sequence_number) => IteratorPosition::AfterSequenceNumber(sequence_number),
        None => match start_policy {
            StartPolicy::Latest => IteratorPosition::Latest,
            StartPolicy::TrimHorizon => IteratorPosition::TrimHorizon,
        },
    };

    if cancel.is_cancelled() {
        return WorkerOutcome::Cancelled;
    }
    let mut iterator = tokio::select! {
        result = source.get_iterator(&stream, &shard_id, position) => match result {
            Ok(iterator) => iterator,
            Err(SourceError::TrimHorizonExpired(_)) => {
                tracing::error!(table = %table_name, shard = %shard_id, "trim horizon expired; checkpoint left intact");
                return WorkerOutcome::Fatal(EngineError::Source(SourceError::TrimHorizonExpired(shard_id)));
            }
            Err(err) => return WorkerOutcome::Transient(EngineError::Source(err)),
        },
        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
    };

    // Polling / Publishing / Idle loop.
    loop {
        if cancel.is_cancelled() {
            return WorkerOutcome::Cancelled;
        }
        let fetch = tokio::select! {
            result = source.fetch(&stream, &iterator) => result,
            _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
        };

        let batch = match fetch {
            Ok(batch) => batch,
            Err(err) => return WorkerOutcome::Transient(EngineError::Source(err)),
        };

        if batch.records.is_empty() {
            match batch.next_iterator {
                None => {
                    return finish_clean(checkpoints.as_ref(), &key).await;
                }
                Some(next) => {
                    iterator = next;
                    tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => {}
                        _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
                    }
                    continue;
                }
            }
        }

        for record in &batch.records {
            if cancel.is_cancelled() {
                return WorkerOutcome::Cancelled;
            }
            let event = PublishedEvent::from_record(&table_name, record);

            let publish = tokio::select! {
                result = publisher.publish(&subject, &event) => result,
                _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
            };

            if let Err(err) = publish {
                return WorkerOutcome::Transient(EngineError::Sink(err));
            }

            let checkpoint_write = tokio::select! {
                result = checkpoints.put(&key, &event.sequence_number) => result,
                _ = cancel.cancelled() => return WorkerOutcome::Cancelled,
            };

            if let Err(err) = checkpoint_write {
                return WorkerOutcome::Transient(EngineError::Sink(err));
            }
        }

        match batch.next_iterator {
            Some(next) => iterator = next,
            None => return finish_clean(checkpoints.as_ref(), &key).await,
        }
    }
}

async fn finish_clean(checkpoints: &dyn CheckpointStore, key: &str) -> WorkerOutcome {
    if let Err(err) = checkpoints.delete(key).await {
        return WorkerOutcome::Transient(EngineError::Sink(err));
    }
    WorkerOutcome::ShardClosed
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_model::EventName;
    use cdc_sink::fake::{FakeCheckpointStore, FakePublisher};
    use cdc_source::fake::FakeSource;

    fn record(seq: &str, event_name: EventName) -> cdc_model::StreamRecord {
        cdc_model::StreamRecord {
            event_id: seq.to_string(),
            event_name,
            sequence_number: seq.to_string(),
            approximate_creation_time: chrono::Utc::now(),
            keys: Default::default(),
            new_image: None,
            old_image: None,
        }
    }

    async fn run(
        source: Arc<FakeSource>,
        publisher: Arc<FakePublisher>,
        checkpoints: Arc<FakeCheckpointStore>,
        shard_id: &str,
        start_policy: StartPolicy,
    ) -> WorkerOutcome {
        let stream = source.stream_handle("users").await.unwrap();
        run_shard_worker(
            source,
            publisher,
            checkpoints,
            stream,
            "users".to_string(),
            shard_id.to_string(),
            "dynamodb_streams".to_string(),
            start_policy,
            Duration::from_millis(1),
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn insert_modify_remove_publish_in_order_and_checkpoint_advances() {
        let source = Arc::new(FakeSource::new());
        source.with_shard(
            "shardA",
            None,
            vec![
                record("001", EventName::Insert),
                record("002", EventName::Modify),
                record("003", EventName::Remove),
            ],
        );
        source.close_shard("shardA");
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        let outcome = run(source, publisher.clone(), checkpoints.clone(), "shardA", StartPolicy::TrimHorizon).await;

        assert!(matches!(outcome, WorkerOutcome::ShardClosed));
        let accepted = publisher.accepted();
        assert_eq!(accepted.len(), 3);
        assert_eq!(accepted[0].sequence_number, "001");
        assert_eq!(accepted[1].sequence_number, "002");
        assert_eq!(accepted[2].sequence_number, "003");
        // Checkpoint was deleted on clean shard end.
        assert_eq!(checkpoints.snapshot().get("users.shardA"), None);
    }

    #[tokio::test]
    async fn restart_mid_shard_resumes_after_checkpoint() {
        let source = Arc::new(FakeSource::new());
        source.with_shard(
            "shardA",
            None,
            vec![record("001", EventName::Insert), record("002", EventName::Insert), record("003", EventName::Insert)],
        );
        source.close_shard("shardA");
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());
        checkpoints.put("users.shardA", "002").await.unwrap();

        run(source, publisher.clone(), checkpoints, "shardA", StartPolicy::TrimHorizon).await;

        let accepted = publisher.accepted();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].sequence_number, "003");
    }

    #[tokio::test]
    async fn dedup_window_collapses_republish_of_same_sequence_number() {
        let source = Arc::new(FakeSource::new());
        source.with_shard("shardA", None, vec![record("002", EventName::Insert)]);
        source.close_shard("shardA");
        let publisher = Arc::new(FakePublisher::new());
        publisher.publish("dynamodb_streams.users", &PublishedEvent::from_record("users", &record("002", EventName::Insert))).await.unwrap();
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        run(source, publisher.clone(), checkpoints, "shardA", StartPolicy::TrimHorizon).await;

        assert_eq!(publisher.accepted().len(), 1);
    }

    #[tokio::test]
    async fn trim_horizon_expiry_leaves_checkpoint_intact_and_is_fatal() {
        let source = Arc::new(FakeSource::new());
        source.with_shard("shardA", None, vec![record("001", EventName::Insert)]);
        source.expire_trim_horizon("shardA");
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());
        checkpoints.put("users.shardA", "stale").await.unwrap();

        let outcome = run(source, publisher, checkpoints.clone(), "shardA", StartPolicy::TrimHorizon).await;

        assert!(matches!(outcome, WorkerOutcome::Fatal(_)));
        assert_eq!(checkpoints.snapshot().get("users.shardA"), Some(&"stale".to_string()));
    }

    #[tokio::test]
    async fn publish_failure_does_not_advance_checkpoint() {
        let source = Arc::new(FakeSource::new());
        source.with_shard("shardA", None, vec![record("001", EventName::Insert)]);
        let publisher = Arc::new(FakePublisher::new());
        publisher.fail_next_publish();
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        let outcome = run(source, publisher, checkpoints.clone(), "shardA", StartPolicy::TrimHorizon).await;

        assert!(matches!(outcome, WorkerOutcome::Transient(_)));
        assert_eq!(checkpoints.snapshot().get("users.shardA"), None);
    }

    #[tokio::test]
    async fn cancellation_stops_before_advancing_checkpoint() {
        let source = Arc::new(FakeSource::new());
        source.with_shard("shardA", None, vec![record("001", EventName::Insert)]);
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = source.stream_handle("users").await.unwrap();
        let outcome = run_shard_worker(
            source,
            publisher,
            checkpoints.clone(),
            stream,
            "users".to_string(),
            "shardA".to_string(),
            "dynamodb_streams".to_string(),
            StartPolicy::TrimHorizon,
            Duration::from_secs(60),
            cancel,
        )
        .await;

        assert!(matches!(outcome, WorkerOutcome::Cancelled));
        assert_eq!(checkpoints.snapshot().get("users.shardA"), None);
    }
}
