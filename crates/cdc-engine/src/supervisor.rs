use std::sync::Arc;
use std::time::Duration;

use cdc_model::StartPolicy;
use cdc_sink::{CheckpointStore, Publisher};
use cdc_source::StreamSource;
use tokio_util::sync::CancellationToken;

use crate::table_consumer::TableConsumer;
use crate::EngineError;

/// The broker connection's drain step, run after every Table Consumer has
/// unwound (§4.7). Kept abstract so this crate doesn't depend on
/// `async-nats` directly; the bridge binary supplies the real
/// implementation over its JetStream context.
#[async_trait::async_trait]
pub trait Drain: Send + Sync {
    async fn drain(&self);
}

/// Fans out one Table Consumer per configured table, awaits a shutdown
/// signal, and propagates cancellation, per §4.7.
pub struct Supervisor {
    source: Arc<dyn StreamSource>,
    publisher: Arc<dyn Publisher>,
    checkpoints: Arc<dyn CheckpointStore>,
    tables: Vec<String>,
    subject_prefix: String,
    start_policy: StartPolicy,
    poll_interval: Duration,
    shard_refresh_interval: Duration,
    graceful_shutdown_budget: Duration,
}

impl Supervisor {
    pub fn new(
        source: Arc<dyn StreamSource>,
        publisher: Arc<dyn Publisher>,
        checkpoints: Arc<dyn CheckpointStore>,
        tables: Vec<String>,
        subject_prefix: String,
        start_policy: StartPolicy,
        poll_interval: Duration,
        shard_refresh_interval: Duration,
        graceful_shutdown_budget: Duration,
    ) -> Self {
        Supervisor {
            source,
            publisher,
            checkpoints,
            tables,
            subject_prefix,
            start_policy,
            poll_interval,
            shard_refresh_interval,
            graceful_shutdown_budget,
        }
    }

    /// Starts every configured Table Consumer, then waits for `shutdown`
    /// to fire before cancelling the shared scope and draining `drain`.
    /// Returns an error immediately if any table fails its one-time
    /// stream lookup (§4.6, §7 Configuration errors).
    pub async fn run(self, shutdown: CancellationToken, drain: Arc<dyn Drain>) -> Result<(), EngineError> {
        let mut consumers = Vec::with_capacity(self.tables.len());
        for table_name in &self.tables {
            let consumer = TableConsumer::new(
                self.source.clone(),
                self.publisher.clone(),
                self.checkpoints.clone(),
                table_name.clone(),
                self.subject_prefix.clone(),
                self.start_policy,
                self.poll_interval,
                self.shard_refresh_interval,
            )
            .await?;
            consumers.push(consumer);
        }

        let scope = shutdown.child_token();
        let handles: Vec<_> = consumers
            .into_iter()
            .map(|consumer| tokio::spawn(consumer.run(scope.child_token())))
            .collect();

        shutdown.cancelled().await;
        scope.cancel();

        for handle in handles {
            let _ = handle.await;
        }

        tokio::select! {
            _ = drain.drain() => {
                tracing::info!("broker connection drained cleanly");
            }
            _ = tokio::time::sleep(self.graceful_shutdown_budget) => {
                tracing::error!(
                    budget = ?self.graceful_shutdown_budget,
                    "graceful shutdown budget exceeded, forcing exit"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_sink::fake::{FakeCheckpointStore, FakePublisher};
    use cdc_source::fake::FakeSource;

    struct InstantDrain;

    #[async_trait::async_trait]
    impl Drain for InstantDrain {
        async fn drain(&self) {}
    }

    struct HangingDrain;

    #[async_trait::async_trait]
    impl Drain for HangingDrain {
        async fn drain(&self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn fatal_startup_error_propagates_for_missing_stream() {
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        // FakeSource resolves a stream handle for any table name; to
        // exercise the fatal path we use a source that always refuses.
        struct RefusingSource;
        #[async_trait::async_trait]
        impl StreamSource for RefusingSource {
            async fn stream_handle(&self, table_name: &str) -> Result<cdc_source::StreamHandle, cdc_source::SourceError> {
                Err(cdc_source::SourceError::StreamNotEnabled(table_name.to_string()))
            }
            async fn list_shards(&self, _stream: &cdc_source::StreamHandle) -> Result<Vec<cdc_model::Shard>, cdc_source::SourceError> {
                Ok(vec![])
            }
            async fn get_iterator(
                &self,
                _stream: &cdc_source::StreamHandle,
                _shard_id: &str,
                _position: cdc_source::IteratorPosition,
            ) -> Result<String, cdc_source::SourceError> {
                unreachable!()
            }
            async fn fetch(&self, _stream: &cdc_source::StreamHandle, _iterator: &str) -> Result<cdc_source::FetchResult, cdc_source::SourceError> {
                unreachable!()
            }
        }

        let supervisor = Supervisor::new(
            Arc::new(RefusingSource),
            publisher,
            checkpoints,
            vec!["orders".to_string()],
            "dynamodb_streams".to_string(),
            StartPolicy::TrimHorizon,
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_secs(1),
        );

        let shutdown = CancellationToken::new();
        let result = supervisor.run(shutdown, Arc::new(InstantDrain)).await;
        assert!(matches!(result, Err(EngineError::StreamNotEnabled(table)) if table == "orders"));
    }

    #[tokio::test]
    async fn shutdown_signal_unwinds_consumers_and_drains() {
        let source = Arc::new(FakeSource::new());
        source.with_shard("shardA", None, vec![]);
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        let supervisor = Supervisor::new(
            source,
            publisher,
            checkpoints,
            vec!["orders".to_string()],
            "dynamodb_streams".to_string(),
            StartPolicy::TrimHorizon,
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_secs(5),
        );

        let shutdown = CancellationToken::new();
        let shutdown_trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown_trigger.cancel();
        });

        let result = supervisor.run(shutdown, Arc::new(InstantDrain)).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_exceeding_budget_forces_exit_without_hanging() {
        let source = Arc::new(FakeSource::new());
        let publisher = Arc::new(FakePublisher::new());
        let checkpoints = Arc::new(FakeCheckpointStore::new());

        let supervisor = Supervisor::new(
            source,
            publisher,
            checkpoints,
            vec![],
            "dynamodb_streams".to_string(),
            StartPolicy::TrimHorizon,
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_millis(50),
        );

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let result = supervisor.run(shutdown, Arc::new(HangingDrain)).await;
        assert!(result.is_ok());
    }
}
