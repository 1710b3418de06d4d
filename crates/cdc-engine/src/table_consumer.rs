use std::sync::Arc;
use std::time::Duration;

use cdc_model::StartPolicy;
use cdc_sink::{CheckpointStore, Publisher};
use cdc_source::StreamSource;
use tokio_util::sync::CancellationToken;

use crate::discoverer::ShardDiscoverer;
use crate::EngineError;

/// Owns a single table's stream handle and hosts its Shard Discoverer,
/// per §4.6.
pub struct TableConsumer {
    table_name: String,
    discoverer: ShardDiscoverer,
}

impl TableConsumer {
    /// Resolves `table_name`'s stream handle. Returns
    /// [`EngineError::StreamNotEnabled`] if the table has no active
    /// stream — fatal, per §7 Configuration errors.
    pub async fn new(
        source: Arc<dyn StreamSource>,
        publisher: Arc<dyn Publisher>,
        checkpoints: Arc<dyn CheckpointStore>,
        table_name: String,
        subject_prefix: String,
        start_policy: StartPolicy,
        poll_interval: Duration,
        shard_refresh_interval: Duration,
    ) -> Result<Self, EngineError> {
        let stream = source
            .stream_handle(&table_name)
            .await
            .map_err(|_| EngineError::StreamNotEnabled(table_name.clone()))?;

        let discoverer = ShardDiscoverer::new(
            source,
            publisher,
            checkpoints,
            stream,
            table_name.clone(),
            subject_prefix,
            start_policy,
            poll_interval,
            shard_refresh_interval,
        );

        Ok(TableConsumer { table_name, discoverer })
    }

    /// Runs the table's Shard Discoverer until `cancel` fires, then
    /// unwinds every worker under it before returning. A single cancel on
    /// the shared scope tears down this entire per-table subtree.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(table = %self.table_name, "table consumer started");
        self.discoverer.run(cancel).await;
        tracing::info!(table = %self.table_name, "table consumer stopped");
    }
}
