use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use cdc_model::{Shard, StartPolicy};
use cdc_sink::{CheckpointStore, Publisher};
use cdc_source::{StreamHandle, StreamSource};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::worker::{run_shard_worker, WorkerOutcome};

struct TrackedWorker {
    handle: JoinHandle<WorkerOutcome>,
    cancel: CancellationToken,
}

/// Bookkeeping for one shard identifier the discoverer has seen.
enum TrackedShard {
    Running(TrackedWorker),
    /// The worker drained the shard and exited cleanly, but DynamoDB can
    /// keep reporting a closed shard in `list_shards` for hours. Staying
    /// in this state (instead of being removed) stops the shard from
    /// being respawned against its now-deleted checkpoint, which would
    /// otherwise re-publish the entire shard from `TRIM_HORIZON` on every
    /// refresh cycle (§4.5, §8 "replaying yields zero additional accepted
    /// messages").
    Closed,
}

/// Per-table periodic shard enumeration, spawning and retiring Shard
/// Workers, per §4.5.
///
/// Owns the set of live worker identifiers for its table — the only
/// mutable state shared within a table (§5).
pub struct ShardDiscoverer {
    source: Arc<dyn StreamSource>,
    publisher: Arc<dyn Publisher>,
    checkpoints: Arc<dyn CheckpointStore>,
    stream: StreamHandle,
    table_name: String,
    subject_prefix: String,
    start_policy: StartPolicy,
    poll_interval: Duration,
    refresh_interval: Duration,
    workers: HashMap<String, TrackedShard>,
}

impl ShardDiscoverer {
    pub fn new(
        source: Arc<dyn StreamSource>,
        publisher: Arc<dyn Publisher>,
        checkpoints: Arc<dyn CheckpointStore>,
        stream: StreamHandle,
        table_name: String,
        subject_prefix: String,
        start_policy: StartPolicy,
        poll_interval: Duration,
        refresh_interval: Duration,
    ) -> Self {
        ShardDiscoverer {
            source,
            publisher,
            checkpoints,
            stream,
            table_name,
            subject_prefix,
            start_policy,
            poll_interval,
            refresh_interval,
            workers: HashMap::new(),
        }
    }

    /// Runs discovery cycles until `cancel` fires, then waits for every
    /// tracked worker to unwind before returning.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            if let Err(err) = self.discover_once(&cancel).await {
                tracing::warn!(table = %self.table_name, error = %err, "shard enumeration failed, retrying next cycle");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.refresh_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        for (shard_id, state) in self.workers.drain() {
            if let TrackedShard::Running(worker) = state {
                worker.cancel.cancel();
                if let Err(err) = worker.handle.await {
                    tracing::warn!(table = %self.table_name, shard = %shard_id, error = %err, "shard worker task panicked");
                }
            }
        }
    }

    async fn discover_once(&mut self, cancel: &CancellationToken) -> Result<(), cdc_source::SourceError> {
        // Retires any worker that has already exited. A clean shard close
        // becomes `TrackedShard::Closed` instead of being dropped outright
        // (see that variant's doc comment); transient/fatal/cancelled
        // exits are dropped so the shard is free to respawn below.
        self.reap_finished().await;

        let shards = self.source.list_shards(&self.stream).await?;
        let present: HashSet<&str> = shards.iter().map(|s| s.shard_id.as_str()).collect();

        // Only now, once `list_shards` confirms the identifier is truly
        // gone, does a closed shard actually leave tracking (§4.5).
        let mut retired_parents = Vec::new();
        self.workers.retain(|shard_id, state| {
            let keep = !matches!(state, TrackedShard::Closed) || present.contains(shard_id.as_str());
            if !keep {
                tracing::info!(table = %self.table_name, shard = %shard_id, "closed shard no longer enumerated, retired");
                retired_parents.push(shard_id.clone());
            }
            keep
        });

        for shard in &shards {
            if self.workers.contains_key(&shard.shard_id) {
                continue;
            }
            if retired_parents.iter().any(|parent| shard.parent_is(parent)) {
                tracing::info!(
                    table = %self.table_name,
                    parent = ?shard.parent_shard_id,
                    shard = %shard.shard_id,
                    "child shard adopted after parent retirement",
                );
            }
            self.spawn_worker(shard, cancel).await;
        }

        Ok(())
    }

    /// Decides the start policy for a newly discovered shard and spawns
    /// its worker (§4.5): an existing checkpoint always overrides the
    /// configured policy, which `run_shard_worker`'s Init state already
    /// implements, so spawning here only needs the configured fallback.
    async fn spawn_worker(&mut self, shard: &Shard, parent_cancel: &CancellationToken) {
        let shard_id = shard.shard_id.clone();
        let worker_cancel = parent_cancel.child_token();
        let handle = tokio::spawn(run_shard_worker(
            self.source.clone(),
            self.publisher.clone(),
            self.checkpoints.clone(),
            self.stream.clone(),
            self.table_name.clone(),
            shard_id.clone(),
            self.subject_prefix.clone(),
            self.start_policy,
            self.poll_interval,
            worker_cancel.clone(),
        ));

        tracing::info!(
            table = %self.table_name,
            shard = %shard_id,
            already_closed = shard.is_closed,
            "shard worker started",
        );
        self.workers.insert(shard_id, TrackedShard::Running(TrackedWorker { handle, cancel: worker_cancel }));
    }

    /// Converts every worker whose task has already finished into either
    /// a `Closed` tombstone (clean exit) or a dropped entry (transient
    /// failure, fatal error, cancellation, or panic) so it can respawn.
    async fn reap_finished(&mut self) {
        let finished: Vec<String> = self
            .workers
            .iter()
            .filter_map(|(id, state)| match state {
                TrackedShard::Running(w) if w.handle.is_finished() => Some(id.clone()),
                _ => None,
            })
            .collect();

        for shard_id in finished {
            let Some(TrackedShard::Running(worker)) = self.workers.remove(&shard_id) else {
                continue;
            };
            match worker.handle.await {
                Ok(WorkerOutcome::ShardClosed) => {
                    tracing::info!(table = %self.table_name, shard = %shard_id, "shard closed and drained");
                    self.workers.insert(shard_id, TrackedShard::Closed);
                }
                Ok(WorkerOutcome::Fatal(err)) => {
                    tracing::error!(table = %self.table_name, shard = %shard_id, error = %err, "shard worker hit a fatal error, will retry");
                }
                Ok(WorkerOutcome::Transient(err)) => {
                    tracing::warn!(table = %self.table_name, shard = %shard_id, error = %err, "shard worker exited, will retry");
                }
                Ok(WorkerOutcome::Cancelled) => {}
                Err(err) => {
                    tracing::warn!(table = %self.table_name, shard = %shard_id, error = %err, "shard worker task panicked");
                }
            }
        }
    }
}
