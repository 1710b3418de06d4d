//! Shard Worker, Shard Discoverer, Table Consumer, and Supervisor (§4.4–
//! §4.7): the concurrent lifecycle that ties the abstract `cdc-source` and
//! `cdc-sink` contracts together into a running bridge.

mod config;
mod discoverer;
mod error;
mod supervisor;
mod table_consumer;
mod worker;

pub use config::BridgeConfig;
pub use discoverer::ShardDiscoverer;
pub use error::EngineError;
pub use supervisor::{Drain, Supervisor};
pub use table_consumer::TableConsumer;
pub use worker::{run_shard_worker, WorkerOutcome};
