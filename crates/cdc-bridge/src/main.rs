mod credentials;
mod drain;
mod error;
mod readiness;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli_common::{init_logging, LogArgs, OrBail};

use credentials::{CredentialsProvider, DefaultCredentialsProvider};
use drain::JetStreamDrain;
use error::BootstrapError;
use readiness::{ConnectionReadiness, ReadinessProbe};

/// Tails DynamoDB Streams for a set of tables and republishes each change
/// record onto a NATS JetStream subject hierarchy.
///
/// Configuration parsing beyond loading this file, broker resource
/// provisioning, and health-check serving are left to the operator's
/// surrounding deployment; this binary wires the stream-tailing engine
/// and runs it to completion.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// Path to a JSON file holding the bridge configuration (§6).
    #[arg(long, env = "BRIDGE_CONFIG")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration errors (§7) are detectable before any async work
    // starts, so they bail the process immediately, matching the
    // teacher's own `or_bail` call sites around config deserialization.
    let config_bytes = std::fs::read(&cli.config)
        .map_err(|source| BootstrapError::ConfigRead { path: cli.config.clone(), source })
        .or_bail("failed to read configuration file");
    let config: cdc_engine::BridgeConfig =
        serde_json::from_slice(&config_bytes).map_err(BootstrapError::from).or_bail("failed to parse configuration");

    if config.tables.is_empty() {
        Err::<(), _>(BootstrapError::NoTables).or_bail("invalid configuration");
    }

    init_logging(&LogArgs::from_debug_flag(config.debug));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: cdc_engine::BridgeConfig) -> anyhow::Result<()> {
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()))
        .load()
        .await;

    let credentials_provider = DefaultCredentialsProvider::from_sdk_config(&aws_config)
        .ok_or_else(|| BootstrapError::Credentials("no credentials provider resolved for this environment".into()))?;
    // Fail fast at startup rather than on the first shard's iterator fetch.
    credentials_provider.credentials().await?;

    let table_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let streams_client = aws_sdk_dynamodbstreams::Client::new(&aws_config);
    let source = Arc::new(cdc_source::DynamoStreamsSource::new(table_client, streams_client));

    let nats_client = async_nats::connect(&config.broker_url)
        .await
        .map_err(|err| BootstrapError::BrokerConnect { url: config.broker_url.clone(), source: Box::new(err) })?;
    let jetstream = async_nats::jetstream::new(nats_client.clone());

    let mut stream = jetstream
        .get_stream(&config.stream_name)
        .await
        .map_err(|err| BootstrapError::BrokerConnect { url: config.broker_url.clone(), source: Box::new(err) })?;
    let checkpoint_bucket = jetstream
        .get_key_value(&config.checkpoint_bucket)
        .await
        .map_err(|err| BootstrapError::BrokerConnect { url: config.broker_url.clone(), source: Box::new(err) })?;

    let stream_info = stream
        .info()
        .await
        .map_err(|err| BootstrapError::BrokerConnect { url: config.broker_url.clone(), source: Box::new(err) })?;
    let bucket_history = checkpoint_bucket
        .status()
        .await
        .map_err(|err| BootstrapError::BrokerConnect { url: config.broker_url.clone(), source: Box::new(err) })?
        .history();
    verify_broker_resources(stream_info.config.duplicate_window, bucket_history)?;

    let readiness = ConnectionReadiness::new(nats_client.clone());
    tracing::info!(ready = readiness.is_ready(), "broker connection established");

    let publisher = Arc::new(cdc_sink::JetStreamPublisher::new(jetstream));
    let checkpoints = Arc::new(cdc_sink::KvCheckpointStore::new(checkpoint_bucket));

    let supervisor = cdc_engine::Supervisor::new(
        source,
        publisher,
        checkpoints,
        config.tables.clone(),
        config.subject_prefix.clone(),
        config.start_policy(),
        config.poll_interval,
        config.shard_refresh_interval,
        config.graceful_shutdown_budget,
    );

    let shutdown = tokio_util::sync::CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal");
            ctrl_c_token.cancel();
        }
    });

    let drain = Arc::new(JetStreamDrain::new(nats_client));
    supervisor.run(shutdown, drain).await?;

    Ok(())
}

/// Asserts the broker resources handed to the bridge satisfy §6's
/// minimums. Creating the stream and bucket is an external collaborator's
/// job (§1); this only checks what it was given.
fn verify_broker_resources(duplicate_window: std::time::Duration, bucket_history: i64) -> Result<(), BootstrapError> {
    if duplicate_window < cdc_sink::MIN_DEDUP_WINDOW {
        return Err(BootstrapError::BrokerConfig(format!(
            "stream deduplication window {duplicate_window:?} is below the required minimum {:?}",
            cdc_sink::MIN_DEDUP_WINDOW
        )));
    }
    if bucket_history < cdc_sink::HISTORY_DEPTH {
        return Err(BootstrapError::BrokerConfig(format!(
            "checkpoint bucket history depth {bucket_history} is below the required minimum {}",
            cdc_sink::HISTORY_DEPTH
        )));
    }
    Ok(())
}
