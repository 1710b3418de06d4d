/// Startup failures, per the Configuration and Broker-closed rows of §7's
/// error taxonomy. All are fatal: the process exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("no tables configured")]
    NoTables,

    #[error("failed to read configuration file {path:?}: {source}")]
    ConfigRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("credential acquisition failed: {0}")]
    Credentials(String),

    #[error("failed to connect to broker {url}: {source}")]
    BrokerConnect {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("broker resources do not satisfy the bridge's requirements: {0}")]
    BrokerConfig(String),

    #[error(transparent)]
    Engine(#[from] cdc_engine::EngineError),
}
