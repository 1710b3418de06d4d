use std::time::Duration;

use serde::Deserialize;

/// The bridge's configuration surface (§6). Parsing environment variables
/// or a config file into this struct is an external collaborator's job;
/// this crate only consumes the resulting values.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Non-empty ordered set of table names to consume.
    pub tables: Vec<String>,
    pub region: String,
    /// Cross-account role identifier; when present, credentials for the
    /// stream API are derived by assuming it.
    pub assume_role: Option<String>,
    pub broker_url: String,
    pub stream_name: String,
    pub subject_prefix: String,
    pub checkpoint_bucket: String,
    /// Selects LATEST vs TRIM_HORIZON for new shards with no checkpoint.
    #[serde(default)]
    pub start_from_latest: bool,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub shard_refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub graceful_shutdown_budget: Duration,
    #[serde(default)]
    pub debug: bool,
}

impl BridgeConfig {
    pub fn start_policy(&self) -> cdc_model::StartPolicy {
        cdc_model::StartPolicy::from_start_from_latest(self.start_from_latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_json_with_human_durations() {
        let json = r#"{
            "tables": ["orders", "billing.events"],
            "region": "us-east-1",
            "assume_role": null,
            "broker_url": "nats://localhost:4222",
            "stream_name": "CDC",
            "subject_prefix": "dynamodb_streams",
            "checkpoint_bucket": "cdc_checkpoints",
            "start_from_latest": false,
            "poll_interval": "1s",
            "shard_refresh_interval": "30s",
            "graceful_shutdown_budget": "10s",
            "debug": false
        }"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tables, vec!["orders", "billing.events"]);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.start_policy(), cdc_model::StartPolicy::TrimHorizon);
    }
}
