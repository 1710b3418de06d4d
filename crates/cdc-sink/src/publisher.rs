use async_nats::jetstream::Context as JetStreamContext;
use async_nats::HeaderMap;
use cdc_model::PublishedEvent;

use crate::SinkError;

/// Publishes a single converted record to the broker with a deduplication
/// identity, per §4.2. Implementations must not retry internally — a
/// failure is reported to the caller unchanged (§4.4, §7).
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, event: &PublishedEvent) -> Result<(), SinkError>;
}

/// Derives the broker subject for `table_name` under `prefix`, replacing
/// each `.` or whitespace character with `_`. Idempotent:
/// `sanitize(sanitize(x)) == sanitize(x)`.
pub fn subject_for(prefix: &str, table_name: &str) -> String {
    let sanitized: String = table_name
        .chars()
        .map(|c| if c == '.' || c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{prefix}.{sanitized}")
}

/// Publishes onto a NATS JetStream stream, using the record's sequence
/// number as the `Nats-Msg-Id` deduplication header. The broker-side
/// dedup window (§6) collapses re-publishes of the same sequence number.
pub struct JetStreamPublisher {
    jetstream: JetStreamContext,
}

impl JetStreamPublisher {
    pub fn new(jetstream: JetStreamContext) -> Self {
        JetStreamPublisher { jetstream }
    }
}

#[async_trait::async_trait]
impl Publisher for JetStreamPublisher {
    async fn publish(&self, subject: &str, event: &PublishedEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| SinkError::publish(subject, e))?;

        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", event.sequence_number.as_str());

        let ack = self
            .jetstream
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await
            .map_err(|e| SinkError::publish(subject, e))?;

        ack.await.map_err(|e| SinkError::publish(subject, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_dots_and_whitespace() {
        assert_eq!(subject_for("p", "a.b.c"), "p.a_b_c");
        assert_eq!(subject_for("dynamodb_streams", "billing.events"), "dynamodb_streams.billing_events");
        assert_eq!(subject_for("p", "my table"), "p.my_table");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = subject_for("p", "a.b c");
        let twice = subject_for("p", &once["p.".len()..]);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_passes_other_characters_through() {
        assert_eq!(subject_for("p", "Orders-2024"), "p.Orders-2024");
    }
}
