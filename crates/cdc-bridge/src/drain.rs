/// Drains the live NATS connection so in-flight publishes complete
/// before exit (§4.7).
pub struct JetStreamDrain {
    client: async_nats::Client,
}

impl JetStreamDrain {
    pub fn new(client: async_nats::Client) -> Self {
        JetStreamDrain { client }
    }
}

#[async_trait::async_trait]
impl cdc_engine::Drain for JetStreamDrain {
    async fn drain(&self) {
        if let Err(err) = self.client.drain().await {
            tracing::error!(error = %err, "failed to drain broker connection");
        }
    }
}
