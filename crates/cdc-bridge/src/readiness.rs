/// Readiness per §6's Health interface: ready once the broker connection
/// is connected and not draining. Serving this over HTTP is an external
/// collaborator's job (§1); this trait is the seam it polls.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self) -> bool;
}

/// Reads readiness directly off the live NATS client connection state.
pub struct ConnectionReadiness {
    client: async_nats::Client,
}

impl ConnectionReadiness {
    pub fn new(client: async_nats::Client) -> Self {
        ConnectionReadiness { client }
    }
}

impl ReadinessProbe for ConnectionReadiness {
    fn is_ready(&self) -> bool {
        matches!(self.client.connection_state(), async_nats::connection::State::Connected)
    }
}
