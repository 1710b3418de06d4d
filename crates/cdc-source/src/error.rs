/// Errors surfaced by a [`crate::StreamSource`], mapped onto the error
/// taxonomy of §7.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The configured table has no stream enabled, or the table does not
    /// exist. Fatal at Table Consumer startup.
    #[error("table {0:?} has no enabled change stream")]
    StreamNotEnabled(String),

    /// An iterator could not be obtained because the requested sequence
    /// number has aged out of the retained history.
    #[error("trim horizon expired for shard {0:?}")]
    TrimHorizonExpired(String),

    /// Any other failure talking to the stream API: network errors,
    /// throttling, timeouts, malformed responses. Non-fatal; the caller
    /// surfaces it and relies on the next discovery or retry cycle.
    #[error("change stream request failed: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    pub fn transient(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        SourceError::Transient(Box::new(err))
    }
}
