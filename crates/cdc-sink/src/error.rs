/// Errors surfaced by a [`crate::Publisher`] or [`crate::CheckpointStore`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("publish to {subject:?} failed: {source}")]
    Publish {
        subject: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("checkpoint store operation on key {key:?} failed: {source}")]
    Checkpoint {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SinkError {
    pub fn publish(subject: impl Into<String>, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        SinkError::Publish { subject: subject.into(), source: Box::new(err) }
    }

    pub fn checkpoint(key: impl Into<String>, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        SinkError::Checkpoint { key: key.into(), source: Box::new(err) }
    }
}
