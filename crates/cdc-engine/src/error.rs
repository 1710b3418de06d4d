/// Errors that can end a Shard Worker or Table Consumer, mapped onto the
/// error taxonomy of §7.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] cdc_source::SourceError),

    #[error(transparent)]
    Sink(#[from] cdc_sink::SinkError),

    /// The configured table has no enabled stream. Fatal: the Supervisor
    /// aborts startup rather than running with a missing table.
    #[error("table {0:?} has no enabled change stream")]
    StreamNotEnabled(String),
}
