// Error taxonomy for monitors, the registry and the Docker collaborator

/// Failure reported by the container runtime collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("docker api: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("runtime session already closed")]
    SessionClosed,
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("configuration error: container ID must be set")]
    Configuration,
    #[error("cannot acquire runtime session for container {id}: {source}")]
    Connection {
        id: String,
        #[source]
        source: SourceError,
    },
    #[error("cannot inspect container {id}: {source}")]
    Inspect {
        id: String,
        #[source]
        source: SourceError,
    },
    #[error("cannot decode stats for container {id}: {source}")]
    StreamDecode {
        id: String,
        #[source]
        source: SourceError,
    },
    #[error("container {0} is already monitored")]
    AlreadyMonitored(String),
    #[error("monitor for container {0} was already started")]
    AlreadyStarted(String),
    #[error("option `{0}` is read-only")]
    ReadOnlyOption(&'static str),
}
