#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("session '{0}' not found")]
    SessionNotFound(String),

    #[error("session '{0}' is locked by another process")]
    SessionLocked(String),

    #[error("invalid session id '{0}'")]
    InvalidSessionId(String),

    #[error("plan artifact missing at {0}")]
    PlanMissing(String),

    #[error("no file targets could be extracted from the plan (NO_TARGETS)")]
    NoTargets,

    #[error("max_iterations ({0}) reached without audit approval")]
    MaxIterationsReached(u32),

    #[error("config error: {0}")]
    Config(String),

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session state corrupt: {0}")]
    Corrupt(String),

    #[error("invalid phase transition: {from:?} does not accept event {event}")]
    InvalidTransition { from: crate::types::Phase, event: String },
}
