use thiserror::Error;

/// Failures surfaced by the object store and the transfer layer.
///
/// Callers above the store generally only distinguish `NotFound` (an unset
/// ref or missing object) from everything else.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object or reference not found")]
    NotFound,

    #[error("object or reference already exists")]
    AlreadyExists,

    #[error("reference update conflict")]
    Conflict,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("corrupt object: {0}")]
    Corrupt(String),

    #[error("remote repository is empty")]
    EmptyRemoteRepository,

    #[error("operation cancelled")]
    Cancelled,

    #[error("no signing key configured")]
    NoSigningKey,

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file error: {0}")]
    State(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}
