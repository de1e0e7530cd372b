use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Invalid session path: {0}")]
    InvalidPath(String),

    #[error("Timed out acquiring index lock after {0:?}")]
    LockTimeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}
