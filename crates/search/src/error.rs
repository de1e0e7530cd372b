use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Indexer error: {0}")]
    Indexer(#[from] recall_indexer::IndexerError),

    #[error("{0}")]
    Other(String),
}
