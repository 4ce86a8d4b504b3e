//! Error types at the core boundary

use thiserror::Error;

/// Failure of the durable question/answer store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure surfaced by the response engine to its caller
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// The store could not be read while answering a query
    #[error("lookup failure: {0}")]
    Lookup(#[source] StoreError),
}
