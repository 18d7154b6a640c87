//! Typed errors for the indexing pipeline.
//!
//! Most recoverable conditions (unparsable versions, missing stats, missing
//! category) never reach this type; they are dropped or defaulted where they
//! occur. What remains is either fatal for a pass or an I/O failure at a
//! collaborator boundary.

use thiserror::Error;

use crate::version::VersionError;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The content store could not be opened. No document is written.
    #[error("content store unavailable: {0}")]
    ContentUnavailable(String),

    /// The stats collaborator failed while building the join maps.
    #[error("stats query failed: {0}")]
    Stats(String),

    /// The index sink rejected a document or a commit.
    #[error("index sink error: {0}")]
    Sink(String),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
