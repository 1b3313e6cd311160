//! Error types for the storage core.
//!
//! Only failures that abort an ingest or a query are represented here.
//! Text extraction and summarization failures degrade the resulting record
//! instead and never surface as a [`HomeDocsError`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HomeDocsError {
    /// The uploaded bytes could not be persisted.
    #[error("failed to write {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No free address was found for a new document.
    #[error("no free address after {attempts} attempts under {root}")]
    AddressExhausted { root: PathBuf, attempts: usize },

    /// Token too short to address the shard tree.
    #[error("invalid token: {0:?}")]
    InvalidToken(String),

    /// The thumbnail could not be derived; the original stays on disk.
    #[error("thumbnail generation failed for {original}: {reason}")]
    Thumbnail { original: PathBuf, reason: String },

    /// `map.json` exists but does not hold a valid index.
    #[error("index {path} is corrupt: {reason}")]
    IndexCorruption { path: PathBuf, reason: String },

    /// A record with the same id is already indexed.
    #[error("document id already indexed: {0}")]
    DuplicateId(String),

    /// Another writer held the index lock for too long.
    #[error("timed out waiting for index lock {0}")]
    IndexLocked(PathBuf),

    /// The blocking index update did not run to completion.
    #[error("index update task failed: {0}")]
    IndexTask(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HomeDocsError>;

impl HomeDocsError {
    pub fn storage_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HomeDocsError::StorageWrite {
            path: path.into(),
            source,
        }
    }

    pub fn index_corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        HomeDocsError::IndexCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            HomeDocsError::StorageWrite { .. }
            | HomeDocsError::AddressExhausted { .. }
            | HomeDocsError::IndexTask(_)
            | HomeDocsError::Io(_) => "storage",
            HomeDocsError::InvalidToken(_) | HomeDocsError::Thumbnail { .. } => "bad_request",
            HomeDocsError::IndexCorruption { .. }
            | HomeDocsError::DuplicateId(_)
            | HomeDocsError::Json(_) => "index_corrupt",
            HomeDocsError::IndexLocked(_) => "index_locked",
        }
    }
}
