//! Error taxonomy for the indexing and retrieval pipeline.
//!
//! Two classes of failure flow through the crate: document-scoped errors
//! (an unreadable or unsupported file) that the synchronizer downgrades to
//! skip-and-continue, and backend errors (embedding service or store
//! unreachable) that abort the operation and surface to the caller.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("unsupported content: {0}")]
    UnsupportedContent(PathBuf),

    #[error("text extraction failed for {file}: {reason}")]
    Extraction { file: PathBuf, reason: String },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

impl Error {
    /// True for failures confined to a single document. The synchronizer
    /// skips the document and continues; everything else aborts the run.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::UnsupportedContent(_) | Error::Extraction { .. }
        )
    }
}

/// Outcome of a delete-by-document operation.
///
/// `Unknown` means the deletion itself succeeded but the exact count could
/// not be verified. Callers must not conflate it with `Exact(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovedCount {
    Exact(u64),
    Unknown,
}

impl std::fmt::Display for RemovedCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemovedCount::Exact(n) => write!(f, "{}", n),
            RemovedCount::Unknown => write!(f, "unknown"),
        }
    }
}
