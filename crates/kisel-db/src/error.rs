//! Error types for the data layer.
//!
//! All storage failures are propagated via [`DbError`], which records the
//! document path that was being read or written.

use std::path::PathBuf;

/// Errors that can occur while loading or saving a document.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Reading, writing, or renaming the document file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The document (or temp file) path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The document could not be encoded or decoded as JSON.
    #[error("serialization error in {}: {source}", path.display())]
    Serialization {
        /// The document path.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}
