//! Error types for the engine runtime.

/// Errors that stop the engine or reject a journal line.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A journal line is not a known event.
    #[error("journal line {line}: {source}")]
    Journal {
        /// 1-based line number.
        line: usize,
        /// The parse error.
        source: serde_json::Error,
    },

    /// A document store could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] kisel_db::DbError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
