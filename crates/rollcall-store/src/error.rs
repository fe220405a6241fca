//! Error types for the storage layer.

/// Errors returned by roster and attendance stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying SQLite call failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking worker running a database call died.
    #[error("storage task failed: {0}")]
    Task(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write would violate a uniqueness rule.
    #[error("conflict: {0}")]
    Conflict(String),
}
