//! Error types for the evstream core library.

use thiserror::Error;

/// Result type alias using the evstream core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for evstream operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Wire framing error (oversized line, bad hello, peer gone)
    #[error("Wire protocol error: {0}")]
    Wire(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
