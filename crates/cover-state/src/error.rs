//! Error types for cover-state

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Transport-level failure talking to a backend
    #[error("Backend connection failed: {0}")]
    Connection(String),

    /// Backend answered with a non-success status
    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Request body could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// No news row with this id
    #[error("News item not found: {id}")]
    NewsNotFound { id: i64 },

    /// URL could not be turned into an object key
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Object upload failed
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    /// Request could not be signed
    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StorageError::Deserialization(err.to_string())
        } else {
            StorageError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}
