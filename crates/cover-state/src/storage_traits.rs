//! Storage trait definitions for cover repair
//!
//! These traits define the two persistence seams of the pipeline:
//! - `NewsRepository`: read pending rows, write a row's check result
//! - `ObjectStore`: put a named image blob
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{CheckResultUpdate, NewsId, NewsItem};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Content type of every cover written by the pipeline
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// News row gateway.
///
/// Guarantees:
/// - `list_unchecked` returns only rows whose check result is unset,
///   newest first.
/// - `mark_check_result` is keyed by id and last-write-wins: writing the same
///   update twice leaves the row exactly as writing it once.
#[async_trait]
pub trait NewsRepository: Send + Sync {
    /// Fetch every row whose `image_checked` is null, newest first.
    async fn list_unchecked(&self) -> StorageResult<Vec<NewsItem>>;

    /// Write the check result (and optionally a new image key) for one row.
    async fn mark_check_result(&self, id: NewsId, update: CheckResultUpdate)
        -> StorageResult<()>;
}

/// Named blob store.
///
/// Guarantees:
/// - `put` overwrites any existing object under the same key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` with the given content type.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()>;
}
