//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryNewsRepository` and `MemoryObjectStore` that satisfy the
//! trait contracts without any external dependencies. Both keep a log of the
//! writes they received so tests can assert on exactly what was persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{CheckResultUpdate, NewsId, NewsItem};
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryNewsRepository
// ---------------------------------------------------------------------------

/// In-memory news table.
#[derive(Debug, Default)]
pub struct MemoryNewsRepository {
    rows: Mutex<Vec<NewsItem>>,
    writes: Mutex<Vec<(NewsId, CheckResultUpdate)>>,
}

impl MemoryNewsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with rows.
    pub fn with_items(items: impl IntoIterator<Item = NewsItem>) -> Self {
        Self {
            rows: Mutex::new(items.into_iter().collect()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Current state of one row.
    pub fn item(&self, id: NewsId) -> Option<NewsItem> {
        let rows = self.rows.lock().unwrap();
        rows.iter().find(|r| r.id == id).cloned()
    }

    /// Every `mark_check_result` call received, in order.
    pub fn writes(&self) -> Vec<(NewsId, CheckResultUpdate)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsRepository for MemoryNewsRepository {
    async fn list_unchecked(&self) -> StorageResult<Vec<NewsItem>> {
        let rows = self.rows.lock().unwrap();
        let mut pending: Vec<NewsItem> = rows
            .iter()
            .filter(|r| r.image_checked.is_none())
            .cloned()
            .collect();
        // Newest first; rows without a timestamp sort last.
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn mark_check_result(
        &self,
        id: NewsId,
        update: CheckResultUpdate,
    ) -> StorageResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StorageError::NewsNotFound { id })?;

        row.image_checked = Some(update.image_checked);
        if let Some(image) = &update.image {
            row.image = Some(image.clone());
        }
        self.writes.lock().unwrap().push((id, update));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory bucket backed by a `HashMap<key, (content_type, bytes)>`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    puts: Mutex<u32>,
    fail_puts: bool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every `put` fails with `StorageError::Upload`.
    pub fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        objects.get(key).map(|(_, bytes)| bytes.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        let objects = self.objects.lock().unwrap();
        objects.get(key).map(|(ct, _)| ct.clone())
    }

    /// Number of `put` calls that reached the store, including failed ones.
    pub fn put_count(&self) -> u32 {
        *self.puts.lock().unwrap()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        *self.puts.lock().unwrap() += 1;
        if self.fail_puts {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        let mut objects = self.objects.lock().unwrap();
        objects.insert(key.to_string(), (content_type.to_string(), bytes.to_vec()));
        Ok(())
    }
}
