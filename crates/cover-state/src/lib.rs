//! Cover-State: persistence layer for the cover repair pipeline
//!
//! This crate owns every write the pipeline makes to the outside world and
//! the one query it reads from.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: exactly-once terminal writes, deterministic object keys.
//!
//! ## Key Components
//!
//! - `NewsRepository`: pending news rows and their check result
//! - `ObjectStore`: named image blobs in a bucket
//! - `SupabaseNewsRepository`: PostgREST-backed repository
//! - `R2ObjectStore`: S3-compatible object store (Cloudflare R2)
//! - `object_key_for_url`: storage key derivation from a news URL

mod error;
pub mod fakes;
pub mod object_key;
mod r2;
mod schema;
mod sigv4;
pub mod storage_traits;
mod supabase;

pub use error::StorageError;
pub use object_key::object_key_for_url;
pub use r2::{R2Config, R2ObjectStore};
pub use schema::{CheckResultUpdate, CheckState, NewsId, NewsItem};
pub use storage_traits::{NewsRepository, ObjectStore, StorageResult, PNG_CONTENT_TYPE};
pub use supabase::{SupabaseConfig, SupabaseNewsRepository};
