//! Listing persistence.
//!
//! The pipeline only talks to the `ListingStore` trait. Backends:
//! - `RedisListingStore`:  production store, atomic via server-side scripts
//! - `MemoryListingStore`: process-local store for dry runs and tests
//!
//! Replace protocol:
//! a source's stored set is swapped for the freshly fetched one in a
//! single atomic step (delete everything owned by the source, then
//! insert the new drafts). Readers never observe a mix of old and new.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::schema::{ListingDraft, ListingRecord};

pub use memory::MemoryListingStore;
pub use redis_store::RedisListingStore;

#[async_trait::async_trait]
pub trait ListingStore: Send + Sync {
    /// Atomically replaces every listing owned by `source_id` with `drafts`.
    ///
    /// CONTRACT:
    /// - Each written record gets `source_id` and `last_seen_at = now`
    ///   (or the URL's previous value, if that is later)
    /// - A URL owned by another source moves to `source_id`
    /// - An empty `drafts` clears the source
    /// - On error nothing changes
    ///
    /// RETURNS:
    /// - number of records written
    async fn replace(
        &self,
        source_id: &str,
        drafts: &[ListingDraft],
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError>;

    /// Oldest `last_seen_at` among the source's records, `None` if it has none.
    async fn oldest_seen(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Every record currently owned by `source_id`, ordered by URL.
    async fn listings_for(&self, source_id: &str) -> Result<Vec<ListingRecord>, StorageError>;

    /// Removes every stored listing. Returns the number removed.
    async fn delete_all(&self) -> Result<usize, StorageError>;
}

/// Builds the configured backend.
pub async fn open(cfg: &StoreConfig) -> Result<Arc<dyn ListingStore>, StorageError> {
    match cfg {
        StoreConfig::Redis { url, prefix } => {
            let store = RedisListingStore::connect(url, prefix).await?;
            Ok(Arc::new(store))
        }
        StoreConfig::Memory => Ok(Arc::new(MemoryListingStore::new())),
    }
}
