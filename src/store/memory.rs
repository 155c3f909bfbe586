use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::schema::{ListingDraft, ListingRecord};

use super::ListingStore;

/// Process-local listing store.
///
/// All state lives behind one mutex. `replace` works on a copy of
/// the map and swaps it in only once every step succeeded, which
/// gives the same all-or-nothing visibility as a database
/// transaction.
///
/// `fail_replace_for` arms a one-shot failure that fires after the
/// delete phase and before the insert phase of the next replace of
/// that source.
#[derive(Default)]
pub struct MemoryListingStore {
    listings: Mutex<BTreeMap<String, ListingRecord>>,
    fail_next: Mutex<HashSet<String>>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn fail_replace_for(&self, source_id: &str) {
        if let Ok(mut fail) = self.fail_next.lock() {
            fail.insert(source_id.to_string());
        }
    }

    /// Every stored record, ordered by URL.
    #[cfg(test)]
    pub fn snapshot(&self) -> Result<Vec<ListingRecord>, StorageError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ListingRecord>>, StorageError> {
        self.listings
            .lock()
            .map_err(|_| StorageError::Backend("listing map poisoned".into()))
    }

    fn take_failure(&self, source_id: &str) -> bool {
        self.fail_next
            .lock()
            .map(|mut fail| fail.remove(source_id))
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl ListingStore for MemoryListingStore {
    async fn replace(
        &self,
        source_id: &str,
        drafts: &[ListingDraft],
        now: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let mut guard = self.lock()?;
        let mut working = guard.clone();

        // delete phase
        working.retain(|_, record| record.source_id != source_id);

        if self.take_failure(source_id) {
            return Err(StorageError::Backend(format!(
                "injected failure while replacing {source_id}"
            )));
        }

        // insert phase
        for draft in drafts {
            let last_seen_at = guard
                .get(&draft.url)
                .map_or(now, |prev| prev.last_seen_at.max(now));
            working.insert(
                draft.url.clone(),
                ListingRecord::stamp(draft, source_id, last_seen_at),
            );
        }

        *guard = working;
        Ok(drafts.len())
    }

    async fn oldest_seen(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .lock()?
            .values()
            .filter(|record| record.source_id == source_id)
            .map(|record| record.last_seen_at)
            .min())
    }

    async fn listings_for(&self, source_id: &str) -> Result<Vec<ListingRecord>, StorageError> {
        Ok(self
            .lock()?
            .values()
            .filter(|record| record.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn delete_all(&self) -> Result<usize, StorageError> {
        let mut guard = self.lock()?;
        let removed = guard.len();
        guard.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(url: &str, title: &str) -> ListingDraft {
        ListingDraft {
            title: title.into(),
            description: format!("{title} description"),
            url: url.into(),
            location: "Chicago".into(),
            posted_at: None,
        }
    }

    #[tokio::test]
    async fn replace_swaps_the_whole_source_set() {
        let store = MemoryListingStore::new();
        let now = Utc::now();

        store
            .replace("drw", &[draft("https://a/1", "One"), draft("https://a/2", "Two")], now)
            .await
            .unwrap();
        store
            .replace("drw", &[draft("https://a/2", "Two v2"), draft("https://a/3", "Three")], now)
            .await
            .unwrap();

        let urls: Vec<String> = store
            .listings_for("drw")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://a/2", "https://a/3"]);
    }

    #[tokio::test]
    async fn replace_leaves_other_sources_alone() {
        let store = MemoryListingStore::new();
        let now = Utc::now();

        store.replace("a", &[draft("https://a/1", "A")], now).await.unwrap();
        store.replace("b", &[draft("https://b/1", "B")], now).await.unwrap();
        store.replace("a", &[], now).await.unwrap();

        assert!(store.listings_for("a").await.unwrap().is_empty());
        assert_eq!(store.listings_for("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_records() {
        let store = MemoryListingStore::new();
        let now = Utc::now();
        store
            .replace("mako", &[draft("https://m/1", "One"), draft("https://m/2", "Two")], now)
            .await
            .unwrap();
        let before = store.snapshot().unwrap();

        store.fail_replace_for("mako");
        let result = store
            .replace("mako", &[draft("https://m/3", "Three")], now + Duration::minutes(5))
            .await;

        assert!(matches!(result, Err(StorageError::Backend(_))));
        assert_eq!(store.snapshot().unwrap(), before);

        // one-shot: the next replace goes through
        store.replace("mako", &[draft("https://m/3", "Three")], now).await.unwrap();
        assert_eq!(store.listings_for("mako").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_url_from_another_source_moves_ownership() {
        let store = MemoryListingStore::new();
        let now = Utc::now();

        store.replace("board", &[draft("https://x/1", "Dev")], now).await.unwrap();
        store
            .replace("company", &[draft("https://x/1", "Dev (direct)")], now + Duration::seconds(1))
            .await
            .unwrap();

        let all = store.snapshot().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_id, "company");
        assert_eq!(all[0].title, "Dev (direct)");
        assert!(store.listings_for("board").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_seen_never_moves_backwards() {
        let store = MemoryListingStore::new();
        let later = Utc::now();
        let earlier = later - Duration::hours(1);

        store.replace("a", &[draft("https://x/1", "Dev")], later).await.unwrap();
        store.replace("b", &[draft("https://x/1", "Dev")], earlier).await.unwrap();

        let all = store.snapshot().unwrap();
        assert_eq!(all[0].last_seen_at, later);
        assert_eq!(all[0].source_id, "b");
    }

    #[tokio::test]
    async fn oldest_seen_reports_minimum() {
        let store = MemoryListingStore::new();
        let now = Utc::now();
        assert_eq!(store.oldest_seen("a").await.unwrap(), None);

        store.replace("a", &[draft("https://x/1", "One")], now).await.unwrap();
        store
            .replace("b", &[draft("https://y/1", "Other")], now - Duration::days(2))
            .await
            .unwrap();

        assert_eq!(store.oldest_seen("a").await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn delete_all_empties_the_store() {
        let store = MemoryListingStore::new();
        let now = Utc::now();
        store.replace("a", &[draft("https://x/1", "One")], now).await.unwrap();
        store.replace("b", &[draft("https://y/1", "Two")], now).await.unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.snapshot().unwrap().is_empty());
    }
}
