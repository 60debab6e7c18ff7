//! Single-slot cache for the most recent scrape result.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::model::Collection;

struct CacheEntry {
    items: Vec<Collection>,
    fetched_at: Instant,
}

/// TTL-bounded cache of the last successful scrape, shared across
/// concurrent requests.
///
/// Reads take a snapshot; writes replace the whole entry, so readers never
/// observe partial state. Concurrent misses are not deduplicated: two
/// cold-cache requests may both scrape. A single-flight gate keyed on a
/// generation counter would slot in here if upstream load ever warrants
/// it.
#[derive(Default)]
pub struct CollectionCache {
    entry: RwLock<Option<CacheEntry>>,
}

impl CollectionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the cached slots when present and younger than `ttl`.
    ///
    /// A zero `ttl` disables caching entirely.
    pub async fn get(&self, ttl: Duration) -> Option<Vec<Collection>> {
        if ttl.is_zero() {
            return None;
        }
        let guard = self.entry.read().await;
        let entry = guard.as_ref()?;
        if entry.fetched_at.elapsed() > ttl {
            return None;
        }
        Some(entry.items.clone())
    }

    /// Replace the cached value wholesale.
    pub async fn set(&self, items: Vec<Collection>) {
        let mut guard = self.entry.write().await;
        *guard = Some(CacheEntry {
            items,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::model::{Collection, WasteStream};

    use super::*;

    fn items() -> Vec<Collection> {
        vec![Collection {
            date: chrono_tz::Europe::London
                .with_ymd_and_hms(2025, 12, 2, 6, 0, 0)
                .unwrap(),
            stream: WasteStream::Refuse,
            instructions: Vec::new(),
            note: String::new(),
        }]
    }

    #[tokio::test]
    async fn empty_cache_misses() {
        let cache = CollectionCache::new();
        assert!(cache.get(Duration::from_secs(60)).await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_a_snapshot() {
        let cache = CollectionCache::new();
        cache.set(items()).await;

        let snapshot = cache.get(Duration::from_secs(60)).await.expect("hit");
        assert_eq!(snapshot, items());
    }

    #[tokio::test]
    async fn entries_expire_after_the_ttl() {
        let cache = CollectionCache::new();
        cache.set(items()).await;

        assert!(cache.get(Duration::from_millis(50)).await.is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = CollectionCache::new();
        cache.set(items()).await;
        assert!(cache.get(Duration::ZERO).await.is_none());
    }

    #[tokio::test]
    async fn set_replaces_the_whole_value() {
        let cache = CollectionCache::new();
        cache.set(items()).await;
        cache.set(Vec::new()).await;

        let snapshot = cache.get(Duration::from_secs(60)).await.expect("hit");
        assert!(snapshot.is_empty());
    }
}
