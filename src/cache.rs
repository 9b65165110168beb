use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::locations::Location;

const SEARCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Identifies one geocoding request. The same text asked in another language
/// or with another result limit is a different entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    query: String,
    language: String,
    limit: u8,
}

impl SearchKey {
    /// Case and surrounding whitespace of the query are ignored.
    /// A blank query has no key.
    pub fn new(query: &str, language: &str, limit: u8) -> Option<Self> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        Some(Self {
            query,
            language: language.to_lowercase(),
            limit,
        })
    }
}

struct Cached {
    places: Vec<Location>,
    expires_at: Instant,
}

/// Recent place search results, shared by every geocoder instance
pub struct PlaceCache {
    entries: DashMap<SearchKey, Cached>,
    ttl: Duration,
}

impl PlaceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Unexpired results for `key`. An expired entry is dropped on the way out.
    pub fn lookup(&self, key: &SearchKey) -> Option<Vec<Location>> {
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > Instant::now()).then(|| entry.places.clone()))?;
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    pub fn store(&self, key: SearchKey, places: Vec<Location>) {
        self.entries.insert(
            key,
            Cached {
                places,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every expired entry and return how many went
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

pub type SearchCache = Arc<PlaceCache>;

/// Place search cache holding results for 24 hours
pub fn create_search_cache() -> SearchCache {
    Arc::new(PlaceCache::new(SEARCH_TTL))
}

/// Purge expired search results once an hour
pub fn start_cache_cleanup_task(cache: SearchCache) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Place search cache cleanup completed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn berlin() -> Vec<Location> {
        vec![Location {
            id: "2950159".to_string(),
            name: "Berlin, Land Berlin, Germany".to_string(),
            latitude: 52.52,
            longitude: 13.41,
            is_live: false,
        }]
    }

    fn key(query: &str) -> SearchKey {
        SearchKey::new(query, "en", 5).unwrap()
    }

    #[test]
    fn test_key_ignores_case_and_padding() {
        assert_eq!(key("  Berlin  "), key("berlin"));
        assert_eq!(SearchKey::new("Berlin", "EN", 5), SearchKey::new("berlin", "en", 5));
        assert!(SearchKey::new("   ", "en", 5).is_none());
    }

    #[test]
    fn test_key_separates_language_and_limit() {
        let cache = PlaceCache::new(Duration::from_secs(60));
        cache.store(key("Berlin"), berlin());

        assert_eq!(cache.lookup(&key("BERLIN")), Some(berlin()));
        assert_eq!(cache.lookup(&SearchKey::new("Berlin", "de", 5).unwrap()), None);
        assert_eq!(cache.lookup(&SearchKey::new("Berlin", "en", 10).unwrap()), None);
    }

    #[test]
    fn test_expired_lookup_misses() {
        let cache = PlaceCache::new(Duration::from_millis(1));
        cache.store(key("Berlin"), berlin());
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.lookup(&key("Berlin")), None);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_purge_counts_removed_entries() {
        let cache = PlaceCache::new(Duration::from_millis(1));
        cache.store(key("Berlin"), berlin());
        cache.store(key("Paris"), Vec::new());
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_store_replaces_previous_results() {
        let cache = PlaceCache::new(Duration::from_secs(60));
        cache.store(key("Berlin"), Vec::new());
        cache.store(key("berlin"), berlin());

        assert_eq!(cache.lookup(&key("Berlin")), Some(berlin()));
    }
}
