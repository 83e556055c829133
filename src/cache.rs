// Time-bounded query result cache.
//
// Constructed once at startup and shared with the loader. Entries expire
// by age only; there is no manual invalidation. Concurrent writers for the
// same key simply overwrite each other, which is fine because a value is a
// pure function of its key.

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::time::Duration;

use crate::loader::{EntityTables, Franchise};
use crate::scope::{QueryKind, Selection};

/// Default cache window: ten minutes
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Cache key: scope, query kind and the fingerprint of the query text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub selection: Selection,
    pub kind: QueryKind,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(selection: Selection, kind: QueryKind, fingerprint: impl Into<String>) -> Self {
        Self {
            selection,
            kind,
            fingerprint: fingerprint.into(),
        }
    }
}

/// What a cache entry holds
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResult {
    /// Entity tables and when they were read from the store
    Entities {
        tables: EntityTables,
        loaded_at: DateTime<Utc>,
    },
    Franchises(Vec<Franchise>),
}

pub struct QueryCache {
    inner: Cache<CacheKey, CachedResult>,
}

impl QueryCache {
    /// Cache whose entries live for `ttl` after insertion
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: CacheKey, value: CachedResult) {
        self.inner.insert(key, value);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn franchises() -> CachedResult {
        CachedResult::Franchises(vec![Franchise {
            id: 1,
            name: "Alpha".to_string(),
        }])
    }

    fn key(selection: Selection) -> CacheKey {
        CacheKey::new(selection, QueryKind::FranchiseList, "abc")
    }

    #[test]
    fn test_entry_is_fresh_inside_window() {
        let cache = QueryCache::new(Duration::from_secs(600));

        cache.insert(key(Selection::AllFranchises), franchises());

        assert_eq!(cache.get(&key(Selection::AllFranchises)), Some(franchises()));
    }

    #[test]
    fn test_entry_expires_by_age() {
        let cache = QueryCache::new(Duration::from_millis(50));

        cache.insert(key(Selection::AllFranchises), franchises());
        thread::sleep(Duration::from_millis(200));

        assert_eq!(cache.get(&key(Selection::AllFranchises)), None);
    }

    #[test]
    fn test_zero_ttl_never_serves() {
        let cache = QueryCache::new(Duration::ZERO);

        cache.insert(key(Selection::Franchise(1)), franchises());

        assert!(cache.get(&key(Selection::Franchise(1))).is_none());
    }

    #[test]
    fn test_keys_are_distinct_per_scope_and_fingerprint() {
        let cache = QueryCache::default();
        cache.insert(key(Selection::Franchise(1)), franchises());

        assert!(cache.get(&key(Selection::Franchise(2))).is_none());
        assert!(cache
            .get(&CacheKey::new(Selection::Franchise(1), QueryKind::FranchiseList, "other"))
            .is_none());
        assert!(cache.get(&key(Selection::Franchise(1))).is_some());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = std::sync::Arc::new(QueryCache::default());

        let writer = {
            let cache = cache.clone();
            thread::spawn(move || cache.insert(key(Selection::Franchise(3)), franchises()))
        };
        writer.join().unwrap();

        assert_eq!(cache.get(&key(Selection::Franchise(3))), Some(franchises()));
    }
}
