//! Per-run response cache
//!
//! Created empty when a run starts and dropped when it ends. A given request
//! against a given store reaches the network at most once per run, unless a
//! create on that store invalidates the cached searches for its type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::transfer::EntityType;

/// Identity of a remote store (its normalized root URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        StoreId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What was asked of the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestSignature {
    /// Fetch by absolute URL, pages already concatenated
    Get { url: String },
    /// Equality search, filters serialized in key order
    Search { kind: EntityType, filters: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub store: StoreId,
    pub request: RequestSignature,
}

impl CacheKey {
    pub fn get(store: &StoreId, url: impl Into<String>) -> Self {
        CacheKey {
            store: store.clone(),
            request: RequestSignature::Get { url: url.into() },
        }
    }

    pub fn search(store: &StoreId, kind: EntityType, filters: impl Into<String>) -> Self {
        CacheKey {
            store: store.clone(),
            request: RequestSignature::Search {
                kind,
                filters: filters.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct RunCache {
    entries: Mutex<HashMap<CacheKey, Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Drop cached searches of one type on one store
    pub fn invalidate_searches(&self, store: &StoreId, kind: EntityType) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| {
            !(key.store == *store
                && matches!(&key.request, RequestSignature::Search { kind: k, .. } if *k == kind))
        });
        log::debug!(
            "Invalidated {} cached {} searches on {}",
            before - entries.len(),
            kind,
            store
        );
    }

    /// Drop one cached entry
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().unwrap_or_else(PoisonError::into_inner).len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_scoped_by_store() {
        let cache = RunCache::new();
        let src = StoreId::new("https://old");
        let dst = StoreId::new("https://new");

        cache.insert(CacheKey::get(&src, "/api/v2/hosts/1/"), json!({"id": 1}));

        assert_eq!(cache.get(&CacheKey::get(&src, "/api/v2/hosts/1/")), Some(json!({"id": 1})));
        assert_eq!(cache.get(&CacheKey::get(&dst, "/api/v2/hosts/1/")), None);
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_invalidate_searches_only_touches_one_type() {
        let cache = RunCache::new();
        let dst = StoreId::new("https://new");

        cache.insert(CacheKey::search(&dst, EntityType::Host, "name=web1"), json!([]));
        cache.insert(CacheKey::search(&dst, EntityType::Group, "name=web"), json!([]));
        cache.insert(CacheKey::get(&dst, "/api/v2/hosts/"), json!({}));

        cache.invalidate_searches(&dst, EntityType::Host);

        assert!(cache.get(&CacheKey::search(&dst, EntityType::Host, "name=web1")).is_none());
        assert!(cache.get(&CacheKey::search(&dst, EntityType::Group, "name=web")).is_some());
        assert!(cache.get(&CacheKey::get(&dst, "/api/v2/hosts/")).is_some());
    }

    #[test]
    fn test_invalidate_single_entry() {
        let cache = RunCache::new();
        let dst = StoreId::new("https://new");
        cache.insert(CacheKey::get(&dst, "/api/v2/hosts/1/groups/"), json!({"results": []}));
        cache.insert(CacheKey::get(&dst, "/api/v2/hosts/2/groups/"), json!({"results": []}));

        cache.invalidate(&CacheKey::get(&dst, "/api/v2/hosts/1/groups/"));

        assert!(cache.get(&CacheKey::get(&dst, "/api/v2/hosts/1/groups/")).is_none());
        assert!(cache.get(&CacheKey::get(&dst, "/api/v2/hosts/2/groups/")).is_some());
    }
}
