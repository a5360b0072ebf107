//! Caches used by the resource client.
//!
//! [`NamespaceCache`] keeps the namespace list for a fixed time-to-live
//! behind a read/write lock. [`EmptyResultCache`] remembers which
//! `(namespace, resource type)` pairs returned nothing, for the lifetime of
//! the client.

use std::time::Duration;

use dashmap::DashSet;
use parking_lot::RwLock;
use tokio::time::Instant;

/// Default time-to-live of the namespace list.
pub const DEFAULT_NAMESPACE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct CachedNamespaces {
    names: Vec<String>,
    fetched_at: Instant,
}

/// A time-limited cache of the namespace list.
///
/// Readers never block each other; storing a fresh list excludes all readers.
#[derive(Debug)]
pub struct NamespaceCache {
    ttl: Duration,
    entry: RwLock<Option<CachedNamespaces>>,
}

impl Default for NamespaceCache {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE_TTL)
    }
}

impl NamespaceCache {
    /// Create an empty cache with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// The cached list, if present and not expired.
    #[must_use]
    pub fn get(&self) -> Option<Vec<String>> {
        self.entry
            .read()
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.names.clone())
    }

    /// Replace the cached list.
    pub fn store(&self, names: Vec<String>) {
        *self.entry.write() = Some(CachedNamespaces {
            names,
            fetched_at: Instant::now(),
        });
    }

    /// Drop the cached list.
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }
}

/// `(namespace, resource type)` pairs known to hold no objects.
#[derive(Debug, Default)]
pub struct EmptyResultCache {
    entries: DashSet<String>,
}

impl EmptyResultCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, resource_type: &str) -> String {
        format!("{namespace}:{resource_type}")
    }

    /// Whether the pair was seen empty before.
    #[must_use]
    pub fn is_empty_result(&self, namespace: &str, resource_type: &str) -> bool {
        self.entries.contains(&Self::key(namespace, resource_type))
    }

    /// Remember that the pair holds no objects.
    pub fn mark_empty(&self, namespace: &str, resource_type: &str) {
        self.entries.insert(Self::key(namespace, resource_type));
    }

    /// Number of remembered pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn namespace_cache_expires() {
        let cache = NamespaceCache::new(Duration::from_secs(300));
        assert!(cache.get().is_none());

        cache.store(vec!["default".to_string(), "shop".to_string()]);
        assert_eq!(cache.get().map(|names| names.len()), Some(2));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn namespace_cache_invalidate() {
        let cache = NamespaceCache::default();
        cache.store(vec!["default".to_string()]);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn empty_results_are_keyed_by_pair() {
        let cache = EmptyResultCache::new();
        assert!(cache.is_empty());

        cache.mark_empty("shop", "configmaps");
        assert!(cache.is_empty_result("shop", "configmaps"));
        assert!(!cache.is_empty_result("shop", "secrets"));
        assert!(!cache.is_empty_result("billing", "configmaps"));

        cache.mark_empty("shop", "configmaps");
        assert_eq!(cache.len(), 1);
    }
}
