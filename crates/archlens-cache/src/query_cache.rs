use crate::{BoundedCache, CacheConfig, CacheSizeEstimator, CacheStats, KeyPattern, KeyedCache};
use archlens_core::{normalize_query_key, Query};
use tracing::debug;

/// Query results keyed by normalized query string.
///
/// Every key is normalized on the way in and on lookup, so callers may pass
/// raw strings or [`Query`] values interchangeably.
pub struct QueryResultCache<V> {
    inner: BoundedCache<String, V>,
}

impl<V> QueryResultCache<V>
where
    V: Clone + CacheSizeEstimator,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: BoundedCache::new(config),
        }
    }

    pub fn get_query(&self, query: &Query) -> Option<V> {
        self.inner.get(query.cache_key().as_str())
    }

    pub fn put_query(&self, query: &Query, value: V) {
        self.inner.put(query.cache_key(), value);
    }

    pub fn get(&self, raw_key: &str) -> Option<V> {
        self.inner.get(normalize_query_key(raw_key).as_str())
    }

    pub fn put(&self, raw_key: &str, value: V) {
        self.inner.put(normalize_query_key(raw_key), value);
    }

    pub fn invalidate(&self, raw_key: &str) -> bool {
        self.inner.invalidate(normalize_query_key(raw_key).as_str())
    }

    /// Remove every key matching a `*` glob. Keys are stored lowercased, so
    /// the pattern is lowercased too.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let matcher = KeyPattern::compile(&pattern.to_lowercase());
        let removed = self.inner.invalidate_where(|key| matcher.matches(key));
        debug!(pattern, removed, "query results invalidated by pattern");
        removed
    }

    pub fn invalidate_all(&self) -> usize {
        self.inner.invalidate_all()
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        self.inner.config()
    }
}

impl<V> KeyedCache<String, V> for QueryResultCache<V>
where
    V: Clone + CacheSizeEstimator + Send,
{
    fn put(&self, key: String, value: V) {
        QueryResultCache::put(self, &key, value)
    }

    fn get(&self, key: &String) -> Option<V> {
        QueryResultCache::get(self, key)
    }

    fn invalidate(&self, key: &String) -> bool {
        QueryResultCache::invalidate(self, key)
    }

    fn invalidate_all(&self) -> usize {
        self.inner.invalidate_all()
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
