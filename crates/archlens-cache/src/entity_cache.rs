use crate::{BoundedCache, CacheConfig, CacheSizeEstimator, CacheStats, KeyedCache};
use archlens_core::ComponentId;
use tracing::debug;

/// Per-component analysis results keyed by component id.
pub struct ComponentResultCache<V> {
    inner: BoundedCache<ComponentId, V>,
}

impl<V> ComponentResultCache<V>
where
    V: Clone + CacheSizeEstimator,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: BoundedCache::new(config),
        }
    }

    pub fn put(&self, id: impl Into<ComponentId>, value: V) {
        self.inner.put(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<V> {
        self.inner.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.inner.invalidate(id)
    }

    /// Drop the cached results of every listed component.
    pub fn invalidate_components<I, S>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let removed = ids
            .into_iter()
            .filter(|id| {
                let id: &str = id.as_ref();
                self.inner.invalidate(id)
            })
            .count();
        debug!(removed, "component results invalidated");
        removed
    }

    pub fn invalidate_all(&self) -> usize {
        self.inner.invalidate_all()
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
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

impl<V> KeyedCache<ComponentId, V> for ComponentResultCache<V>
where
    V: Clone + CacheSizeEstimator + Send,
{
    fn put(&self, key: ComponentId, value: V) {
        self.inner.put(key, value)
    }

    fn get(&self, key: &ComponentId) -> Option<V> {
        self.inner.get(key.as_str())
    }

    fn invalidate(&self, key: &ComponentId) -> bool {
        self.inner.invalidate(key.as_str())
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

#[cfg(test)]
mod tests {
    use super::*;
    use archlens_core::EvictionPolicy;
    use std::time::Duration;

    #[test]
    fn invalidate_components_counts_only_present_ids() {
        let cache = ComponentResultCache::new(CacheConfig::new(
            10,
            Duration::from_secs(60),
            EvictionPolicy::Lru,
        ));
        cache.put("view", "rendered".to_string());
        cache.put("context", "state".to_string());
        cache.put("model", "entity".to_string());

        assert_eq!(cache.invalidate_components(["view", "model", "ghost"]), 2);
        assert!(cache.contains("context"));
        assert_eq!(cache.len(), 1);
    }
}
