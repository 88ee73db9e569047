use archlens_core::CacheSection;
pub use archlens_core::EvictionPolicy;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Cache entry metadata
///
/// `inserted_seq` and `accessed_seq` come from a per-cache logical clock so
/// FIFO/LRU ordering stays exact even when two operations share an `Instant`.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub cached_at: Instant,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub size_bytes: usize,
    inserted_seq: u64,
    accessed_seq: u64,
}

impl<T> CacheEntry<T> {
    fn new(value: T, size_bytes: usize, seq: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            cached_at: now,
            created_at: Utc::now(),
            last_accessed: now,
            access_count: 0,
            size_bytes,
            inserted_seq: seq,
            accessed_seq: seq,
        }
    }

    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }

    fn touch(&mut self, seq: u64) {
        self.last_accessed = Instant::now();
        self.accessed_seq = seq;
        self.access_count += 1;
    }
}

/// Cache configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl: Duration,
    pub eviction_policy: EvictionPolicy,
    pub memory_threshold_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1_000,
            ttl: Duration::from_secs(300),
            eviction_policy: EvictionPolicy::Lru,
            memory_threshold_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl CacheConfig {
    pub fn new(max_size: usize, ttl: Duration, eviction_policy: EvictionPolicy) -> Self {
        Self {
            max_size,
            ttl,
            eviction_policy,
            ..Default::default()
        }
    }

    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold_bytes = bytes;
        self
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        Self {
            max_size: section.max_size,
            ttl: Duration::from_secs(section.ttl_secs),
            eviction_policy: section.eviction_policy,
            memory_threshold_bytes: section.memory_threshold_bytes,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub item_count: usize,
    pub memory_bytes: usize,
    pub total_accesses: u64,
    pub average_age: Duration,
    pub oldest_cached_at: Option<DateTime<Utc>>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}

/// Trait for cache size estimation
pub trait CacheSizeEstimator {
    fn estimate_size(&self) -> usize;
}

impl CacheSizeEstimator for String {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl CacheSizeEstimator for str {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl<T: CacheSizeEstimator> CacheSizeEstimator for Vec<T> {
    fn estimate_size(&self) -> usize {
        self.iter().map(CacheSizeEstimator::estimate_size).sum()
    }
}

impl<T: CacheSizeEstimator + ?Sized> CacheSizeEstimator for Arc<T> {
    fn estimate_size(&self) -> usize {
        (**self).estimate_size()
    }
}

macro_rules! fixed_size_estimator {
    ($($ty:ty),*) => {
        $(impl CacheSizeEstimator for $ty {
            fn estimate_size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }
        })*
    };
}

fixed_size_estimator!(u8, u16, u32, u64, usize, i32, i64, f32, f64, bool);

/// Size of a value's JSON encoding, for payloads without a hand-written estimate.
pub fn estimate_json_size<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

/// Common surface of every cache instance.
pub trait KeyedCache<K, V>: Send + Sync {
    fn put(&self, key: K, value: V);
    fn get(&self, key: &K) -> Option<V>;
    fn invalidate(&self, key: &K) -> bool;
    fn invalidate_all(&self) -> usize;
    fn stats(&self) -> CacheStats;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct CacheState<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    memory_bytes: usize,
    clock: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn select_victim(&self, policy: EvictionPolicy, exclude: &K) -> Option<K> {
        let candidates = self.entries.iter().filter(|(k, _)| *k != exclude);
        let victim = match policy {
            EvictionPolicy::Lru => candidates.min_by_key(|(_, e)| e.accessed_seq),
            EvictionPolicy::Fifo => candidates.min_by_key(|(_, e)| e.inserted_seq),
            EvictionPolicy::Lfu => candidates
                .min_by_key(|(_, e)| (e.access_count, e.accessed_seq, e.inserted_seq)),
        };
        victim.map(|(k, _)| k.clone())
    }

    /// Evict one entry at a time until both ceilings hold. `protected` is the
    /// key just written and is never chosen.
    fn enforce_limits(&mut self, config: &CacheConfig, protected: &K) -> usize {
        let mut evicted = 0;
        while self.entries.len() > config.max_size
            || self.memory_bytes > config.memory_threshold_bytes
        {
            let Some(victim) = self.select_victim(config.eviction_policy, protected) else {
                break;
            };
            self.remove(&victim);
            evicted += 1;
        }
        self.evictions += evicted as u64;
        evicted
    }
}

/// Size- and memory-bounded cache with TTL expiry and a selectable
/// eviction policy.
///
/// All reads and writes go through one mutex, so insert-then-evict and
/// get-then-touch are atomic with respect to other callers.
pub struct BoundedCache<K, V> {
    state: Mutex<CacheState<K, V>>,
    config: CacheConfig,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + CacheSizeEstimator,
    V: Clone + CacheSizeEstimator,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                memory_bytes: 0,
                clock: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert or replace `key`, then evict until the ceilings hold.
    pub fn put(&self, key: K, value: V) {
        let size_bytes = key.estimate_size() + value.estimate_size();
        let mut state = self.state.lock();

        state.remove(&key);
        let seq = state.tick();
        state.memory_bytes += size_bytes;
        state
            .entries
            .insert(key.clone(), CacheEntry::new(value, size_bytes, seq));

        let evicted = state.enforce_limits(&self.config, &key);
        if evicted > 0 {
            debug!(
                evicted,
                policy = %self.config.eviction_policy,
                entries = state.entries.len(),
                memory_bytes = state.memory_bytes,
                "cache ceiling enforced"
            );
        }
    }

    /// Fetch a live entry. Expired entries are removed and reported as a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) => entry.is_expired(self.config.ttl),
            None => {
                state.misses += 1;
                return None;
            }
        };

        if expired {
            state.remove(key);
            state.expirations += 1;
            state.misses += 1;
            trace!("expired cache entry dropped on read");
            return None;
        }

        let seq = state.tick();
        let entry = state.entries.get_mut(key)?;
        entry.touch(seq);
        state.hits += 1;
        Some(entry.value.clone())
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .map(|e| !e.is_expired(self.config.ttl))
            .unwrap_or(false)
    }

    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.lock().remove(key).is_some()
    }

    /// Remove every entry whose key satisfies `predicate`.
    pub fn invalidate_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut state = self.state.lock();
        let doomed: Vec<K> = state
            .entries
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();
        for key in &doomed {
            state.remove(key);
        }
        doomed.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.memory_bytes = 0;
        removed
    }

    /// Drop every entry older than the TTL.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.config.ttl;
        let mut state = self.state.lock();
        let expired: Vec<K> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(ttl))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        state.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn keys(&self) -> Vec<K> {
        self.state.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_bytes(&self) -> usize {
        self.state.lock().memory_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let item_count = state.entries.len();
        let total_age: Duration = state.entries.values().map(CacheEntry::age).sum();

        CacheStats {
            item_count,
            memory_bytes: state.memory_bytes,
            total_accesses: state.entries.values().map(|e| e.access_count).sum(),
            average_age: if item_count == 0 {
                Duration::ZERO
            } else {
                total_age / item_count as u32
            },
            oldest_cached_at: state.entries.values().map(|e| e.created_at).min(),
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
        }
    }
}

impl<K, V> KeyedCache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + CacheSizeEstimator + Send,
    V: Clone + CacheSizeEstimator + Send,
{
    fn put(&self, key: K, value: V) {
        BoundedCache::put(self, key, value)
    }

    fn get(&self, key: &K) -> Option<V> {
        BoundedCache::get(self, key)
    }

    fn invalidate(&self, key: &K) -> bool {
        BoundedCache::invalidate(self, key)
    }

    fn invalidate_all(&self) -> usize {
        BoundedCache::invalidate_all(self)
    }

    fn stats(&self) -> CacheStats {
        BoundedCache::stats(self)
    }

    fn len(&self) -> usize {
        BoundedCache::len(self)
    }
}
