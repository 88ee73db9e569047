use approx::assert_relative_eq;
use archlens_cache::{
    BoundedCache, CacheConfig, CacheSizeEstimator, ComponentResultCache, EvictionPolicy,
    KeyedCache, QueryResultCache,
};
use archlens_core::{CacheSection, Query, QueryIntent};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Analysis {
    summary: String,
    dependents: Vec<String>,
}

impl CacheSizeEstimator for Analysis {
    fn estimate_size(&self) -> usize {
        self.summary.estimate_size() + self.dependents.estimate_size()
    }
}

fn analysis(summary: &str) -> Analysis {
    Analysis {
        summary: summary.to_string(),
        dependents: vec!["UserContext".to_string()],
    }
}

#[test]
fn test_lru_scenario_keeps_recently_read_entry() {
    let cache = ComponentResultCache::new(CacheConfig::new(
        2,
        Duration::from_secs(60),
        EvictionPolicy::Lru,
    ));
    cache.put("a", analysis("a"));
    cache.put("b", analysis("b"));
    assert!(cache.get("a").is_some());
    cache.put("c", analysis("c"));

    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_config_section_drives_cache() {
    let section = CacheSection {
        max_size: 2,
        ttl_secs: 60,
        eviction_policy: EvictionPolicy::Fifo,
        memory_threshold_bytes: 1024,
    };
    let config = CacheConfig::from(&section);
    assert_eq!(config.ttl, Duration::from_secs(60));

    let cache: BoundedCache<String, String> = BoundedCache::new(config);
    cache.put("a".into(), "1".into());
    cache.put("b".into(), "2".into());
    cache.get("a");
    cache.put("c".into(), "3".into());
    assert!(!cache.contains_key("a"));
}

#[test]
fn test_ceilings_hold_after_every_put() {
    for policy in [EvictionPolicy::Lru, EvictionPolicy::Fifo, EvictionPolicy::Lfu] {
        let cache = BoundedCache::new(
            CacheConfig::new(5, Duration::from_secs(60), policy).with_memory_threshold(200),
        );
        for i in 0..50 {
            cache.put(format!("key-{}", i), "v".repeat(i % 7 * 10));
            if i % 3 == 0 {
                cache.get(format!("key-{}", i / 2).as_str());
            }
            assert!(cache.len() <= 5);
            assert!(cache.memory_bytes() <= 200);
            assert!(cache.contains_key(format!("key-{}", i).as_str()));
        }
    }
}

#[test]
fn test_hit_rate_reporting() {
    let cache = QueryResultCache::new(CacheConfig::new(
        10,
        Duration::from_secs(60),
        EvictionPolicy::Lru,
    ));
    let query = Query::new(QueryIntent::MostConnected).with_param("limit", "3");
    assert!(cache.get_query(&query).is_none());
    cache.put_query(&query, analysis("hub"));
    for _ in 0..3 {
        assert_eq!(cache.get_query(&query), Some(analysis("hub")));
    }

    let stats = cache.stats();
    assert_relative_eq!(stats.hit_rate(), 0.75);
    assert_relative_eq!(stats.miss_rate(), 0.25);
    assert_eq!(stats.total_accesses, 3);
}

#[test]
fn test_ttl_expiry_counts_as_miss() {
    let cache = QueryResultCache::new(CacheConfig::new(
        10,
        Duration::from_millis(25),
        EvictionPolicy::Lru,
    ));
    cache.put("list_components", analysis("all"));
    thread::sleep(Duration::from_millis(50));

    assert!(cache.get("list_components").is_none());
    let stats = cache.stats();
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.expirations, 1);
}

#[test]
fn test_keyed_cache_trait_object() {
    let caches: Vec<Box<dyn KeyedCache<String, String>>> = vec![
        Box::new(BoundedCache::new(CacheConfig::default())),
        Box::new(QueryResultCache::new(CacheConfig::default())),
        Box::new(ComponentResultCache::new(CacheConfig::default())),
    ];

    for cache in &caches {
        cache.put("key".to_string(), "value".to_string());
        assert_eq!(cache.get(&"key".to_string()), Some("value".to_string()));
        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.is_empty());
    }
}

#[test]
fn test_concurrent_access_respects_capacity() {
    let cache = Arc::new(BoundedCache::new(CacheConfig::new(
        32,
        Duration::from_secs(60),
        EvictionPolicy::Lfu,
    )));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("t{}-{}", t, i % 40);
                    cache.put(key.clone(), i as u64);
                    cache.get(key.as_str());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert!(stats.item_count <= 32);
    assert_eq!(stats.hits + stats.misses, 8 * 200);
}
