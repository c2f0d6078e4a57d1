use gateway_cache::{BoundedTtlCache, TtlCache};
use std::thread::sleep;
use std::time::Duration;

#[test]
fn test_cache_hit() {
    let cache = TtlCache::new(Duration::from_secs(60));
    cache.insert("key", "value");
    assert_eq!(cache.get(&"key"), Some("value"));
}

#[test]
fn test_cache_miss() {
    let cache: TtlCache<&str, &str> = TtlCache::new(Duration::from_secs(60));
    assert_eq!(cache.get(&"missing"), None);
}

#[test]
fn test_cache_expiry() {
    let cache = TtlCache::new(Duration::from_millis(50));
    cache.insert("key", "value");
    assert_eq!(cache.get(&"key"), Some("value"));
    sleep(Duration::from_millis(60));
    assert_eq!(cache.get(&"key"), None);
}

#[test]
fn test_cache_remove() {
    let cache = TtlCache::new(Duration::from_secs(60));
    cache.insert("key", "value");
    assert_eq!(cache.get(&"key"), Some("value"));
    cache.remove(&"key");
    assert_eq!(cache.get(&"key"), None);
}

#[test]
fn test_cache_clear() {
    let cache = TtlCache::new(Duration::from_secs(60));
    cache.insert("a", "1");
    cache.insert("b", "2");
    cache.clear();
    assert_eq!(cache.get(&"a"), None);
    assert_eq!(cache.get(&"b"), None);
}

#[test]
fn bounded_cache_respects_capacity() {
    let cache = BoundedTtlCache::new(Duration::from_secs(60), 2);
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("c", 3);
    assert_eq!(cache.len(), 2);
}

#[test]
fn bounded_cache_reclaims_expired_slots() {
    let cache = BoundedTtlCache::new(Duration::from_millis(30), 1);
    cache.insert("a", 1);
    assert_eq!(cache.get(&"a"), Some(1));
    sleep(Duration::from_millis(40));
    cache.insert("b", 2);
    assert_eq!(cache.get(&"b"), Some(2));
}
