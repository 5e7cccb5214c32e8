use banter::cache::ResponseCache;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn stores_and_retrieves_within_ttl() {
    let cache = ResponseCache::new();
    let key = ResponseCache::key("nova", "how do I get started?");
    assert_eq!(cache.get(&key), None);

    cache.put(&key, "Just dive in!");
    assert_eq!(cache.get(&key).as_deref(), Some("Just dive in!"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn expired_entries_read_as_misses() {
    let cache = ResponseCache::with_ttl(Duration::from_millis(10));
    let key = ResponseCache::key("nova", "hello");
    cache.put(&key, "hi there, friend");

    std::thread::sleep(Duration::from_millis(25));
    assert_eq!(cache.get(&key), None);
    // Lazy eviction removed the entry on lookup.
    assert!(cache.is_empty());
}

#[test]
fn sweep_removes_only_expired_entries() {
    let cache = ResponseCache::with_ttl(Duration::from_millis(50));
    cache.put("stale", "old response");
    std::thread::sleep(Duration::from_millis(60));
    cache.put("fresh", "new response");

    let evicted = cache.sweep();
    assert_eq!(evicted, 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("fresh").as_deref(), Some("new response"));
}

#[test]
fn clear_drops_everything() {
    let cache = ResponseCache::new();
    cache.put("a", "one");
    cache.put("b", "two");
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn same_message_same_agent_collides_on_purpose() {
    // Punctuation, case, and anything past the key prefix are ignored.
    let a = ResponseCache::key("nova", "What's the BEST way to learn Rust???");
    let b = ResponseCache::key("nova", "whats the best way to learn rust");
    assert_eq!(a, b);

    // Different agents never share entries for the same message.
    let c = ResponseCache::key("sage", "whats the best way to learn rust");
    assert_ne!(a, c);
}

#[tokio::test]
async fn sweeper_stops_when_cache_is_dropped() {
    let cache = Arc::new(ResponseCache::with_ttl(Duration::from_millis(10)));
    let handle = cache.spawn_sweeper(Duration::from_millis(5));

    drop(cache);
    // The weak upgrade fails on the next tick and the task exits.
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper task should exit")
        .expect("sweeper task should not panic");
}
