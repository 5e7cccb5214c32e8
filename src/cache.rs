use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// How much of the normalized message participates in the cache key.
const KEY_PREFIX_CHARS: usize = 50;

struct CacheEntry {
    response: String,
    created: Instant,
}

/// Time-boxed memoization of `(agent, message) -> response`, so repeated
/// inputs within the TTL window skip the provider entirely.
///
/// Expired entries are evicted lazily on lookup; a background sweep task
/// evicts the rest on a fixed interval.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key: agent id plus a cheap rolling hash (not cryptographic) of
    /// the lowercased, punctuation-stripped, truncated message text.
    pub fn key(agent_id: &str, message: &str) -> String {
        let normalized: String = message
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect();
        let normalized: String = normalized.trim().chars().take(KEY_PREFIX_CHARS).collect();
        format!("{agent_id}_{}", rolling_hash(&normalized))
    }

    /// Look up a response. Returns a hit only while the entry is within its
    /// TTL; an expired entry is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.created.elapsed() < self.ttl => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, response: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry {
                response: response.to_string(),
                created: Instant::now(),
            },
        );
    }

    /// Evict all expired entries, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.created.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the background sweep task. Runs until the cache is dropped by
    /// every other holder.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else { break };
                let evicted = cache.sweep();
                if evicted > 0 {
                    debug!(evicted, "swept expired cache entries");
                }
            }
        })
    }
}

/// 32-bit rolling hash, `h = h * 31 + c` in wrapping arithmetic.
fn rolling_hash(text: &str) -> u32 {
    let mut hash: i32 = 0;
    for c in text.chars() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::ResponseCache;

    #[test]
    fn key_normalizes_case_and_punctuation() {
        let a = ResponseCache::key("nova", "Hello, World!");
        let b = ResponseCache::key("nova", "hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn key_distinguishes_agents() {
        let a = ResponseCache::key("nova", "hello");
        let b = ResponseCache::key("sage", "hello");
        assert_ne!(a, b);
    }

    #[test]
    fn key_truncates_long_messages() {
        let long = "a".repeat(200);
        let longer = format!("{}b", "a".repeat(200));
        assert_eq!(
            ResponseCache::key("nova", &long),
            ResponseCache::key("nova", &longer)
        );
    }
}
