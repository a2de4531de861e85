//! Bounded-lifetime cache for scrape and LLM results
//!
//! A single mutex guards the map; no per-key locking. Calls are dominated
//! by network latency, so briefly serializing on the lock is fine.
//! Entries expire lazily on read; there is no background sweep and no
//! size bound (TTL only).

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted) >= self.ttl
    }
}

/// Time-expiring key→value store shared across requests.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Get a value if present and not expired. Expired entries are
    /// removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if !entry.expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value with the default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit TTL.
    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            Entry {
                value,
                inserted: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop one entry.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a page fetch: URL plus the options that shape the result.
pub fn scrape_key(url: &str, options_fingerprint: &str) -> String {
    hash_key("scrape", &format!("{url}\n{options_fingerprint}"))
}

/// Cache key for an LLM call: operation name plus the rendered prompt.
pub fn prompt_key(kind: &str, prompt: &str) -> String {
    hash_key(kind, prompt)
}

fn hash_key(namespace: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(payload.as_bytes());
    format!("{namespace}:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_get_after_put_returns_value() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 42);
        assert_eq!(cache.get("k"), Some(42));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("k", "v".to_string(), Duration::from_millis(20));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k"), None);
        // Lazy expiry removed the entry
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("k", 1);
        cache.insert("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_differ_by_url_and_options() {
        let a = scrape_key("https://example.com", "timeout=30");
        let b = scrape_key("https://example.com", "timeout=60");
        let c = scrape_key("https://example.org", "timeout=30");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, scrape_key("https://example.com", "timeout=30"));
        assert!(a.starts_with("scrape:"));
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.insert(format!("k{i}"), i);
                    cache.get(&format!("k{i}"))
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.join().unwrap(), Some(i as i32));
        }
        assert_eq!(cache.len(), 4);
    }
}
