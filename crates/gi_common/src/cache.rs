//! Best-effort response cache.
//!
//! TTL'd LRU keyed by a hash of the request. The cache is advisory: a miss
//! or a disabled cache just means the pipeline does the work, so callers
//! never treat cache access as fallible.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache key for a consultation request: message plus canonicalized
/// context (sorted keys, so map iteration order never splits entries).
pub fn cache_key(message: &str, context: &HashMap<String, String>) -> String {
    let mut pairs: Vec<(&String, &String)> = context.iter().collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    hasher.update(message.as_bytes());
    for (k, v) in pairs {
        hasher.update(b"|");
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// TTL'd LRU cache. A TTL of zero disables it entirely.
pub struct ResponseCache<V: Clone> {
    entries: Mutex<LruCache<String, (Instant, V)>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: V) {
        if !self.is_enabled() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, (Instant::now(), value));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cache: ResponseCache<String> = ResponseCache::new(8, Duration::from_secs(60));
        cache.put("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_entry_evicted() {
        let cache: ResponseCache<String> = ResponseCache::new(8, Duration::from_millis(5));
        cache.put("k".to_string(), "v".to_string());
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables() {
        let cache: ResponseCache<String> = ResponseCache::new(8, Duration::ZERO);
        cache.put("k".to_string(), "v".to_string());
        assert!(!cache.is_enabled());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_capacity_evicts_lru() {
        let cache: ResponseCache<u32> = ResponseCache::new(2, Duration::from_secs(60));
        cache.put("a".to_string(), 1);
        cache.put("b".to_string(), 2);
        cache.put("c".to_string(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_cache_key_ignores_context_order() {
        let mut ctx1 = HashMap::new();
        ctx1.insert("a".to_string(), "1".to_string());
        ctx1.insert("b".to_string(), "2".to_string());
        let mut ctx2 = HashMap::new();
        ctx2.insert("b".to_string(), "2".to_string());
        ctx2.insert("a".to_string(), "1".to_string());

        assert_eq!(cache_key("msg", &ctx1), cache_key("msg", &ctx2));
        assert_ne!(cache_key("msg", &ctx1), cache_key("other", &ctx1));
    }
}
