//! Request nonces.
//!
//! Every consult/search call must carry a nonce previously issued by the
//! daemon. Nonces are reusable until they expire, mirroring how CMS form
//! tokens behave. The store is a capacity-bounded LRU: issuance is an
//! unauthenticated endpoint, so the default 12-hour TTL alone would let
//! anyone grow the map without limit. Expired entries are also popped off
//! the cold end on each issue.

use lru::LruCache;
use rand::RngCore;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Live-nonce bound; the least recently issued are evicted past this.
const MAX_LIVE_NONCES: usize = 8192;

pub struct NonceStore {
    tokens: Mutex<LruCache<String, Instant>>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_LIVE_NONCES)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            tokens: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Issue a fresh nonce.
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let mut tokens = self.tokens.lock().unwrap();
        // Validation never promotes, so LRU order is issue order and the
        // cold end holds the oldest token.
        loop {
            let expired = match tokens.peek_lru() {
                Some((_, issued)) => issued.elapsed() >= self.ttl,
                None => false,
            };
            if !expired {
                break;
            }
            tokens.pop_lru();
        }
        tokens.put(token.clone(), Instant::now());
        token
    }

    /// Whether the nonce is known and unexpired. Does not consume it.
    pub fn validate(&self, token: &str) -> bool {
        let tokens = self.tokens.lock().unwrap();
        tokens
            .peek(token)
            .map(|issued| issued.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
