//! Content-addressed perceptual cache
//!
//! Maps a frame fingerprint to a previously computed description so that
//! redundant frames (static screens, slow scenes) are never re-described.
//! Entries live for a fixed TTL and the cache holds a bounded number of
//! them; under capacity pressure the entry closest to natural expiry is
//! evicted first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::config::CacheConfig;

/// Compute the content fingerprint for a frame's encoded bytes.
///
/// SHA-256 over the raw bytes, hex-encoded. Deterministic: identical bytes
/// always produce the identical key.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A cached frame description
#[derive(Debug, Clone)]
pub struct CachedDescription {
    /// Content fingerprint this description was computed for
    pub fingerprint: String,
    /// The description text
    pub description: String,
    /// Storage timestamp (unix millis)
    pub stored_at: i64,
    /// Absolute expiry deadline
    expires_at: Instant,
    /// Insertion sequence number, used as the eviction tie-break
    seq: u64,
}

/// Bounded TTL cache of frame descriptions keyed by content fingerprint
#[derive(Debug)]
pub struct PerceptualCache {
    entries: HashMap<String, CachedDescription>,
    ttl: Duration,
    max_entries: usize,
    next_seq: u64,
}

impl PerceptualCache {
    /// Create an empty cache with the given TTL and capacity
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Duration::from_secs(config.ttl_seconds),
            max_entries: config.max_entries,
            next_seq: 0,
        }
    }

    /// Look up a description by fingerprint.
    ///
    /// Expired entries are never returned, even if the sweeper has not
    /// removed them yet.
    #[must_use]
    pub fn get(&self, hash: &str) -> Option<CachedDescription> {
        self.entries
            .get(hash)
            .filter(|e| e.expires_at > Instant::now())
            .cloned()
    }

    /// Store a description under the given fingerprint.
    ///
    /// At capacity, exactly one entry is evicted before inserting: the one
    /// with the smallest remaining time-to-live, tie-broken by insertion
    /// order.
    pub fn set(&mut self, hash: &str, description: &str) {
        if self.entries.len() >= self.max_entries {
            if let Some(victim) = self
                .entries
                .values()
                .min_by_key(|e| (e.expires_at, e.seq))
                .map(|e| e.fingerprint.clone())
            {
                self.entries.remove(&victim);
                tracing::debug!(fingerprint = %victim, "evicted nearest-expiry cache entry");
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries.insert(
            hash.to_string(),
            CachedDescription {
                fingerprint: hash.to_string(),
                description: description.to_string(),
                stored_at: chrono::Utc::now().timestamp_millis(),
                expires_at: Instant::now() + self.ttl,
                seq,
            },
        );
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }

    /// Number of entries currently held, including any not yet swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured time-to-live
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Spawn the periodic TTL sweeper for a shared cache.
///
/// Runs every half TTL, independent of request traffic. The returned handle
/// should be aborted when the owning session is torn down.
pub fn spawn_sweeper(cache: Arc<Mutex<PerceptualCache>>) -> tokio::task::JoinHandle<()> {
    let period = cache.lock().map_or(Duration::from_secs(30), |guard| {
        (guard.ttl() / 2).max(Duration::from_secs(1))
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let swept = cache.lock().map(|mut c| c.sweep()).unwrap_or(0);
            if swept > 0 {
                tracing::debug!(swept, "perceptual cache sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(ttl_seconds: u64, max_entries: usize) -> PerceptualCache {
        PerceptualCache::new(&CacheConfig {
            ttl_seconds,
            max_entries,
        })
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint(b"frame bytes");
        let b = fingerprint(b"frame bytes");
        let c = fingerprint(b"other bytes");

        assert_eq!(a, b);
        assert_ne!(a, c);
        // SHA-256 hex digest
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn set_then_get_returns_stored_description() {
        let mut cache = cache_with(60, 10);
        let hash = fingerprint(b"some frame");

        cache.set(&hash, "a terminal window");
        let hit = cache.get(&hash).expect("entry should be present");
        assert_eq!(hit.description, "a terminal window");
        assert_eq!(hit.fingerprint, hash);
    }

    #[test]
    fn missing_key_is_absent() {
        let cache = cache_with(60, 10);
        assert!(cache.get("no-such-hash").is_none());
    }

    #[test]
    fn capacity_bound_holds() {
        let mut cache = cache_with(60, 2);
        cache.set("h1", "d1");
        cache.set("h2", "d2");
        cache.set("h3", "d3");

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn nearest_expiry_is_evicted_first() {
        let mut cache = cache_with(60, 2);
        // h1 inserted first has the nearest expiry (same TTL, earliest clock)
        cache.set("h1", "d1");
        cache.set("h2", "d2");
        cache.set("h3", "d3");

        assert!(cache.get("h1").is_none());
        assert!(cache.get("h2").is_some());
        assert!(cache.get("h3").is_some());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut cache = cache_with(0, 10);
        cache.set("h1", "d1");
        // TTL of zero expires immediately
        assert!(cache.get("h1").is_none());
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let mut cache = cache_with(0, 10);
        cache.set("h1", "d1");
        cache.set("h2", "d2");

        let swept = cache.sweep();
        assert_eq!(swept, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn overwrite_refreshes_entry() {
        let mut cache = cache_with(60, 10);
        cache.set("h1", "old");
        cache.set("h1", "new");

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("h1").unwrap().description, "new");
    }
}
