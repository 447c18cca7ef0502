//! Time-bounded result cache with LRU block eviction.
//!
//! Adapters consult this before any outbound request and populate it after
//! success. Values are the adapters' parsed payloads as JSON. Expiry is
//! lazy: stale entries are dropped on lookup or swept during eviction.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

/// TTL for RSS feed responses.
pub const TTL_RSS: Duration = Duration::from_secs(3 * 3600);
/// TTL for government portal pages.
pub const TTL_GOVERNMENT: Duration = Duration::from_secs(6 * 3600);
/// TTL for company career pages.
pub const TTL_COMPANY: Duration = Duration::from_secs(12 * 3600);
/// TTL for normalization-stable derived values.
pub const TTL_DERIVED: Duration = Duration::from_secs(30 * 60);

/// Fraction of entries evicted in one block when the soft bound is hit.
const EVICT_FRACTION: f64 = 0.10;

struct Entry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
    last_used_seq: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    seq: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct ResultCache {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl ResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                seq: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Fresh value for `key`, or miss. A hit refreshes the LRU position.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.seq += 1;
        let seq = inner.seq;

        enum Lookup {
            Hit(Value),
            Stale,
            Absent,
        }

        let outcome = match inner.entries.get_mut(key) {
            Some(entry) if entry.inserted_at.elapsed() < entry.ttl => {
                entry.last_used_seq = seq;
                Lookup::Hit(entry.value.clone())
            }
            Some(_) => Lookup::Stale,
            None => Lookup::Absent,
        };

        match outcome {
            Lookup::Hit(value) => {
                inner.hits += 1;
                Some(value)
            }
            Lookup::Stale => {
                inner.entries.remove(key);
                inner.misses += 1;
                None
            }
            Lookup::Absent => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, key: &str, value: Value, ttl: Duration) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.seq += 1;
        let seq = inner.seq;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl,
                last_used_seq: seq,
            },
        );

        if inner.entries.len() > self.max_entries {
            Self::evict_lru_block(&mut inner, self.max_entries);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Evict stale entries first, then the least-recently-used 10% block.
    fn evict_lru_block(inner: &mut Inner, max_entries: usize) {
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| entry.inserted_at.elapsed() < entry.ttl);

        if inner.entries.len() > max_entries {
            let evict_count = ((max_entries as f64 * EVICT_FRACTION).ceil() as usize).max(1);
            let mut by_use: Vec<(String, u64)> = inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), e.last_used_seq))
                .collect();
            by_use.sort_by_key(|(_, seq)| *seq);
            for (key, _) in by_use.into_iter().take(evict_count) {
                inner.entries.remove(&key);
            }
        }

        debug!(
            before,
            after = inner.entries.len(),
            "Cache eviction pass"
        );
    }
}
