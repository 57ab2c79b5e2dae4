//! TTL-bounded result cache keyed by (term, timeframe, geo, locale).
//!
//! Staleness is checked at read time only. Expired entries stay in the map
//! until the same key is written again; a read of an expired entry behaves
//! exactly like a miss.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::constants::DEFAULT_CACHE_TTL_SECS;
use crate::score::ScoreResult;
use crate::timeframe::Timeframe;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub term: String,
    pub timeframe: Timeframe,
    pub geo: String,
    pub locale: String,
}

impl CacheKey {
    pub fn new(term: &str, timeframe: Timeframe, geo: &str, locale: &str) -> Self {
        Self {
            term: term.to_string(),
            timeframe,
            geo: geo.to_string(),
            locale: locale.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub result: ScoreResult,
    pub cached_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.cached_at) < ttl
    }
}

pub struct CacheStore {
    entries: HashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }
}

impl CacheStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. Expired entries are reported as absent.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh_at(now, self.ttl))
    }

    pub fn put(&mut self, key: CacheKey, result: ScoreResult) {
        self.put_at(key, result, Instant::now());
    }

    pub fn put_at(&mut self, key: CacheKey, result: ScoreResult, cached_at: Instant) {
        let entry = CacheEntry {
            key: key.clone(),
            result,
            cached_at,
        };
        self.entries.insert(key, entry);
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
