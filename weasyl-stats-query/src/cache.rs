//! Per-query result cache with lazy expiration
//!
//! Entries are never evicted. A stale entry stays in the map until the next
//! successful run of its producer replaces it; freshness is decided when a
//! request reads it.
//!
//! There is no request coalescing: two concurrent misses for the same name
//! both run the producer and both write, the later write wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::trace;
use weasyl_stats_core::Row;

/// Results are served from cache for a day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// A cached result set and the moment it was produced
#[derive(Debug)]
pub struct CacheEntry {
    pub timestamp: Instant,
    pub value: Vec<Row>,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        is_fresh(self, ttl, now)
    }
}

/// `true` while `entry.timestamp + ttl` lies strictly after `now`
pub fn is_fresh(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
    entry.timestamp + ttl > now
}

/// Result store keyed by query name.
///
/// Entries are immutable once written and shared behind `Arc`, so replacing
/// one is a single map insert and readers always see a timestamp together
/// with the rows it belongs to.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CacheEntry>> {
        self.entries.read().get(name).cloned()
    }

    /// Store `rows` for `name` stamped with the current time.
    pub fn put(&self, name: &str, rows: Vec<Row>) {
        self.put_at(name, rows, Instant::now());
    }

    /// Store `rows` for `name` with an explicit timestamp, replacing any
    /// previous entry.
    pub fn put_at(&self, name: &str, rows: Vec<Row>, timestamp: Instant) {
        let entry = Arc::new(CacheEntry {
            timestamp,
            value: rows,
        });
        trace!("Caching {} rows for {}", entry.value.len(), name);
        self.entries.write().insert(name.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
