//! Time- and capacity-bounded dedup cache.
//!
//! [`DedupCache`] answers "has an equivalent write been permitted recently?"
//! for index writes. A key is permitted at most once per TTL window; a
//! suppressed attempt never extends the window.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ entries: DashMap<K, permitted_at>            │ ← sharded, read on every call
//! ├──────────────────────────────────────────────┤
//! │ insertion_order: Mutex<LruCache<K, ()>>      │ ← only taken on the permit path
//! │   oldest ... newest                          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A fresh entry is detected from its shard alone, so callers racing on
//! distinct keys do not contend. Every mutation (insert, refresh, evict,
//! purge) happens while holding the insertion-order lock, which keeps the
//! two structures in agreement and gives at most one permit per key per
//! window.
//!
//! ## Eviction
//!
//! - **Capacity**: inserting past `max_size` evicts the least recently
//!   inserted key. Losing a key early only causes one extra write.
//! - **TTL**: expired entries are never honored and are purged from the
//!   oldest end whenever the permit path runs.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;

use super::clock::{saturating_nanos, Clock};

/// Counters describing what the cache decided.
///
/// This is the only place a suppressed write is observable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Calls that returned `true`.
    pub permitted: u64,
    /// Calls that returned `false`.
    pub suppressed: u64,
    /// Entries dropped to stay within capacity.
    pub evicted: u64,
    /// Entries dropped because their window elapsed.
    pub expired: u64,
    /// Entries currently resident.
    pub entries: usize,
}

#[derive(Debug, Default)]
struct DedupCounters {
    permitted: AtomicU64,
    suppressed: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

/// A bounded map from dedup key to the instant its last write was permitted.
///
/// # Example
///
/// ```rust,ignore
/// let cache = DedupCache::new(
///     Duration::from_secs(60),
///     NonZeroUsize::new(100_000).unwrap(),
///     Arc::new(MonotonicClock::new()),
/// );
///
/// assert!(cache.should_write(&key));  // first sighting: write it
/// assert!(!cache.should_write(&key)); // within 60s: redundant
/// ```
pub struct DedupCache<K>
where
    K: Eq + Hash + Clone,
{
    entries: DashMap<K, u64>,
    insertion_order: Mutex<LruCache<K, ()>>,
    ttl_nanos: u64,
    max_size: NonZeroUsize,
    clock: Arc<dyn Clock>,
    counters: DedupCounters,
}

impl<K> DedupCache<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache.
    pub fn new(ttl: Duration, max_size: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(LruCache::new(max_size)),
            ttl_nanos: saturating_nanos(ttl),
            max_size,
            clock,
            counters: DedupCounters::default(),
        }
    }

    /// Decide whether a write for `key` is necessary, recording it if so.
    ///
    /// Returns `true` when `key` is absent or its window has elapsed. Returns
    /// `false` otherwise and leaves the recorded instant untouched.
    pub fn should_write(&self, key: &K) -> bool {
        let now = self.clock.now_nanos();

        // The shard guard must be released before taking the order lock.
        let recorded = self.entries.get(key).map(|entry| *entry.value());
        if let Some(recorded) = recorded {
            if !self.is_expired(recorded, now) {
                self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        let mut order = self.insertion_order.lock();
        let permitted = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.is_expired(*occupied.get(), now) {
                    occupied.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        };
        if !permitted {
            // Lost the race to a concurrent caller for the same key.
            self.counters.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // A refreshed key moves to the newest end.
        order.pop(key);
        if let Some((evicted, ())) = order.push(key.clone(), ()) {
            self.entries.remove(&evicted);
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
        }
        self.purge_expired(&mut order, now);

        self.counters.permitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Forget `key`, so the next [`should_write`](Self::should_write) permits it.
    ///
    /// Used when a permitted write failed and the fact still needs indexing.
    pub fn invalidate(&self, key: &K) {
        let mut order = self.insertion_order.lock();
        order.pop(key);
        self.entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut order = self.insertion_order.lock();
        order.clear();
        self.entries.clear();
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let mut order = self.insertion_order.lock();
        self.purge_expired(&mut order, self.clock.now_nanos());
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently suppresses writes.
    pub fn contains(&self, key: &K) -> bool {
        let now = self.clock.now_nanos();
        self.entries
            .get(key)
            .map(|entry| !self.is_expired(*entry.value(), now))
            .unwrap_or(false)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_nanos(self.ttl_nanos)
    }

    pub fn max_size(&self) -> usize {
        self.max_size.get()
    }

    /// Snapshot of the decision counters.
    pub fn stats(&self) -> DedupStats {
        DedupStats {
            permitted: self.counters.permitted.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn is_expired(&self, recorded: u64, now: u64) -> bool {
        now.saturating_sub(recorded) >= self.ttl_nanos
    }

    /// Drop expired entries from the oldest end. Caller holds the order lock.
    fn purge_expired(&self, order: &mut LruCache<K, ()>, now: u64) {
        while let Some((oldest, _)) = order.peek_lru() {
            let expired = self
                .entries
                .get(oldest)
                .map(|entry| self.is_expired(*entry.value(), now))
                .unwrap_or(true);
            if !expired {
                break;
            }
            if let Some((oldest, ())) = order.pop_lru() {
                self.entries.remove(&oldest);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl<K> std::fmt::Debug for DedupCache<K>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("ttl_nanos", &self.ttl_nanos)
            .field("max_size", &self.max_size)
            .field("entries", &self.entries.len())
            .finish()
    }
}
