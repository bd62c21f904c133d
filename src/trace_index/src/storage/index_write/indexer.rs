//! Multi-row indexing for one logical event.
//!
//! A span fans out into several index rows, and a trace's spans repeat the
//! same `(partition_key, trace_id)` pair with different timestamps. For a
//! time-range query only the earliest and latest timestamp of a pair matter:
//! a row between them cannot make the trace appear in a window where it was
//! not already visible.
//!
//! ```text
//! indexed bounds for ("frontend", T):   [t=100 ............ t=400]
//! incoming rows:               t=50   t=200   t=300          t=500
//!                               ↑ write  ↑ skip  ↑ skip        ↑ write
//! new bounds:                  [t=50 ............................ t=500]
//! ```
//!
//! Bounds are shared by every indexer from one factory and expire with the
//! same window as the dedup cache, so a pair's endpoints are re-asserted at
//! least once per window.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::candidate::{IndexInput, WriteCandidate};
use super::clock::{saturating_nanos, Clock};
use super::error::{IndexError, IndexResult};
use super::factory::FactoryShared;
use super::write_task::{IndexWrite, WriteOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BoundsKey {
    partition_key: String,
    trace_id: u64,
}

impl BoundsKey {
    fn of(candidate: &WriteCandidate) -> Self {
        Self {
            partition_key: candidate.partition_key().to_string(),
            trace_id: candidate.trace_id(),
        }
    }
}

/// Earliest and latest indexed timestamp, in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimestampBounds {
    pub first: u64,
    pub last: u64,
}

impl TimestampBounds {
    fn contains(&self, ts: u64) -> bool {
        self.first <= ts && ts <= self.last
    }
}

#[derive(Clone, Copy, Debug)]
struct RecordedBounds {
    bounds: TimestampBounds,
    recorded_at: u64,
}

/// Timestamp bounds already written per `(partition_key, trace_id)`.
pub(crate) struct IndexedBounds {
    bounds: Mutex<LruCache<BoundsKey, RecordedBounds>>,
    ttl_nanos: u64,
    clock: Arc<dyn Clock>,
}

impl IndexedBounds {
    pub(crate) fn new(ttl: Duration, max_size: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            bounds: Mutex::new(LruCache::new(max_size)),
            ttl_nanos: saturating_nanos(ttl),
            clock,
        }
    }

    /// Return which of `event`'s endpoints widen the indexed bounds, and
    /// record the widened bounds.
    fn widen(&self, key: &BoundsKey, event: TimestampBounds) -> Vec<u64> {
        let now = self.clock.now_nanos();
        let mut bounds = self.bounds.lock();
        let current = bounds
            .peek(key)
            .filter(|recorded| now.saturating_sub(recorded.recorded_at) < self.ttl_nanos)
            .map(|recorded| recorded.bounds);

        let mut endpoints = vec![event.first];
        if event.last != event.first {
            endpoints.push(event.last);
        }
        let widened = match current {
            None => event,
            Some(current) => {
                endpoints.retain(|ts| !current.contains(*ts));
                if endpoints.is_empty() {
                    return endpoints;
                }
                TimestampBounds {
                    first: current.first.min(event.first),
                    last: current.last.max(event.last),
                }
            }
        };
        bounds.put(
            key.clone(),
            RecordedBounds {
                bounds: widened,
                recorded_at: now,
            },
        );
        endpoints
    }

    fn forget(&self, key: &BoundsKey) {
        self.bounds.lock().pop(key);
    }

    pub(crate) fn clear(&self) {
        self.bounds.lock().clear();
    }

    fn get(&self, key: &BoundsKey) -> Option<TimestampBounds> {
        let now = self.clock.now_nanos();
        self.bounds
            .lock()
            .peek(key)
            .filter(|recorded| now.saturating_sub(recorded.recorded_at) < self.ttl_nanos)
            .map(|recorded| recorded.bounds)
    }
}

/// Totals from writing one event's rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    /// Rows sent to and acknowledged by the store.
    pub written: usize,
    /// Rows the dedup cache held back.
    pub suppressed: usize,
    /// Rows inside already-indexed bounds, never turned into tasks.
    pub skipped: usize,
}

/// Turns one event's index inputs into the minimal set of write tasks.
///
/// # Example
///
/// ```rust,ignore
/// let indexer = factory.new_indexer();
/// let summary = indexer
///     .write(span.annotations().map(|a| IndexInput::new(a.key(), a.ts(), trace_id)))
///     .await?;
/// ```
#[derive(Clone)]
pub struct TraceIdIndexer {
    shared: Arc<FactoryShared>,
}

impl TraceIdIndexer {
    pub(crate) fn new(shared: Arc<FactoryShared>) -> Self {
        Self { shared }
    }

    /// Build tasks for the rows of one event.
    ///
    /// Inputs are validated before any shared state changes. Rows sharing a
    /// `(partition_key, trace_id)` collapse to their earliest and latest
    /// timestamps, and endpoints inside already-indexed bounds are dropped.
    /// Each remaining row passes through the factory's dedup cache
    /// independently.
    pub fn index(
        &self,
        inputs: impl IntoIterator<Item = IndexInput>,
    ) -> IndexResult<Vec<IndexWrite>> {
        let mut grouped: BTreeMap<BoundsKey, (WriteCandidate, WriteCandidate)> = BTreeMap::new();
        for input in inputs {
            let candidate = self.shared.candidate(input)?;
            match grouped.get_mut(&BoundsKey::of(&candidate)) {
                Some((first, last)) => {
                    if candidate.ts_micros() < first.ts_micros() {
                        *first = candidate;
                    } else if candidate.ts_micros() > last.ts_micros() {
                        *last = candidate;
                    }
                }
                None => {
                    grouped.insert(BoundsKey::of(&candidate), (candidate.clone(), candidate));
                }
            }
        }

        let mut tasks = Vec::with_capacity(grouped.len() * 2);
        for (key, (first, last)) in grouped {
            let event = TimestampBounds {
                first: first.ts_micros(),
                last: last.ts_micros(),
            };
            let endpoints = self.shared.bounds.widen(&key, event);
            if endpoints.is_empty() {
                debug!(
                    table = %self.shared.table,
                    partition_key = %key.partition_key,
                    trace_id = key.trace_id,
                    "rows fall inside indexed bounds"
                );
                continue;
            }
            for ts in endpoints {
                let candidate = if ts == first.ts_micros() {
                    first.clone()
                } else {
                    last.clone()
                };
                tasks.push(self.shared.task(candidate));
            }
        }
        Ok(tasks)
    }

    /// Index one event's rows and wait for every write.
    ///
    /// All writes run concurrently and all are awaited. If any failed, the
    /// first failure is returned and the failed pairs' bounds are forgotten
    /// so a later event re-indexes them.
    pub async fn write(
        &self,
        inputs: impl IntoIterator<Item = IndexInput>,
    ) -> IndexResult<IndexSummary> {
        let inputs: Vec<IndexInput> = inputs.into_iter().collect();
        let input_count = inputs.len();
        let tasks = self.index(inputs)?;

        let outcomes = join_all(tasks.iter().map(|task| task.issue())).await;

        let mut summary = IndexSummary {
            skipped: input_count - tasks.len(),
            ..IndexSummary::default()
        };
        let mut first_error: Option<IndexError> = None;
        for (task, outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Ok(WriteOutcome::Written) => summary.written += 1,
                Ok(WriteOutcome::Suppressed) => summary.suppressed += 1,
                Err(e) => {
                    self.shared.bounds.forget(&BoundsKey::of(task.candidate()));
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Indexed bounds for a pair, if still within the window.
    pub fn indexed_bounds(&self, partition_key: &str, trace_id: u64) -> Option<TimestampBounds> {
        self.shared.bounds.get(&BoundsKey {
            partition_key: partition_key.to_string(),
            trace_id,
        })
    }
}
