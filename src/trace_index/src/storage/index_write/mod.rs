//! # Deduplicated Index Writes
//!
//! This module decides which secondary index rows are worth writing.
//!
//! ## Overview
//!
//! Every span of a trace re-asserts the same facts: "trace T involves
//! service S", "trace T carries annotation A", each with a slightly
//! different timestamp. Writing all of them floods the index tables with
//! rows no query can tell apart. This module suppresses those writes:
//!
//! 1. **Bucketer**: spreads bucketed tables over [`BUCKET_COUNT`] partitions
//! 2. **DedupCache**: remembers permitted writes for one window
//! 3. **IndexWrite**: binds and sends one permitted row
//! 4. **TraceIdIndexer**: reduces one event's rows to those that move a bound
//! 5. **IndexWriteFactory**: owns all of the above for one table
//!
//! ## Architecture
//!
//! ```text
//! IndexInput ("frontend", ts, trace_id)
//!      │
//!      ▼
//! ┌──────────────────────┐   bucket_for()   ┌──────────┐
//! │  IndexWriteFactory   │─────────────────▶│ Bucketer │
//! └──────────┬───────────┘                  └──────────┘
//!            │ should_write(dedup_key)
//!            ▼
//! ┌──────────────────────┐
//! │      DedupCache      │── false ──▶ IndexWrite (Suppressed, no I/O)
//! └──────────┬───────────┘
//!            │ true
//!            ▼
//!      IndexWrite ──issue()──▶ IndexStore::execute ──▶ Written / StoreError
//! ```
//!
//! ## Why Suppression Is Safe
//!
//! Within one dedup window, a query whose lookback does not exceed the
//! window cannot distinguish "one row since t₀" from "that row plus a
//! near-duplicate at t₀+δ". Deployments must keep
//! `lookback ≤ index_cache_ttl_secs`; see [`IndexWriteConfig::check_lookback`].
//! Losing a cache entry early only costs an extra write.
//!
//! ## Retries
//!
//! Nothing here retries. A failed [`IndexWrite`] is cloned and re-issued by
//! the caller; the clone keeps the original dedup decision.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let factory = IndexWriteFactory::new(
//!     IndexKind::Annotation,
//!     IndexWriteConfig::default(),
//!     store,
//! )
//! .await?;
//!
//! let summary = factory
//!     .new_indexer()
//!     .write(vec![
//!         IndexInput::new(IndexKind::annotation_key("frontend", "error", None), ts, trace_id),
//!         IndexInput::new(IndexKind::annotation_key("frontend", "http.path", Some("/")), ts, trace_id),
//!     ])
//!     .await?;
//! ```

mod bucketer;
mod cache;
mod candidate;
mod clock;
mod config;
mod error;
mod factory;
mod indexer;
mod kind;
mod store;
mod write_task;

pub use bucketer::{bucket, splitmix64, Bucketer, BUCKET_COUNT};
pub use cache::{DedupCache, DedupStats};
pub use candidate::{
    serialize_timestamp, truncate_to_millis, IndexDedupKey, IndexInput, WriteCandidate,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::IndexWriteConfig;
pub use error::{IndexError, IndexResult, StoreError, StoreResult};
pub use factory::IndexWriteFactory;
pub use indexer::{IndexSummary, TimestampBounds, TraceIdIndexer};
pub use kind::IndexKind;
pub use store::{BoundWrite, IndexStore, PreparedWrite, WriteTemplate};
pub use write_task::{IndexWrite, WriteOutcome};

#[cfg(test)]
pub(crate) mod mock_store;
