//! Per-table wiring for deduplicated index writes.
//!
//! One [`IndexWriteFactory`] exists per index table for the lifetime of the
//! storage handle. It owns the table's dedup cache, bucketer and prepared
//! statement, and hands out [`IndexWrite`] tasks and [`TraceIdIndexer`]s
//! that point back at that shared state.
//!
//! ```text
//! IndexWriteFactory (Arc<FactoryShared>)
//! ├─ config / bucketer
//! ├─ prepared: PreparedWrite          ← prepared once at construction
//! ├─ cache: DedupCache<IndexDedupKey> ← shared by every task and indexer
//! └─ bounds: IndexedBounds            ← shared by every indexer
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use super::bucketer::Bucketer;
use super::cache::{DedupCache, DedupStats};
use super::candidate::{IndexDedupKey, IndexInput, WriteCandidate};
use super::clock::{Clock, MonotonicClock};
use super::config::IndexWriteConfig;
use super::error::IndexResult;
use super::indexer::{IndexedBounds, TraceIdIndexer};
use super::kind::IndexKind;
use super::store::{IndexStore, PreparedWrite, WriteTemplate};
use super::write_task::IndexWrite;

/// State shared by a factory and everything it creates.
pub(crate) struct FactoryShared {
    pub(crate) kind: IndexKind,
    pub(crate) table: String,
    pub(crate) config: IndexWriteConfig,
    pub(crate) bucketer: Bucketer,
    pub(crate) store: Arc<dyn IndexStore>,
    pub(crate) prepared: PreparedWrite,
    pub(crate) cache: DedupCache<IndexDedupKey>,
    pub(crate) bounds: IndexedBounds,
}

impl FactoryShared {
    /// Validate an input and place it in its bucket.
    pub(crate) fn candidate(&self, input: IndexInput) -> IndexResult<WriteCandidate> {
        let bucket = self
            .kind
            .is_bucketed()
            .then(|| self.bucketer.bucket_for(&input.partition_key, input.trace_id));
        WriteCandidate::new(
            input,
            bucket,
            self.bucketer.bucket_count(),
            self.config.row_ttl(),
        )
    }

    /// Run a candidate through the dedup cache.
    pub(crate) fn task(self: &Arc<Self>, candidate: WriteCandidate) -> IndexWrite {
        let permitted = self.cache.should_write(&candidate.dedup_key());
        if !permitted {
            debug!(
                table = %self.table,
                candidate = %candidate,
                "suppressing redundant index write"
            );
        }
        IndexWrite::new(self.clone(), candidate, permitted)
    }
}

/// Creates deduplicated index writes for one table.
///
/// Cloning is cheap and every clone shares the same cache.
///
/// # Example
///
/// ```rust,ignore
/// let factory = IndexWriteFactory::new(
///     IndexKind::ServiceName,
///     IndexWriteConfig::default(),
///     session.clone(),
/// )
/// .await?;
///
/// let task = factory.new_write_task(IndexInput::new("frontend", ts, trace_id))?;
/// task.issue().await?;
/// ```
#[derive(Clone)]
pub struct IndexWriteFactory {
    shared: Arc<FactoryShared>,
}

impl IndexWriteFactory {
    /// Build a factory for `kind`'s default table.
    pub async fn new(
        kind: IndexKind,
        config: IndexWriteConfig,
        store: Arc<dyn IndexStore>,
    ) -> IndexResult<Self> {
        Self::with_clock(
            kind,
            kind.table(),
            config,
            store,
            Arc::new(MonotonicClock::new()),
        )
        .await
    }

    /// Build a factory with an explicit table name and time source.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store cannot prepare the
    /// insert statement.
    pub async fn with_clock(
        kind: IndexKind,
        table: impl Into<String>,
        config: IndexWriteConfig,
        store: Arc<dyn IndexStore>,
        clock: Arc<dyn Clock>,
    ) -> IndexResult<Self> {
        config.validate()?;
        let table = table.into();
        let bucketer = Bucketer::new(config.bucket_count)?;
        let max_size = config.dedup_max_size()?;

        let template = WriteTemplate::for_kind(kind, table.clone(), config.row_ttl());
        let prepared = store.prepare(template).await?;
        info!(
            table = %table,
            statement = %prepared.template.statement(),
            index_cache_ttl_secs = config.index_cache_ttl_secs,
            index_cache_max = config.index_cache_max,
            "prepared index writes"
        );

        let shared = FactoryShared {
            kind,
            cache: DedupCache::new(config.dedup_ttl(), max_size, clock.clone()),
            bounds: IndexedBounds::new(config.dedup_ttl(), max_size, clock),
            table,
            config,
            bucketer,
            store,
            prepared,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Create a task for one row, deciding now whether it is redundant.
    ///
    /// The returned task is a no-op when suppressed, so callers issue every
    /// task the same way.
    ///
    /// # Errors
    ///
    /// Fails fast on malformed input, before any I/O.
    pub fn new_write_task(&self, input: IndexInput) -> IndexResult<IndexWrite> {
        let candidate = self.shared.candidate(input)?;
        Ok(self.shared.task(candidate))
    }

    /// Create an indexer for events that produce several rows.
    pub fn new_indexer(&self) -> TraceIdIndexer {
        TraceIdIndexer::new(self.shared.clone())
    }

    /// Forget every remembered write.
    pub fn clear(&self) {
        self.shared.cache.clear();
        self.shared.bounds.clear();
        debug!(table = %self.shared.table, "cleared index write dedup state");
    }

    pub fn stats(&self) -> DedupStats {
        self.shared.cache.stats()
    }

    pub fn kind(&self) -> IndexKind {
        self.shared.kind
    }

    pub fn table(&self) -> &str {
        &self.shared.table
    }

    pub fn config(&self) -> &IndexWriteConfig {
        &self.shared.config
    }

    pub fn bucketer(&self) -> &Bucketer {
        &self.shared.bucketer
    }

    /// The prepared insert statement.
    pub fn prepared(&self) -> &PreparedWrite {
        &self.shared.prepared
    }
}

impl std::fmt::Debug for IndexWriteFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriteFactory")
            .field("kind", &self.shared.kind)
            .field("table", &self.shared.table)
            .field("config", &self.shared.config)
            .field("cache", &self.shared.cache)
            .finish()
    }
}
