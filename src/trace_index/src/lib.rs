//! Write-side index maintenance for trace storage.
//!
//! See [`storage::index_write`] for the deduplicating index write path.

pub mod storage;

pub use storage::index_write::{
    Bucketer, DedupCache, DedupStats, IndexError, IndexInput, IndexKind, IndexResult,
    IndexStore, IndexSummary, IndexWrite, IndexWriteConfig, IndexWriteFactory, StoreError,
    TraceIdIndexer, WriteOutcome, BUCKET_COUNT,
};
