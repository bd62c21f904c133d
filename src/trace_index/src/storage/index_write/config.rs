//! Configuration for index write deduplication.
//!
//! ## Parameters
//!
//! ### `bucket_count`
//!
//! Buckets per bucketed index table. Shared by every writer and reader; see
//! [`BUCKET_COUNT`](super::bucketer::BUCKET_COUNT).
//!
//! ### `index_cache_ttl_secs`
//!
//! How long a permitted index write suppresses equivalent writes. Queries
//! must not look back further than this, otherwise a suppressed row could
//! have been the one that made a trace visible:
//!
//! ```text
//! lookback ≤ index_cache_ttl_secs
//! ```
//!
//! ### `index_cache_max`
//!
//! Upper bound on remembered writes per table. Past it, the oldest entry is
//! forgotten and its next write goes through again.
//!
//! ### `index_ttl_secs`
//!
//! Row time-to-live applied by the store. `0` keeps rows forever.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let config = IndexWriteConfig::builder()
//!     .index_cache_ttl_secs(60)
//!     .index_cache_max(500_000)
//!     .build();
//! config.validate()?;
//!
//! let config = IndexWriteConfig::from_json(r#"{"index_ttl_secs": 0}"#)?;
//! assert_eq!(config.row_ttl(), None);
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use typed_builder::TypedBuilder;

use super::bucketer::BUCKET_COUNT;
use super::error::{IndexError, IndexResult};

/// Per-table configuration for index writes.
#[derive(Clone, Debug, PartialEq, Eq, TypedBuilder, Deserialize, Serialize)]
pub struct IndexWriteConfig {
    /// Buckets per bucketed index table.
    #[builder(default = IndexWriteConfig::DEFAULT_BUCKET_COUNT)]
    #[serde(default = "IndexWriteConfig::default_bucket_count")]
    pub bucket_count: u32,

    /// Dedup window in seconds.
    #[builder(default = IndexWriteConfig::DEFAULT_INDEX_CACHE_TTL_SECS)]
    #[serde(default = "IndexWriteConfig::default_index_cache_ttl_secs")]
    pub index_cache_ttl_secs: u64,

    /// Maximum remembered writes.
    #[builder(default = IndexWriteConfig::DEFAULT_INDEX_CACHE_MAX)]
    #[serde(default = "IndexWriteConfig::default_index_cache_max")]
    pub index_cache_max: usize,

    /// Row time-to-live in seconds, `0` for none.
    #[builder(default = IndexWriteConfig::DEFAULT_INDEX_TTL_SECS)]
    #[serde(default = "IndexWriteConfig::default_index_ttl_secs")]
    pub index_ttl_secs: u32,
}

impl IndexWriteConfig {
    pub const DEFAULT_BUCKET_COUNT: u32 = BUCKET_COUNT;

    /// One minute.
    pub const DEFAULT_INDEX_CACHE_TTL_SECS: u64 = 60;

    pub const DEFAULT_INDEX_CACHE_MAX: usize = 100_000;

    /// Three days.
    pub const DEFAULT_INDEX_TTL_SECS: u32 = 3 * 24 * 60 * 60;

    pub fn default_bucket_count() -> u32 {
        Self::DEFAULT_BUCKET_COUNT
    }

    pub fn default_index_cache_ttl_secs() -> u64 {
        Self::DEFAULT_INDEX_CACHE_TTL_SECS
    }

    pub fn default_index_cache_max() -> usize {
        Self::DEFAULT_INDEX_CACHE_MAX
    }

    pub fn default_index_ttl_secs() -> u32 {
        Self::DEFAULT_INDEX_TTL_SECS
    }

    /// Parse from JSON, filling in defaults and validating.
    pub fn from_json(json: &str) -> IndexResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that values are usable.
    pub fn validate(&self) -> IndexResult<()> {
        if self.bucket_count == 0 {
            return Err(IndexError::invalid_config("bucket_count must be positive"));
        }
        if self.bucket_count != BUCKET_COUNT {
            // Allowed, but only sound if every reader was rolled out with it.
            warn!(
                bucket_count = self.bucket_count,
                expected = BUCKET_COUNT,
                "bucket count differs from the network-wide default"
            );
        }
        if self.index_cache_ttl_secs == 0 {
            return Err(IndexError::invalid_config(
                "index_cache_ttl_secs must be positive",
            ));
        }
        if self.index_cache_max == 0 {
            return Err(IndexError::invalid_config("index_cache_max must be positive"));
        }
        Ok(())
    }

    /// Dedup window.
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.index_cache_ttl_secs)
    }

    /// Capacity of the dedup cache.
    pub fn dedup_max_size(&self) -> IndexResult<NonZeroUsize> {
        NonZeroUsize::new(self.index_cache_max)
            .ok_or_else(|| IndexError::invalid_config("index_cache_max must be positive"))
    }

    /// Row TTL, `None` when rows never expire.
    pub fn row_ttl(&self) -> Option<u32> {
        (self.index_ttl_secs > 0).then_some(self.index_ttl_secs)
    }

    /// Whether queries with this lookback can rely on suppressed writes.
    ///
    /// Not enforced; wiring code calls this once at startup.
    pub fn check_lookback(&self, lookback: Duration) -> bool {
        let ok = lookback <= self.dedup_ttl();
        if !ok {
            warn!(
                lookback_secs = lookback.as_secs(),
                index_cache_ttl_secs = self.index_cache_ttl_secs,
                "query lookback exceeds the index dedup window"
            );
        }
        ok
    }
}

impl Default for IndexWriteConfig {
    fn default() -> Self {
        Self {
            bucket_count: Self::DEFAULT_BUCKET_COUNT,
            index_cache_ttl_secs: Self::DEFAULT_INDEX_CACHE_TTL_SECS,
            index_cache_max: Self::DEFAULT_INDEX_CACHE_MAX,
            index_ttl_secs: Self::DEFAULT_INDEX_TTL_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexWriteConfig::default();
        assert_eq!(config, IndexWriteConfig::builder().build());
        assert_eq!(config.bucket_count, 10);
        assert_eq!(config.dedup_ttl(), Duration::from_secs(60));
        assert_eq!(config.row_ttl(), Some(259_200));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = IndexWriteConfig::from_json(r#"{"index_ttl_secs": 0}"#).unwrap();
        assert_eq!(config.row_ttl(), None);
        assert_eq!(config.index_cache_max, IndexWriteConfig::DEFAULT_INDEX_CACHE_MAX);

        let err = IndexWriteConfig::from_json(r#"{"index_cache_max": "lots"}"#);
        assert!(matches!(err, Err(IndexError::Serialization(_))));
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let zero_buckets = IndexWriteConfig::builder().bucket_count(0).build();
        assert!(matches!(
            zero_buckets.validate(),
            Err(IndexError::InvalidConfig { .. })
        ));

        let zero_ttl = IndexWriteConfig::builder().index_cache_ttl_secs(0).build();
        assert!(zero_ttl.validate().is_err());

        let zero_max = IndexWriteConfig::builder().index_cache_max(0).build();
        assert!(zero_max.validate().is_err());
        assert!(zero_max.dedup_max_size().is_err());
    }

    #[test]
    fn test_check_lookback() {
        let config = IndexWriteConfig::builder().index_cache_ttl_secs(60).build();
        assert!(config.check_lookback(Duration::from_secs(60)));
        assert!(!config.check_lookback(Duration::from_secs(3600)));
    }
}
