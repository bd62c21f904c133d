//! Synthetic partition buckets.
//!
//! Writes to `service_name_index` and `annotations_index` are spread over a
//! fixed number of buckets so a popular service does not become one hot
//! partition. Readers fan out over every bucket, which is why the bucket
//! count is a network-wide constant: a writer using a different count
//! produces rows that some readers never look at.
//!
//! ```text
//! partition_key="frontend", trace_id=0x5af7...
//!   ↓ fnv1a64(partition_key) ^ splitmix64(trace_id)
//!   ↓ splitmix64
//!   ↓ % BUCKET_COUNT
//! bucket 7 → row in partition ("frontend", 7)
//! ```
//!
//! The hash is a pure function of the input bytes, with no per-process seed,
//! so every writer instance and every restart agrees on placement.

use std::num::NonZeroU32;
use std::ops::Range;

use super::error::{IndexError, IndexResult};

/// Buckets per bucketed index. Must match every reader and writer.
pub const BUCKET_COUNT: u32 = 10;

const DEFAULT_BUCKET_COUNT: NonZeroU32 = match NonZeroU32::new(BUCKET_COUNT) {
    Some(count) => count,
    None => panic!("BUCKET_COUNT must be nonzero"),
};

/// SplitMix64 finalizer, used to scatter already-hashed values.
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// 64-bit FNV-1a over raw bytes.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

/// Map `key` to a bucket in `[0, bucket_count)`.
pub fn bucket(key: &str, bucket_count: NonZeroU32) -> u32 {
    reduce(splitmix64(fnv1a64(key.as_bytes())), bucket_count)
}

fn reduce(hash: u64, bucket_count: NonZeroU32) -> u32 {
    (hash % u64::from(bucket_count.get())) as u32
}

/// Stateless bucket assignment for one bucket count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bucketer {
    bucket_count: NonZeroU32,
}

impl Bucketer {
    pub fn new(bucket_count: u32) -> IndexResult<Self> {
        let bucket_count = NonZeroU32::new(bucket_count)
            .ok_or_else(|| IndexError::invalid_config("bucket count must be positive"))?;
        Ok(Self { bucket_count })
    }

    pub fn bucket_count(&self) -> u32 {
        self.bucket_count.get()
    }

    /// Bucket for a bare key.
    pub fn bucket(&self, key: &str) -> u32 {
        bucket(key, self.bucket_count)
    }

    /// Bucket for one trace under a partition key.
    ///
    /// Mixing in the trace id spreads a single partition key over every
    /// bucket, while each trace keeps a fixed bucket so retries and
    /// duplicate spans land on the same physical row.
    pub fn bucket_for(&self, partition_key: &str, trace_id: u64) -> u32 {
        let mixed = fnv1a64(partition_key.as_bytes()) ^ splitmix64(trace_id);
        reduce(splitmix64(mixed), self.bucket_count)
    }

    /// Every bucket a reader must scan.
    pub fn buckets(&self) -> Range<u32> {
        0..self.bucket_count.get()
    }
}

impl Default for Bucketer {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
        }
    }
}
