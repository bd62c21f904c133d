//! Index write inputs and the keys used to deduplicate them.
//!
//! An [`IndexInput`] is the logical fact ("trace T was seen under partition
//! key P at time t"). The factory turns it into a [`WriteCandidate`], which
//! carries everything the store needs, and derives an [`IndexDedupKey`] that
//! decides redundancy.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use super::error::{IndexError, IndexResult};

const MICROS_PER_MILLI: u64 = 1_000;

/// Truncate a microsecond timestamp to millisecond precision.
///
/// Index rows store milliseconds, so anything finer is lost at the store.
pub fn truncate_to_millis(ts_micros: u64) -> u64 {
    ts_micros - ts_micros % MICROS_PER_MILLI
}

/// Serialize a microsecond timestamp as the store's 8-byte big-endian
/// millisecond `timestamp` value.
pub fn serialize_timestamp(ts_micros: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(ts_micros / MICROS_PER_MILLI);
    buf.freeze()
}

/// A logical index fact, before bucketing or validation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexInput {
    /// Ends up as the partition key, ignoring bucketing.
    pub partition_key: String,
    /// Epoch microseconds.
    pub ts_micros: u64,
    /// Lower 64 bits of the trace id; the clustering key.
    pub trace_id: u64,
}

impl IndexInput {
    pub fn new(partition_key: impl Into<String>, ts_micros: u64, trace_id: u64) -> Self {
        Self {
            partition_key: partition_key.into(),
            ts_micros,
            trace_id,
        }
    }
}

/// One fully formed index row, ready to bind.
///
/// Immutable once constructed; [`WriteCandidate::new`] rejects anything the
/// store would reject, so failures surface before any I/O.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteCandidate {
    partition_key: String,
    bucket: Option<u32>,
    trace_id: u64,
    ts_micros: u64,
    row_ttl: Option<u32>,
}

impl WriteCandidate {
    /// Validate and build a candidate.
    ///
    /// # Arguments
    ///
    /// * `input` - The logical fact
    /// * `bucket` - `Some(bucket)` for bucketed index tables
    /// * `bucket_count` - Bucket count the bucket must fall under
    /// * `row_ttl` - Row time-to-live in seconds, `None` for no expiry
    pub fn new(
        input: IndexInput,
        bucket: Option<u32>,
        bucket_count: u32,
        row_ttl: Option<u32>,
    ) -> IndexResult<Self> {
        if input.partition_key.is_empty() {
            return Err(IndexError::invalid_candidate("partition key is empty"));
        }
        if let Some(bucket) = bucket {
            if bucket >= bucket_count {
                return Err(IndexError::invalid_candidate(format!(
                    "bucket {} out of range [0, {})",
                    bucket, bucket_count
                )));
            }
        }
        let ts_micros = truncate_to_millis(input.ts_micros);
        if ts_micros == 0 {
            return Err(IndexError::invalid_candidate(format!(
                "timestamp {}us is before the first representable millisecond",
                input.ts_micros
            )));
        }
        if row_ttl == Some(0) {
            return Err(IndexError::invalid_candidate(
                "row ttl of 0 must be expressed as no ttl",
            ));
        }

        Ok(Self {
            partition_key: input.partition_key,
            bucket,
            trace_id: input.trace_id,
            ts_micros,
            row_ttl,
        })
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn bucket(&self) -> Option<u32> {
        self.bucket
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Epoch microseconds at millisecond precision.
    pub fn ts_micros(&self) -> u64 {
        self.ts_micros
    }

    pub fn row_ttl(&self) -> Option<u32> {
        self.row_ttl
    }

    /// Key deciding whether this row is redundant.
    pub fn dedup_key(&self) -> IndexDedupKey {
        IndexDedupKey {
            partition_key: self.partition_key.clone(),
            trace_id: self.trace_id,
            ts_millis: self.ts_micros / MICROS_PER_MILLI,
        }
    }
}

impl fmt::Display for WriteCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "partition_key={}, ts={}, trace_id={:016x}",
            self.partition_key, self.ts_micros, self.trace_id
        )
    }
}

/// Identity of an index row for redundancy checks.
///
/// Two candidates with equal keys produce the same physical row: the bucket
/// is derived from the partition key and trace id, and the store cannot
/// tell timestamps apart below one millisecond. The trace id stays in the
/// key because a row for a different trace is what a reader is looking for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexDedupKey {
    pub partition_key: String,
    pub trace_id: u64,
    pub ts_millis: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_precision() {
        assert_eq!(truncate_to_millis(1_500_000_123_456), 1_500_000_123_000);
        assert_eq!(
            serialize_timestamp(1_500_000_123_456).as_ref(),
            &1_500_000_123u64.to_be_bytes()
        );
    }

    #[test]
    fn test_candidate_validation() {
        let ok = WriteCandidate::new(
            IndexInput::new("frontend", 1_500_000_123_456, 7),
            /*bucket=*/ Some(9),
            /*bucket_count=*/ 10,
            /*row_ttl=*/ Some(259_200),
        )
        .unwrap();
        assert_eq!(ok.ts_micros(), 1_500_000_123_000);
        assert_eq!(ok.bucket(), Some(9));

        let empty_key = WriteCandidate::new(IndexInput::new("", 1_000, 7), None, 10, None);
        assert!(matches!(empty_key, Err(IndexError::InvalidCandidate { .. })));

        let bad_bucket =
            WriteCandidate::new(IndexInput::new("frontend", 1_000, 7), Some(10), 10, None);
        assert!(matches!(bad_bucket, Err(IndexError::InvalidCandidate { .. })));

        let sub_milli = WriteCandidate::new(IndexInput::new("frontend", 999, 7), None, 10, None);
        assert!(matches!(sub_milli, Err(IndexError::InvalidCandidate { .. })));
    }

    #[test]
    fn test_dedup_key_ignores_sub_millisecond_detail() {
        let first = WriteCandidate::new(IndexInput::new("frontend", 1_000_001, 7), None, 10, None)
            .unwrap();
        let second =
            WriteCandidate::new(IndexInput::new("frontend", 1_000_999, 7), None, 10, None)
                .unwrap();
        let other_trace =
            WriteCandidate::new(IndexInput::new("frontend", 1_000_001, 8), None, 10, None)
                .unwrap();

        assert_eq!(first.dedup_key(), second.dedup_key());
        assert_ne!(first.dedup_key(), other_trace.dedup_key());
    }
}
