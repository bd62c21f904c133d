//! The column store boundary.
//!
//! This module defines the [`IndexStore`] trait, the only thing the write
//! layer needs from the store: prepare a parameterized insert once, then
//! execute bound copies of it asynchronously.
//!
//! ```text
//! WriteTemplate ──prepare()──▶ PreparedWrite ──bind(candidate)──▶ BoundWrite ──execute()──▶ store
//!   (per table, once)            (shared, Arc)                      (per row)
//! ```

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use super::candidate::{serialize_timestamp, WriteCandidate};
use super::error::StoreResult;
use super::kind::IndexKind;

/// Shape of the insert statement for one index table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteTemplate {
    /// Target table.
    pub table: String,
    /// Partition key columns, then `ts`, then `trace_id`.
    pub columns: Vec<&'static str>,
    /// Row TTL in seconds, if rows expire.
    pub ttl: Option<u32>,
}

impl WriteTemplate {
    /// Template for an index kind.
    pub fn for_kind(kind: IndexKind, table: impl Into<String>, ttl: Option<u32>) -> Self {
        let mut columns = kind.partition_columns().to_vec();
        columns.extend(["ts", "trace_id"]);
        Self {
            table: table.into(),
            columns,
            ttl,
        }
    }

    /// Statement text with one bind marker per column.
    ///
    /// # Example
    ///
    /// ```text
    /// INSERT INTO service_name_index (service_name,bucket,ts,trace_id) VALUES (?,?,?,?) USING TTL 259200
    /// ```
    pub fn statement(&self) -> String {
        let markers = vec!["?"; self.columns.len()].join(",");
        let mut statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(","),
            markers
        );
        if let Some(ttl) = self.ttl {
            statement.push_str(&format!(" USING TTL {ttl}"));
        }
        statement
    }
}

/// A template the store has prepared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedWrite {
    /// Store-assigned statement id.
    pub id: u64,
    pub template: WriteTemplate,
}

impl PreparedWrite {
    pub fn new(id: u64, template: WriteTemplate) -> Self {
        Self { id, template }
    }

    /// Bind a candidate's values into this statement.
    pub fn bind(&self, candidate: &WriteCandidate) -> BoundWrite {
        BoundWrite {
            statement_id: self.id,
            table: self.template.table.clone(),
            partition_key: candidate.partition_key().to_string(),
            bucket: candidate.bucket(),
            ts: serialize_timestamp(candidate.ts_micros()),
            trace_id: candidate.trace_id(),
            ttl: candidate.row_ttl(),
        }
    }
}

/// One row's worth of bound values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundWrite {
    pub statement_id: u64,
    pub table: String,
    pub partition_key: String,
    /// Present only for bucketed tables.
    pub bucket: Option<u32>,
    /// 8-byte big-endian epoch milliseconds.
    pub ts: Bytes,
    /// Clustering key.
    pub trace_id: u64,
    pub ttl: Option<u32>,
}

impl fmt::Display for BoundWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(partition_key={}", self.table, self.partition_key)?;
        if let Some(bucket) = self.bucket {
            write!(f, ", bucket={bucket}")?;
        }
        write!(f, ", trace_id={:016x})", self.trace_id)
    }
}

/// Abstraction over the column store's asynchronous write path.
///
/// Implementations wrap a real driver session; tests use an in-memory mock.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Prepare an insert statement.
    ///
    /// Called once per index table when its factory is built.
    async fn prepare(&self, template: WriteTemplate) -> StoreResult<PreparedWrite>;

    /// Execute one bound write.
    ///
    /// # Errors
    ///
    /// Returns the store's failure as-is: timeouts, unavailability, or a
    /// rejected write.
    async fn execute(&self, write: BoundWrite) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::index_write::candidate::IndexInput;

    #[test]
    fn test_statement_text() {
        let bucketed = WriteTemplate::for_kind(
            IndexKind::ServiceName,
            "service_name_index",
            Some(259_200),
        );
        assert_eq!(
            bucketed.statement(),
            "INSERT INTO service_name_index (service_name,bucket,ts,trace_id) VALUES (?,?,?,?) USING TTL 259200"
        );

        let plain = WriteTemplate::for_kind(
            IndexKind::ServiceSpanName,
            "service_span_name_index",
            None,
        );
        assert_eq!(
            plain.statement(),
            "INSERT INTO service_span_name_index (service_span_name,ts,trace_id) VALUES (?,?,?)"
        );
    }

    #[test]
    fn test_bind() {
        let prepared = PreparedWrite::new(
            3,
            WriteTemplate::for_kind(IndexKind::Annotation, "annotations_index", Some(60)),
        );
        let candidate = WriteCandidate::new(
            IndexInput::new("frontend:error", 1_500_000_123_456, 0xabc),
            Some(4),
            10,
            Some(60),
        )
        .unwrap();

        let bound = prepared.bind(&candidate);
        assert_eq!(bound.statement_id, 3);
        assert_eq!(bound.table, "annotations_index");
        assert_eq!(bound.bucket, Some(4));
        assert_eq!(bound.ts.as_ref(), &1_500_000_123u64.to_be_bytes());
        assert_eq!(bound.ttl, Some(60));
        assert_eq!(
            bound.to_string(),
            "annotations_index(partition_key=frontend:error, bucket=4, trace_id=0000000000000abc)"
        );
    }
}
