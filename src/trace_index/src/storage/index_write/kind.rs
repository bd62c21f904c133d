//! The index tables this layer writes.

use serde::{Deserialize, Serialize};

/// A secondary index table keyed by something other than trace id.
///
/// Every kind stores `(partition, ts, trace_id)` rows clustered by
/// timestamp; they differ in what the partition key is and whether it is
/// spread over buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Traces by local service name.
    ServiceName,
    /// Traces by `service:key` or `service:key:value` annotation.
    Annotation,
    /// Traces by `service.span` pair.
    ServiceSpanName,
}

impl IndexKind {
    /// Default table name.
    pub fn table(&self) -> &'static str {
        match self {
            IndexKind::ServiceName => "service_name_index",
            IndexKind::Annotation => "annotations_index",
            IndexKind::ServiceSpanName => "service_span_name_index",
        }
    }

    /// Whether rows are spread over synthetic buckets.
    pub fn is_bucketed(&self) -> bool {
        matches!(self, IndexKind::ServiceName | IndexKind::Annotation)
    }

    /// Partition key columns, in statement order.
    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            IndexKind::ServiceName => &["service_name", "bucket"],
            IndexKind::Annotation => &["annotation", "bucket"],
            IndexKind::ServiceSpanName => &["service_span_name"],
        }
    }

    /// Partition key for an annotation row.
    pub fn annotation_key(service: &str, key: &str, value: Option<&str>) -> String {
        match value {
            Some(value) => format!("{service}:{key}:{value}"),
            None => format!("{service}:{key}"),
        }
    }

    /// Partition key for a service/span row.
    pub fn service_span_key(service: &str, span: &str) -> String {
        format!("{service}.{span}")
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}
