//! Mock index store for testing.
//!
//! Records every prepared statement and executed write in memory, and can be
//! told to fail upcoming writes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use super::error::{StoreError, StoreResult};
use super::store::{BoundWrite, IndexStore, PreparedWrite, WriteTemplate};

/// In-memory store that keeps what it was asked to do.
///
/// # Example
///
/// ```rust,ignore
/// let store = Arc::new(MockIndexStore::new());
/// store.fail_next(StoreError::unavailable("down"));
///
/// assert!(task.issue().await.is_err());
/// assert!(task.clone().issue().await.is_ok());
/// assert_eq!(store.write_count(), 1);
/// ```
pub struct MockIndexStore {
    next_statement_id: AtomicU64,
    prepared: RwLock<Vec<PreparedWrite>>,
    writes: RwLock<Vec<BoundWrite>>,
    failures: Mutex<VecDeque<StoreError>>,
}

impl MockIndexStore {
    pub fn new() -> Self {
        Self {
            next_statement_id: AtomicU64::new(1),
            prepared: RwLock::new(Vec::new()),
            writes: RwLock::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail the next executed write with `error`. Queued failures apply in order.
    pub fn fail_next(&self, error: StoreError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Successful writes, in completion order.
    pub fn writes(&self) -> Vec<BoundWrite> {
        self.writes.read().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.read().unwrap().len()
    }

    pub fn prepared(&self) -> Vec<PreparedWrite> {
        self.prepared.read().unwrap().clone()
    }

    pub fn clear(&self) {
        self.writes.write().unwrap().clear();
    }
}

impl Default for MockIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexStore for MockIndexStore {
    async fn prepare(&self, template: WriteTemplate) -> StoreResult<PreparedWrite> {
        let id = self.next_statement_id.fetch_add(1, Ordering::SeqCst);
        let prepared = PreparedWrite::new(id, template);
        self.prepared.write().unwrap().push(prepared.clone());
        Ok(prepared)
    }

    async fn execute(&self, write: BoundWrite) -> StoreResult<()> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let known = self
            .prepared
            .read()
            .unwrap()
            .iter()
            .any(|prepared| prepared.id == write.statement_id);
        if !known {
            return Err(StoreError::InvalidStatement {
                message: format!("unknown statement id {}", write.statement_id),
            });
        }
        self.writes.write().unwrap().push(write);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::index_write::kind::IndexKind;
    use bytes::Bytes;

    fn bound(statement_id: u64) -> BoundWrite {
        BoundWrite {
            statement_id,
            table: "service_name_index".to_string(),
            partition_key: "frontend".to_string(),
            bucket: Some(1),
            ts: Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 1]),
            trace_id: 1,
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_mock_prepare_execute() {
        let store = MockIndexStore::new();
        let prepared = store
            .prepare(WriteTemplate::for_kind(
                IndexKind::ServiceName,
                "service_name_index",
                None,
            ))
            .await
            .unwrap();

        store.execute(bound(prepared.id)).await.unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.prepared().len(), 1);

        store.clear();
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.prepared().len(), 1);
        store.execute(bound(prepared.id)).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_injected_failure() {
        let store = MockIndexStore::new();
        let prepared = store
            .prepare(WriteTemplate::for_kind(
                IndexKind::ServiceName,
                "service_name_index",
                None,
            ))
            .await
            .unwrap();

        store.fail_next(StoreError::unavailable("down"));
        let result = store.execute(bound(prepared.id)).await;
        assert_eq!(result, Err(StoreError::unavailable("down")));

        store.execute(bound(prepared.id)).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unknown_statement() {
        let store = MockIndexStore::new();
        let result = store.execute(bound(42)).await;
        assert!(matches!(result, Err(StoreError::InvalidStatement { .. })));
    }
}
