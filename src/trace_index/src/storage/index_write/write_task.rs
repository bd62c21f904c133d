//! A single pending index write.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::candidate::WriteCandidate;
use super::error::IndexResult;
use super::factory::FactoryShared;

/// What issuing a task did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row was sent to the store and acknowledged.
    Written,
    /// An equivalent row was written recently; nothing was sent.
    Suppressed,
}

/// One index row, already run through the dedup cache.
///
/// The dedup decision is taken once, when the factory creates the task.
/// Cloning produces an independent task for the same row that shares the
/// factory's cache and prepared statement and keeps that decision, so a
/// retry of a permitted write is never suppressed by its own earlier
/// attempt.
///
/// # Example
///
/// ```rust,ignore
/// let task = factory.new_write_task(IndexInput::new("frontend", ts, trace_id))?;
/// match task.issue().await {
///     Ok(outcome) => debug!(?outcome, "indexed"),
///     Err(e) if e.is_transient() => retry_later(task.clone()),
///     Err(e) => return Err(e),
/// }
/// ```
#[derive(Clone)]
pub struct IndexWrite {
    shared: Arc<FactoryShared>,
    candidate: Arc<WriteCandidate>,
    permitted: bool,
}

impl IndexWrite {
    pub(crate) fn new(
        shared: Arc<FactoryShared>,
        candidate: WriteCandidate,
        permitted: bool,
    ) -> Self {
        Self {
            shared,
            candidate: Arc::new(candidate),
            permitted,
        }
    }

    pub fn candidate(&self) -> &WriteCandidate {
        &self.candidate
    }

    /// Whether [`issue`](Self::issue) will skip the store.
    pub fn is_suppressed(&self) -> bool {
        !self.permitted
    }

    /// Bind the row into the prepared statement and send it.
    ///
    /// A suppressed task resolves to [`WriteOutcome::Suppressed`] without
    /// touching the store. Store failures are returned unmodified and also
    /// clear the row's dedup entry, so the same fact arriving again is not
    /// held back by a write that never landed.
    pub async fn issue(&self) -> IndexResult<WriteOutcome> {
        if !self.permitted {
            trace!(
                table = %self.shared.table,
                candidate = %self.candidate,
                "skipping suppressed index write"
            );
            return Ok(WriteOutcome::Suppressed);
        }

        let bound = self.shared.prepared.bind(&self.candidate);
        match self.shared.store.execute(bound).await {
            Ok(()) => Ok(WriteOutcome::Written),
            Err(e) => {
                warn!(
                    table = %self.shared.table,
                    candidate = %self.candidate,
                    error = %e,
                    transient = e.is_transient(),
                    "index write failed"
                );
                self.shared.cache.invalidate(&self.candidate.dedup_key());
                Err(e.into())
            }
        }
    }

    /// Issue on the current tokio runtime and return immediately.
    pub fn spawn(self) -> JoinHandle<IndexResult<WriteOutcome>> {
        tokio::spawn(async move { self.issue().await })
    }
}

impl fmt::Debug for IndexWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexWrite")
            .field("table", &self.shared.table)
            .field("candidate", &self.candidate)
            .field("permitted", &self.permitted)
            .finish()
    }
}

impl fmt::Display for IndexWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.shared.table, self.candidate)
    }
}
