//! Full-text backend adapters
//!
//! Every adapter implements [`SearchBackend`]. Adapters are synchronous and
//! shared across requests; the orchestrator moves their calls onto the
//! blocking pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::filters::BackendPredicate;
use super::types::RawHit;
use crate::error::Result;

pub mod opensearch;
pub mod sqlite;

pub use opensearch::OpenSearchBackend;
pub use sqlite::SqliteFtsBackend;

/// Sign convention of a backend's raw relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// e.g. FTS5 bm25, where more negative means more relevant
    LowerIsBetter,
    HigherIsBetter,
}

/// Result of a backend health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub engine: String,
    pub ok: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cooperative cancellation flag for one request.
///
/// Clones share the same flag. Raising it never affects other requests.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard that raises the flag when dropped.
    pub fn guard(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// Raises its [`CancelFlag`] on drop.
#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Capability contract for a full-text index.
pub trait SearchBackend: Send + Sync {
    /// Engine identifier reported in results and errors.
    fn engine(&self) -> &str;

    fn score_order(&self) -> ScoreOrder;

    /// Run each phrase against the index under `predicate`.
    ///
    /// Returns at most `limit` hits per phrase, each tagged with the phrase
    /// that produced it. Implementations stop early with
    /// [`crate::error::SearchError::Cancelled`] once `cancel` is raised.
    fn execute_search(
        &self,
        phrases: &[String],
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>>;

    fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_raises_shared_flag() {
        let flag = CancelFlag::new();
        let other = CancelFlag::new();
        {
            let _guard = flag.guard();
            assert!(!flag.is_cancelled());
        }
        assert!(flag.clone().is_cancelled());
        assert!(!other.is_cancelled());
    }
}
