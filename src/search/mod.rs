//! Ranked search over tender records
//!
//! Expanded phrases run against a pluggable full-text backend; raw scores are
//! rescaled per phrase, merged per record and paginated by
//! [`SearchOrchestrator`].

pub mod backend;
pub mod filters;
pub mod normalize;
pub mod orchestrator;
pub mod types;

pub use backend::{
    CancelFlag, HealthStatus, OpenSearchBackend, ScoreOrder, SearchBackend, SqliteFtsBackend,
};
pub use filters::{BackendPredicate, Clause, FilterTranslator};
pub use normalize::normalize_and_merge;
pub use orchestrator::{OrchestratorOptions, SearchOrchestrator};
pub use types::{
    FilterField, PhraseBatch, RawHit, SearchFilters, SearchHit, SearchRequest, SearchResult,
    TenderRecord,
};
