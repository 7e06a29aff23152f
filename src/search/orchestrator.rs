//! Search orchestrator: the single entry point for running a search.
//!
//! One request runs through
//! `received -> expanded -> predicate_built -> executed -> normalized ->
//! filtered_by_similarity -> paginated -> done`; any failure ends it and is
//! returned to the caller unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::backend::{CancelFlag, HealthStatus, SearchBackend};
use super::filters::{BackendPredicate, FilterTranslator};
use super::normalize::{normalize_and_merge, retain_min_similarity};
use super::types::{PhraseBatch, SearchRequest, SearchResult};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError, Stage};
use crate::expansion::SynonymExpander;

/// Per-request tuning shared by all searches.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub max_expansions: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub per_phrase_limit: usize,
    pub deadline: Duration,
    /// Run one blocking task per phrase instead of one for all phrases
    pub parallel_phrases: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for OrchestratorOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_expansions: config.max_expansions,
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            per_phrase_limit: config.per_phrase_limit,
            deadline: config.deadline,
            parallel_phrases: config.parallel_phrases,
        }
    }
}

pub struct SearchOrchestrator {
    expander: Arc<SynonymExpander>,
    backend: RwLock<Arc<dyn SearchBackend>>,
    fallback: Option<Arc<dyn SearchBackend>>,
    options: OrchestratorOptions,
}

impl SearchOrchestrator {
    pub fn new(
        expander: Arc<SynonymExpander>,
        backend: Arc<dyn SearchBackend>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            expander,
            backend: RwLock::new(backend),
            fallback: None,
            options,
        }
    }

    /// Retry on `fallback` once when the active backend fails.
    ///
    /// Only backend failures trigger the retry; timeouts and validation
    /// errors are returned as they are.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn SearchBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn expander(&self) -> &SynonymExpander {
        &self.expander
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn active_backend(&self) -> Arc<dyn SearchBackend> {
        Arc::clone(&self.backend.read())
    }

    pub fn active_engine(&self) -> String {
        self.backend.read().engine().to_string()
    }

    /// Replace the active backend. Requests already running keep the one
    /// they started with.
    pub fn swap_backend(&self, next: Arc<dyn SearchBackend>) -> Arc<dyn SearchBackend> {
        let previous = std::mem::replace(&mut *self.backend.write(), next);
        info!(
            from = previous.engine(),
            to = %self.active_engine(),
            "Swapped active search backend"
        );
        previous
    }

    /// Health of the active backend.
    pub async fn health(&self) -> HealthStatus {
        let backend = self.active_backend();
        let engine = backend.engine().to_string();
        let status = tokio::task::spawn_blocking(move || backend.health_check())
            .await
            .unwrap_or_else(|err| HealthStatus {
                engine,
                ok: false,
                latency_ms: 0,
                message: Some(format!("health check task failed: {err}")),
            });
        debug!(engine = %status.engine, ok = status.ok, latency_ms = status.latency_ms, "Backend health");
        status
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        self.search_with_cancel(request, CancelFlag::new()).await
    }

    /// Run a search that stops early once `cancel` is raised.
    ///
    /// The flag is also raised when this future completes, times out or is
    /// dropped, which stops any backend work still running for it.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: CancelFlag,
    ) -> Result<SearchResult> {
        let _guard = cancel.guard();
        let mut stage = Stage::Received;
        let outcome = self.run(request, &cancel, &mut stage).await;
        if let Err(err) = &outcome {
            warn!(
                keyword = request.keyword(),
                stage = %stage,
                code = err.code(),
                error = %err,
                "Search failed"
            );
        }
        outcome
    }

    async fn run(
        &self,
        request: &SearchRequest,
        cancel: &CancelFlag,
        stage: &mut Stage,
    ) -> Result<SearchResult> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.options.deadline;
        let keyword = request.keyword();

        let limit = request
            .limit
            .unwrap_or(self.options.default_limit)
            .min(self.options.max_limit);
        if limit == 0 {
            return Err(SearchError::validation("limit", "must be at least 1"));
        }

        let expansion = self.expander.expand(keyword, self.options.max_expansions);
        advance(stage, Stage::Expanded, keyword);

        let predicate = FilterTranslator::translate(&request.filters)?;
        advance(stage, Stage::PredicateBuilt, keyword);

        let primary = self.active_backend();
        let phrases = &expansion.expanded_phrases;
        let (backend, batches) = match self
            .execute(&primary, phrases, &predicate, cancel, deadline)
            .await
        {
            Ok(batches) => (primary, batches),
            Err(err) if err.is_backend() => match &self.fallback {
                Some(fallback) if fallback.engine() != primary.engine() => {
                    warn!(
                        from = primary.engine(),
                        to = fallback.engine(),
                        error = %err,
                        "Active backend failed, retrying on fallback"
                    );
                    let batches = self
                        .execute(fallback, phrases, &predicate, cancel, deadline)
                        .await?;
                    (Arc::clone(fallback), batches)
                }
                _ => return Err(err),
            },
            Err(err) => return Err(err),
        };
        advance(stage, Stage::Executed, keyword);

        let mut hits = normalize_and_merge(
            batches,
            keyword,
            &expansion.anti_patterns,
            backend.score_order(),
        );
        advance(stage, Stage::Normalized, keyword);

        retain_min_similarity(&mut hits, request.filters.min_similarity);
        advance(stage, Stage::FilteredBySimilarity, keyword);

        let total_matches = hits.len();
        let page: Vec<_> = hits.into_iter().skip(request.offset).take(limit).collect();
        advance(stage, Stage::Paginated, keyword);

        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = SearchResult {
            query: keyword.to_string(),
            expanded_phrases: expansion.expanded_phrases,
            domain: expansion.domain,
            confidence: expansion.confidence,
            total_matches,
            offset: request.offset,
            execution_time_ms,
            engine_used: backend.engine().to_string(),
            filters_applied: request.filters.applied_filters(),
            hits: page,
        };
        advance(stage, Stage::Done, keyword);

        info!(
            keyword,
            engine = %result.engine_used,
            phrases = result.expanded_phrases.len(),
            total = total_matches,
            returned = result.hits.len(),
            elapsed_ms = execution_time_ms,
            "Search complete"
        );
        Ok(result)
    }

    /// Run all phrases on `backend` within `deadline`.
    ///
    /// On timeout the cancel flag is raised and per-phrase results that did
    /// arrive are discarded.
    async fn execute(
        &self,
        backend: &Arc<dyn SearchBackend>,
        phrases: &[String],
        predicate: &BackendPredicate,
        cancel: &CancelFlag,
        deadline: tokio::time::Instant,
    ) -> Result<Vec<PhraseBatch>> {
        let engine = backend.engine().to_string();
        let limit = self.options.per_phrase_limit;

        let work = async {
            if self.options.parallel_phrases && phrases.len() > 1 {
                run_per_phrase(backend, phrases, predicate, limit, cancel).await
            } else {
                let backend = Arc::clone(backend);
                let phrases = phrases.to_vec();
                let predicate = predicate.clone();
                let cancel = cancel.clone();
                let hits = tokio::task::spawn_blocking(move || {
                    backend.execute_search(&phrases, &predicate, limit, &cancel)
                })
                .await
                .map_err(|err| SearchError::backend(engine.as_str(), format!("search task failed: {err}")))??;
                Ok(PhraseBatch::group(hits))
            }
        };

        match tokio::time::timeout_at(deadline, work).await {
            Ok(result) => result.map_err(|err| as_backend_error(err, &engine)),
            Err(_) => {
                cancel.cancel();
                Err(SearchError::Timeout {
                    engine,
                    stage: Stage::Executed,
                    deadline_ms: u64::try_from(self.options.deadline.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

/// One blocking task per phrase; batches come back in phrase order
/// regardless of completion order.
async fn run_per_phrase(
    backend: &Arc<dyn SearchBackend>,
    phrases: &[String],
    predicate: &BackendPredicate,
    limit: usize,
    cancel: &CancelFlag,
) -> Result<Vec<PhraseBatch>> {
    let mut tasks = JoinSet::new();
    for (index, phrase) in phrases.iter().enumerate() {
        let backend = Arc::clone(backend);
        let predicate = predicate.clone();
        let cancel = cancel.clone();
        let phrase = phrase.clone();
        tasks.spawn_blocking(move || {
            let hits =
                backend.execute_search(std::slice::from_ref(&phrase), &predicate, limit, &cancel);
            (index, phrase, hits)
        });
    }

    let mut slots: Vec<Option<PhraseBatch>> = vec![None; phrases.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, phrase, hits) = joined.map_err(|err| {
            SearchError::backend(backend.engine(), format!("phrase task failed: {err}"))
        })?;
        slots[index] = Some(PhraseBatch { phrase, hits: hits? });
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Errors from inside an adapter all surface as backend failures.
fn as_backend_error(err: SearchError, engine: &str) -> SearchError {
    match err {
        SearchError::Backend { .. } | SearchError::Timeout { .. } | SearchError::Cancelled { .. } => err,
        other => SearchError::backend(engine, other),
    }
}

fn advance(stage: &mut Stage, next: Stage, keyword: &str) {
    *stage = next;
    debug!(keyword, stage = %next, "Search stage");
}
