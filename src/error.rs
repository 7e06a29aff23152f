//! Error types for tender-search
//!
//! A single crate-wide error enum. The three request-level kinds callers
//! care about are `Validation`, `Backend` and `Timeout`; they stay distinct
//! so "backend is down" never reads like "backend is slow".

use std::fmt;

use thiserror::Error;

/// Orchestrator stage reached when an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Expanded,
    PredicateBuilt,
    Executed,
    Normalized,
    FilteredBySimilarity,
    Paginated,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Expanded => "expanded",
            Self::PredicateBuilt => "predicate_built",
            Self::Executed => "executed",
            Self::Normalized => "normalized",
            Self::FilteredBySimilarity => "filtered_by_similarity",
            Self::Paginated => "paginated",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{engine} backend failed at stage {stage}: {cause}")]
    Backend {
        engine: String,
        stage: Stage,
        cause: String,
    },

    #[error("{engine} backend exceeded the {deadline_ms}ms deadline at stage {stage}")]
    Timeout {
        engine: String,
        stage: Stage,
        deadline_ms: u64,
    },

    #[error("search on {engine} was cancelled")]
    Cancelled { engine: String },

    #[error("dictionary error: {0}")]
    Dictionary(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SearchError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Backend failure raised by an adapter, before the orchestrator knows
    /// which stage it belongs to.
    pub fn backend(engine: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Backend {
            engine: engine.into(),
            stage: Stage::Executed,
            cause: cause.to_string(),
        }
    }

    /// Stable machine-readable code for robot output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Backend { .. } => "backend_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Cancelled { .. } => "cancelled",
            Self::Dictionary(_) => "dictionary_error",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "io_error",
            Self::Sqlite(_) => "database_error",
            Self::Http(_) => "http_error",
        }
    }

    /// Orchestrator stage, for errors raised inside the request state machine.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Backend { stage, .. } | Self::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_request_errors() {
        let validation = SearchError::validation("date_from", "after date_to");
        let backend = SearchError::backend("sqlite", "disk I/O error");
        let timeout = SearchError::Timeout {
            engine: "sqlite".to_string(),
            stage: Stage::Executed,
            deadline_ms: 50,
        };
        assert_eq!(validation.code(), "validation_error");
        assert_eq!(backend.code(), "backend_error");
        assert_eq!(timeout.code(), "timeout_error");
    }

    #[test]
    fn test_backend_message_names_engine_and_stage() {
        let err = SearchError::backend("opensearch", "connection refused");
        let message = err.to_string();
        assert!(message.contains("opensearch"));
        assert!(message.contains("executed"));
        assert!(message.contains("connection refused"));
        assert_eq!(err.stage(), Some(Stage::Executed));
    }
}
