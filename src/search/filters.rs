//! Translate [`SearchFilters`] into a backend-neutral predicate.

use chrono::NaiveDate;
use serde::Serialize;

use super::types::{FilterField, SearchFilters};
use crate::error::{Result, SearchError};

/// One restriction on stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Clause {
    /// Field value must be one of `values`
    In {
        field: FilterField,
        values: Vec<String>,
    },
    /// Inclusive on both ends
    DateBetween { from: NaiveDate, to: NaiveDate },
    DateOnOrAfter { from: NaiveDate },
    DateOnOrBefore { to: NaiveDate },
}

/// Conjunction of clauses. Empty means "match everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendPredicate {
    pub clauses: Vec<Clause>,
}

impl BackendPredicate {
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Stateless filter translator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterTranslator;

impl FilterTranslator {
    /// Build the predicate for `filters`.
    ///
    /// Fails on an inverted date range or a similarity floor outside 0-100.
    /// The similarity floor itself never becomes a clause.
    pub fn translate(filters: &SearchFilters) -> Result<BackendPredicate> {
        if !(0.0..=100.0).contains(&filters.min_similarity) {
            return Err(SearchError::validation(
                "min_similarity",
                format!("must be between 0 and 100, got {}", filters.min_similarity),
            ));
        }

        let mut clauses: Vec<Clause> = FilterField::ALL
            .iter()
            .filter_map(|&field| {
                let selected = filters.selections(field);
                (!selected.is_empty()).then(|| Clause::In {
                    field,
                    values: selected.iter().cloned().collect(),
                })
            })
            .collect();

        match (filters.date_from, filters.date_to) {
            (Some(from), Some(to)) if from > to => {
                return Err(SearchError::validation(
                    "date_range",
                    format!("date_from {from} is after date_to {to}"),
                ));
            }
            (Some(from), Some(to)) => clauses.push(Clause::DateBetween { from, to }),
            (Some(from), None) => clauses.push(Clause::DateOnOrAfter { from }),
            (None, Some(to)) => clauses.push(Clause::DateOnOrBefore { to }),
            (None, None) => {}
        }

        Ok(BackendPredicate { clauses })
    }
}
