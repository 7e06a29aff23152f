//! Request, record and result types shared by the search pipeline.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Maximum keyword length after trimming.
pub const MAX_KEYWORD_LEN: usize = 200;

/// Stored column holding the record date.
pub const DATE_COLUMN: &str = "aoc_date";

/// Set-valued filter categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    ServiceCategory,
    Organization,
    ValueRange,
    Region,
    Status,
    DepartmentType,
    Complexity,
}

impl FilterField {
    pub const ALL: [Self; 7] = [
        Self::ServiceCategory,
        Self::Organization,
        Self::ValueRange,
        Self::Region,
        Self::Status,
        Self::DepartmentType,
        Self::Complexity,
    ];

    /// Column / document field the category is stored under.
    pub const fn column(self) -> &'static str {
        match self {
            Self::ServiceCategory => "service_category",
            Self::Organization => "org",
            Self::ValueRange => "value_range",
            Self::Region => "region",
            Self::Status => "status",
            Self::DepartmentType => "department_type",
            Self::Complexity => "complexity",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ServiceCategory => "service_categories",
            Self::Organization => "organizations",
            Self::ValueRange => "value_ranges",
            Self::Region => "regions",
            Self::Status => "statuses",
            Self::DepartmentType => "department_types",
            Self::Complexity => "complexity_levels",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured filters for one request.
///
/// An empty set means the category is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub service_categories: BTreeSet<String>,
    pub organizations: BTreeSet<String>,
    pub value_ranges: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub department_types: BTreeSet<String>,
    pub complexity_levels: BTreeSet<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Similarity floor on the 0-100 scale, applied after normalization
    pub min_similarity: f64,
}

impl SearchFilters {
    pub fn selections(&self, field: FilterField) -> &BTreeSet<String> {
        match field {
            FilterField::ServiceCategory => &self.service_categories,
            FilterField::Organization => &self.organizations,
            FilterField::ValueRange => &self.value_ranges,
            FilterField::Region => &self.regions,
            FilterField::Status => &self.statuses,
            FilterField::DepartmentType => &self.department_types,
            FilterField::Complexity => &self.complexity_levels,
        }
    }

    fn selections_mut(&mut self, field: FilterField) -> &mut BTreeSet<String> {
        match field {
            FilterField::ServiceCategory => &mut self.service_categories,
            FilterField::Organization => &mut self.organizations,
            FilterField::ValueRange => &mut self.value_ranges,
            FilterField::Region => &mut self.regions,
            FilterField::Status => &mut self.statuses,
            FilterField::DepartmentType => &mut self.department_types,
            FilterField::Complexity => &mut self.complexity_levels,
        }
    }

    /// Add selections to a category. Blank values are ignored.
    #[must_use]
    pub fn with<I, S>(mut self, field: FilterField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.selections_mut(field);
        for value in values {
            let value: String = value.into();
            let value = value.trim();
            if !value.is_empty() {
                set.insert(value.to_string());
            }
        }
        self
    }

    #[must_use]
    pub const fn with_dates(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    #[must_use]
    pub const fn with_min_similarity(mut self, min_similarity: f64) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Names of the filters that restrict the result set.
    pub fn applied_filters(&self) -> Vec<String> {
        let mut applied: Vec<String> = FilterField::ALL
            .iter()
            .filter(|field| !self.selections(**field).is_empty())
            .map(|field| field.label().to_string())
            .collect();
        if self.date_from.is_some() {
            applied.push("date_from".to_string());
        }
        if self.date_to.is_some() {
            applied.push("date_to".to_string());
        }
        if self.min_similarity > 0.0 {
            applied.push("min_similarity".to_string());
        }
        applied
    }
}

/// A procurement record as stored in a backend index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenderRecord {
    pub tender_id: String,
    pub title: String,
    pub organization: String,
    pub status: String,
    pub date: Option<NaiveDate>,
    pub url: String,
    pub service_category: String,
    pub value_range: String,
    pub region: String,
    pub department_type: String,
    pub complexity: String,
    /// Extra indexed text; not part of the result shape
    #[serde(skip_serializing)]
    pub keywords: String,
}

impl TenderRecord {
    pub fn new(tender_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            tender_id: tender_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// One backend match for one phrase. `raw_score` is backend-native.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub record: TenderRecord,
    pub raw_score: f64,
    pub matched_phrase: String,
}

impl RawHit {
    pub fn record_id(&self) -> &str {
        &self.record.tender_id
    }
}

/// All hits one phrase produced, in backend rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseBatch {
    pub phrase: String,
    pub hits: Vec<RawHit>,
}

impl PhraseBatch {
    /// Split a flat hit list into per-phrase batches, ordered by first appearance.
    pub fn group(hits: Vec<RawHit>) -> Vec<Self> {
        let mut batches: Vec<Self> = Vec::new();
        for hit in hits {
            match batches.iter_mut().find(|b| b.phrase == hit.matched_phrase) {
                Some(batch) => batch.hits.push(hit),
                None => batches.push(Self {
                    phrase: hit.matched_phrase.clone(),
                    hits: vec![hit],
                }),
            }
        }
        batches
    }
}

/// One ranked result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: TenderRecord,
    /// Raw score of the phrase that gave the best similarity
    pub raw_score: f64,
    pub similarity_percent: f64,
    pub matched_phrases: Vec<String>,
    pub exact_match: bool,
}

/// Response envelope for one search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub expanded_phrases: Vec<String>,
    pub domain: String,
    pub confidence: f64,
    /// Matches after similarity filtering, before pagination
    pub total_matches: usize,
    pub offset: usize,
    pub execution_time_ms: u64,
    pub engine_used: String,
    pub filters_applied: Vec<String>,
    pub hits: Vec<SearchHit>,
}

/// Validated search input.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    keyword: String,
    pub filters: SearchFilters,
    /// Requested page size; `None` uses the configured default
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(keyword: &str) -> Result<Self> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(SearchError::validation("keyword", "must not be empty"));
        }
        let length = keyword.chars().count();
        if length > MAX_KEYWORD_LEN {
            return Err(SearchError::validation(
                "keyword",
                format!("must be at most {MAX_KEYWORD_LEN} characters, got {length}"),
            ));
        }
        Ok(Self {
            keyword: keyword.to_string(),
            filters: SearchFilters::default(),
            limit: None,
            offset: 0,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_trims_and_validates_keyword() {
        assert_eq!(SearchRequest::new("  lan ").unwrap().keyword(), "lan");
        assert!(matches!(
            SearchRequest::new("   "),
            Err(SearchError::Validation { .. })
        ));
        let long = "x".repeat(MAX_KEYWORD_LEN + 1);
        assert!(SearchRequest::new(&long).is_err());
        assert!(SearchRequest::new(&"x".repeat(MAX_KEYWORD_LEN)).is_ok());
    }

    #[test]
    fn test_applied_filters_lists_only_restrictions() {
        let filters = SearchFilters::default()
            .with(FilterField::Region, ["North", " "])
            .with(FilterField::Organization, Vec::<String>::new())
            .with_dates(NaiveDate::from_ymd_opt(2025, 1, 1), None);
        assert_eq!(filters.applied_filters(), ["regions", "date_from"]);
        assert_eq!(filters.regions.len(), 1);
    }

    #[test]
    fn test_group_keeps_first_appearance_order() {
        let hit = |id: &str, phrase: &str| RawHit {
            record: TenderRecord::new(id, "t"),
            raw_score: 1.0,
            matched_phrase: phrase.to_string(),
        };
        let batches = PhraseBatch::group(vec![hit("1", "vlan"), hit("2", "lan"), hit("3", "vlan")]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].phrase, "vlan");
        assert_eq!(batches[0].hits.len(), 2);
        assert_eq!(batches[1].phrase, "lan");
    }

    #[test]
    fn test_hit_serializes_flat_record_without_keywords() {
        let mut record = TenderRecord::new("T-1", "Campus LAN upgrade");
        record.keywords = "switch".to_string();
        let hit = SearchHit {
            record,
            raw_score: -3.2,
            similarity_percent: 100.0,
            matched_phrases: vec!["lan".to_string()],
            exact_match: true,
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["tender_id"], "T-1");
        assert_eq!(json["similarity_percent"], 100.0);
        assert!(json.get("keywords").is_none());
    }
}
