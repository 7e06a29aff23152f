//! Distributed full-text backend over the OpenSearch REST API.
//!
//! Uses the blocking `reqwest` client; the orchestrator already runs backend
//! calls off the async workers. Filter fields are expected to be mapped as
//! `keyword` and `aoc_date` as `date`.

use std::time::Instant;

use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{CancelFlag, HealthStatus, ScoreOrder, SearchBackend};
use crate::config::OpenSearchConfig;
use crate::error::{Result, SearchError};
use crate::search::filters::{BackendPredicate, Clause};
use crate::search::types::{DATE_COLUMN, FilterField, RawHit, TenderRecord};

pub const ENGINE: &str = "opensearch";

pub struct OpenSearchBackend {
    client: Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl OpenSearchBackend {
    pub fn new(config: &OpenSearchConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    fn search_phrase(
        &self,
        phrase: &str,
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>> {
        let body = phrase_query(phrase, predicate, limit);
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .map_err(|err| SearchError::backend(ENGINE, err))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(SearchError::backend(
                ENGINE,
                format!("search returned HTTP {status}: {}", truncate(&text, 300)),
            ));
        }

        let parsed: SearchResponse = response
            .json()
            .map_err(|err| SearchError::backend(ENGINE, format!("invalid search response: {err}")))?;

        let mut hits = Vec::with_capacity(parsed.hits.hits.len());
        for hit in parsed.hits.hits {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    engine: ENGINE.to_string(),
                });
            }
            hits.push(RawHit {
                raw_score: hit.score.unwrap_or(0.0),
                record: hit.source.into_record(hit.id),
                matched_phrase: phrase.to_string(),
            });
        }
        Ok(hits)
    }
}

impl SearchBackend for OpenSearchBackend {
    fn engine(&self) -> &str {
        ENGINE
    }

    fn score_order(&self) -> ScoreOrder {
        ScoreOrder::HigherIsBetter
    }

    fn execute_search(
        &self,
        phrases: &[String],
        predicate: &BackendPredicate,
        limit: usize,
        cancel: &CancelFlag,
    ) -> Result<Vec<RawHit>> {
        let mut hits = Vec::new();
        for phrase in phrases {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled {
                    engine: ENGINE.to_string(),
                });
            }
            let found = self.search_phrase(phrase, predicate, limit, cancel)?;
            debug!(phrase = %phrase, hits = found.len(), "OpenSearch phrase query");
            hits.extend(found);
        }
        Ok(hits)
    }

    fn health_check(&self) -> HealthStatus {
        let start = Instant::now();
        let url = format!("{}/_cluster/health", self.base_url);
        let probe = self
            .authorize(self.client.get(&url))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(|response| response.json::<ClusterHealth>());
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match probe {
            Ok(health) => {
                let ok = matches!(health.status.as_str(), "green" | "yellow");
                HealthStatus {
                    engine: ENGINE.to_string(),
                    ok,
                    latency_ms,
                    message: Some(format!("cluster status {}", health.status)),
                }
            }
            Err(err) => {
                warn!(error = %err, "OpenSearch health check failed");
                HealthStatus {
                    engine: ENGINE.to_string(),
                    ok: false,
                    latency_ms,
                    message: Some(err.to_string()),
                }
            }
        }
    }
}

/// Document field a filter category is stored under in the index.
const fn document_field(field: FilterField) -> &'static str {
    match field {
        FilterField::Organization => "organization",
        other => other.column(),
    }
}

/// Request body for one phrase: phrase match on the title plus filter clauses.
pub fn phrase_query(phrase: &str, predicate: &BackendPredicate, limit: usize) -> Value {
    let slop = usize::from(phrase.split_whitespace().count() > 1);
    let filters: Vec<Value> = predicate.clauses.iter().map(filter_clause).collect();
    json!({
        "size": limit,
        "query": {
            "bool": {
                "must": [{
                    "match_phrase": {
                        "title": { "query": phrase, "slop": slop }
                    }
                }],
                "filter": filters,
            }
        },
        "sort": [
            { "_score": { "order": "desc" } },
            { "tender_id": { "order": "asc" } }
        ],
        "track_scores": true
    })
}

fn filter_clause(clause: &Clause) -> Value {
    match clause {
        Clause::In { field, values } => json!({ "terms": { document_field(*field): values } }),
        Clause::DateBetween { from, to } => {
            json!({ "range": { DATE_COLUMN: { "gte": from.to_string(), "lte": to.to_string() } } })
        }
        Clause::DateOnOrAfter { from } => {
            json!({ "range": { DATE_COLUMN: { "gte": from.to_string() } } })
        }
        Clause::DateOnOrBefore { to } => {
            json!({ "range": { DATE_COLUMN: { "lte": to.to_string() } } })
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<DocumentHit>,
}

#[derive(Debug, Deserialize)]
struct DocumentHit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: SourceDocument,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceDocument {
    tender_id: Option<String>,
    title: String,
    organization: String,
    status: String,
    aoc_date: Option<String>,
    url: String,
    service_category: String,
    value_range: String,
    region: String,
    department_type: String,
    complexity: String,
    keywords: Value,
}

impl SourceDocument {
    fn into_record(self, doc_id: String) -> TenderRecord {
        // Accept either a plain date or a full timestamp.
        let date = self
            .aoc_date
            .as_deref()
            .and_then(|raw| raw.get(..10))
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok());
        let keywords = match self.keywords {
            Value::String(text) => text,
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        };
        TenderRecord {
            tender_id: self.tender_id.unwrap_or(doc_id),
            title: self.title,
            organization: self.organization,
            status: self.status,
            date,
            url: self.url,
            service_category: self.service_category,
            value_range: self.value_range,
            region: self.region,
            department_type: self.department_type,
            complexity: self.complexity,
            keywords,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    status: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;

    use super::*;
    use crate::search::filters::FilterTranslator;
    use crate::search::types::SearchFilters;

    fn backend_for(server: &MockServer) -> OpenSearchBackend {
        let config = OpenSearchConfig {
            url: server.base_url(),
            index: "tenders".to_string(),
            timeout: Duration::from_secs(2),
            username: None,
            password: None,
        };
        OpenSearchBackend::new(&config).unwrap()
    }

    fn search_body() -> Value {
        json!({
            "took": 3,
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "max_score": 7.5,
                "hits": [
                    {
                        "_id": "doc-1",
                        "_score": 7.5,
                        "_source": {
                            "tender_id": "T-1",
                            "title": "Campus local area network upgrade",
                            "organization": "Ministry of Education",
                            "status": "Open",
                            "aoc_date": "2025-01-15T00:00:00",
                            "keywords": ["lan", "cabling"]
                        }
                    },
                    {
                        "_id": "doc-2",
                        "_score": 2.5,
                        "_source": { "title": "Local area network audit" }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_phrase_query_shape() {
        let filters = SearchFilters::default()
            .with(FilterField::Organization, ["Ministry of Health"])
            .with_dates(NaiveDate::from_ymd_opt(2025, 1, 1), None);
        let predicate = FilterTranslator::translate(&filters).unwrap();
        let body = phrase_query("local area network", &predicate, 20);

        assert_eq!(body["size"], 20);
        let phrase = &body["query"]["bool"]["must"][0]["match_phrase"]["title"];
        assert_eq!(phrase["query"], "local area network");
        assert_eq!(phrase["slop"], 1);
        let filter = &body["query"]["bool"]["filter"];
        assert_eq!(filter[0]["terms"]["organization"][0], "Ministry of Health");
        assert_eq!(filter[1]["range"]["aoc_date"]["gte"], "2025-01-01");

        let single = phrase_query("vlan", &BackendPredicate::default(), 5);
        assert_eq!(single["query"]["bool"]["must"][0]["match_phrase"]["title"]["slop"], 0);
    }

    #[test]
    fn test_one_request_per_phrase() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/tenders/_search");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(search_body());
        });

        let backend = backend_for(&server);
        let phrases = vec!["local area network".to_string(), "lan".to_string()];
        let hits = backend
            .execute_search(&phrases, &BackendPredicate::default(), 10, &CancelFlag::new())
            .unwrap();

        mock.assert_calls(2);
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].record.tender_id, "T-1");
        assert_eq!(hits[0].record.date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert_eq!(hits[0].record.keywords, "lan, cabling");
        assert_eq!(hits[1].record.tender_id, "doc-2");
        assert_eq!(hits[2].matched_phrase, "lan");
        assert!((hits[0].raw_score - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_http_error_is_backend_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/tenders/_search");
            then.status(500).body("shard failure");
        });

        let backend = backend_for(&server);
        let err = backend
            .execute_search(&["lan".to_string()], &BackendPredicate::default(), 10, &CancelFlag::new())
            .unwrap_err();
        assert!(err.is_backend());
        assert!(err.to_string().contains("shard failure"));
    }

    #[test]
    fn test_health_reports_cluster_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/_cluster/health");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "cluster_name": "tenders", "status": "yellow" }));
        });
        let health = backend_for(&server).health_check();
        assert!(health.ok);
        assert_eq!(health.engine, ENGINE);

        let red = MockServer::start();
        red.mock(|when, then| {
            when.method(GET).path("/_cluster/health");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "red" }));
        });
        assert!(!backend_for(&red).health_check().ok);
    }

    #[test]
    fn test_unreachable_cluster_is_unhealthy() {
        let config = OpenSearchConfig {
            url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_millis(200),
            ..OpenSearchConfig::default()
        };
        let health = OpenSearchBackend::new(&config).unwrap().health_check();
        assert!(!health.ok);
        assert!(health.message.is_some());
    }
}
