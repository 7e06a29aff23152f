use std::sync::Arc;

use chrono::NaiveDate;

use tender_search::expansion::{ExpansionDictionary, SynonymExpander};
use tender_search::search::{
    FilterField, OrchestratorOptions, SearchBackend, SearchFilters, SearchOrchestrator,
    SearchRequest, SqliteFtsBackend, TenderRecord,
};
use tender_search::test_utils::fixtures::{SAMPLE_DICTIONARY, temp_sqlite_backend};

fn orchestrator(backend: SqliteFtsBackend) -> SearchOrchestrator {
    let dictionary = ExpansionDictionary::from_yaml_str(SAMPLE_DICTIONARY, "sample").unwrap();
    SearchOrchestrator::new(
        Arc::new(SynonymExpander::new(dictionary)),
        Arc::new(backend),
        OrchestratorOptions::default(),
    )
}

fn ids(result: &tender_search::search::SearchResult) -> Vec<&str> {
    result
        .hits
        .iter()
        .map(|hit| hit.record.tender_id.as_str())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_expanded_search_finds_every_synonym() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let result = orchestrator
        .search(&SearchRequest::new("lan").unwrap())
        .await
        .unwrap();

    assert_eq!(result.engine_used, "sqlite");
    assert_eq!(result.domain, "networking");
    assert_eq!(
        result.expanded_phrases,
        vec!["local area network", "vlan", "ethernet"]
    );
    let mut found = ids(&result);
    found.sort_unstable();
    assert_eq!(found, vec!["T-1001", "T-1002", "T-1008"]);
    assert_eq!(result.total_matches, 3);
    assert!(!found.contains(&"T-1003"), "land development must not match");
    for hit in &result.hits {
        assert!((0.0..=100.0).contains(&hit.similarity_percent));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_results_are_ranked_and_deterministic() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);
    let request = SearchRequest::new("lan").unwrap();

    let first = orchestrator.search(&request).await.unwrap();
    let second = orchestrator.search(&request).await.unwrap();

    assert_eq!(ids(&first), ids(&second));
    for pair in first.hits.windows(2) {
        assert!(pair[0].similarity_percent >= pair[1].similarity_percent);
    }
    // T-1002 matches both `vlan` and `ethernet`, each as the only hit.
    let t1002 = first
        .hits
        .iter()
        .find(|hit| hit.record.tender_id == "T-1002")
        .unwrap();
    assert!((t1002.similarity_percent - 100.0).abs() < f64::EPSILON);
    assert_eq!(t1002.matched_phrases, vec!["vlan", "ethernet"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_category_filter_restricts_results() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let request = SearchRequest::new("lan")
        .unwrap()
        .with_filters(SearchFilters::default().with(FilterField::Region, ["North"]));
    let result = orchestrator.search(&request).await.unwrap();

    assert_eq!(ids(&result), vec!["T-1001"]);
    assert_eq!(result.filters_applied, vec!["regions"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_date_range_filter() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let filters = SearchFilters::default().with_dates(
        NaiveDate::from_ymd_opt(2025, 2, 1),
        NaiveDate::from_ymd_opt(2025, 3, 31),
    );
    let request = SearchRequest::new("lan").unwrap().with_filters(filters);
    let mut found = ids(&orchestrator.search(&request).await.unwrap())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    found.sort();

    assert_eq!(found, vec!["T-1002", "T-1008"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_inverted_date_range_is_validation_error() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let filters = SearchFilters::default().with_dates(
        NaiveDate::from_ymd_opt(2025, 3, 1),
        NaiveDate::from_ymd_opt(2025, 1, 1),
    );
    let request = SearchRequest::new("lan").unwrap().with_filters(filters);
    let err = orchestrator.search(&request).await.unwrap_err();

    assert_eq!(err.code(), "validation_error");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_keyword_searches_itself() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let result = orchestrator
        .search(&SearchRequest::new("firewall").unwrap())
        .await
        .unwrap();

    assert_eq!(result.expanded_phrases, vec!["firewall"]);
    assert_eq!(result.domain, "general");
    assert!(result.confidence < 0.9);
    assert_eq!(ids(&result), vec!["T-1007"]);
    assert!(result.hits[0].exact_match);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_min_similarity_only_removes_results() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let all = orchestrator
        .search(&SearchRequest::new("lan").unwrap())
        .await
        .unwrap();
    let strict = orchestrator
        .search(
            &SearchRequest::new("lan")
                .unwrap()
                .with_filters(SearchFilters::default().with_min_similarity(100.0)),
        )
        .await
        .unwrap();

    assert!(strict.total_matches <= all.total_matches);
    for hit in &strict.hits {
        assert!(ids(&all).contains(&hit.record.tender_id.as_str()));
        assert!((hit.similarity_percent - 100.0).abs() < f64::EPSILON);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pagination_after_filtering() {
    let (_dir, backend) = temp_sqlite_backend();
    let orchestrator = orchestrator(backend);

    let full = orchestrator
        .search(&SearchRequest::new("lan").unwrap())
        .await
        .unwrap();
    let page = orchestrator
        .search(
            &SearchRequest::new("lan")
                .unwrap()
                .with_limit(1)
                .with_offset(1),
        )
        .await
        .unwrap();

    assert_eq!(page.total_matches, full.total_matches);
    assert_eq!(page.offset, 1);
    assert_eq!(ids(&page), vec![ids(&full)[1]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_swapped_backend_serves_later_requests() {
    let (_dir_a, first) = temp_sqlite_backend();
    let orchestrator = orchestrator(first);

    let dir_b = tempfile::tempdir().unwrap();
    let config = tender_search::config::SqliteConfig {
        database_path: dir_b.path().join("other.db"),
        ..Default::default()
    };
    let second = SqliteFtsBackend::open(&config).unwrap();
    let mut record = TenderRecord::new("X-1", "Ethernet backbone refresh");
    record.keywords = "ethernet".to_string();
    second.index_records(&[record]).unwrap();

    let previous = orchestrator.swap_backend(Arc::new(second));
    assert_eq!(previous.engine(), "sqlite");

    let result = orchestrator
        .search(&SearchRequest::new("lan").unwrap())
        .await
        .unwrap();
    assert_eq!(ids(&result), vec!["X-1"]);
}

#[test]
fn test_reindexing_replaces_records_by_id() {
    let (_dir, backend) = temp_sqlite_backend();
    let before = backend.record_count().unwrap();

    let mut updated = TenderRecord::new("T-1001", "Campus wireless network upgrade");
    updated.region = "West".to_string();
    backend.index_records(&[updated]).unwrap();

    assert_eq!(backend.record_count().unwrap(), before);
    let facets = backend.filter_options().unwrap();
    let regions = &facets[&FilterField::Region];
    assert!(regions.iter().any(|facet| facet.value == "West"));
}
