use std::time::Duration;

use tempfile::TempDir;

use tender_search::app::AppContext;
use tender_search::cli::OutputMode;
use tender_search::config::{Config, Engine};
use tender_search::search::SearchRequest;
use tender_search::test_utils::fixtures::{SAMPLE_DICTIONARY, sample_records};

fn config_in(dir: &TempDir) -> Config {
    let dictionary = dir.path().join("synonyms.yaml");
    std::fs::write(&dictionary, SAMPLE_DICTIONARY).unwrap();

    let mut config = Config::default();
    config.dictionary.path = dictionary;
    config.sqlite.database_path = dir.path().join("data/tenders.db");
    config
}

#[test]
fn test_sqlite_context_searches_imported_records() {
    let dir = TempDir::new().unwrap();
    let ctx = AppContext::build(config_in(&dir), OutputMode::Robot).unwrap();
    assert!(ctx.robot_mode());

    ctx.sqlite().unwrap().index_records(&sample_records()).unwrap();
    let result = ctx
        .block_on(ctx.orchestrator.search(&SearchRequest::new("cloud").unwrap()))
        .unwrap();

    assert_eq!(result.engine_used, "sqlite");
    assert_eq!(result.hits[0].record.tender_id, "T-1006");
}

#[test]
fn test_missing_dictionary_file_uses_builtin_fallback() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.dictionary.path = dir.path().join("absent.yaml");

    let ctx = AppContext::build(config, OutputMode::Human).unwrap();
    let expansion = ctx.orchestrator.expander().expand("api", 5);

    assert!(expansion.is_curated());
    assert!(!ctx.orchestrator.expander().snapshot().is_empty());
}

#[test]
fn test_unreachable_cluster_falls_back_to_sqlite() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.search.engine = Engine::OpenSearch;
    config.search.fallback_to_sqlite = true;
    config.search.deadline = Duration::from_secs(10);
    config.opensearch.url = "http://127.0.0.1:9".to_string();
    config.opensearch.timeout = Duration::from_secs(2);

    let ctx = AppContext::build(config, OutputMode::Human).unwrap();
    ctx.sqlite().unwrap().index_records(&sample_records()).unwrap();
    assert_eq!(ctx.orchestrator.active_engine(), "opensearch");

    let result = ctx
        .block_on(ctx.orchestrator.search(&SearchRequest::new("lan").unwrap()))
        .unwrap();

    assert_eq!(result.engine_used, "sqlite");
    assert_eq!(result.total_matches, 3);
}

#[test]
fn test_unreachable_cluster_without_fallback_is_backend_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.search.engine = Engine::OpenSearch;
    config.opensearch.url = "http://127.0.0.1:9".to_string();
    config.opensearch.timeout = Duration::from_secs(2);

    let ctx = AppContext::build(config, OutputMode::Human).unwrap();
    let err = ctx
        .block_on(ctx.orchestrator.search(&SearchRequest::new("lan").unwrap()))
        .unwrap_err();

    assert_eq!(err.code(), "backend_error");
}
