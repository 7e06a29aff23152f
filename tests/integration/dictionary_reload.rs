use std::sync::Arc;

use tender_search::expansion::{ExpansionDictionary, SynonymExpander};
use tender_search::search::{
    OrchestratorOptions, ScoreOrder, SearchOrchestrator, SearchRequest,
};
use tender_search::test_utils::fixtures::{MockBackend, SAMPLE_DICTIONARY, UnitTestFixture};

const REVISED_DICTIONARY: &str = r"
config:
  version: '2.2'
networking:
  lan:
    expansions: [lan segment, campus network]
";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_see_whole_dictionaries_during_reload() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_dictionary();
    let expander = Arc::new(SynonymExpander::from_path(&path).unwrap());
    let backend = MockBackend::new("mock", ScoreOrder::HigherIsBetter)
        .with_hits("local area network", &[("T-1", "Local area network", 2.0)])
        .with_hits("lan segment", &[("T-2", "LAN segment upgrade", 2.0)]);
    let orchestrator = Arc::new(SearchOrchestrator::new(
        Arc::clone(&expander),
        Arc::new(backend),
        OrchestratorOptions::default(),
    ));

    let old = vec!["local area network", "vlan", "ethernet"];
    let new = vec!["lan segment", "campus network"];

    let mut searches = Vec::new();
    for _ in 0..32 {
        let orchestrator = Arc::clone(&orchestrator);
        searches.push(tokio::spawn(async move {
            orchestrator
                .search(&SearchRequest::new("lan").unwrap())
                .await
                .unwrap()
                .expanded_phrases
        }));
    }
    for round in 0..8 {
        let raw = if round % 2 == 0 { REVISED_DICTIONARY } else { SAMPLE_DICTIONARY };
        expander.reload_from_str(raw, "test").unwrap();
        tokio::task::yield_now().await;
    }

    for search in searches {
        let phrases = search.await.unwrap();
        assert!(
            phrases == old || phrases == new,
            "mixed dictionary snapshot: {phrases:?}"
        );
    }
}

#[test]
fn test_failed_file_reload_keeps_previous_dictionary() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_dictionary();
    let expander = SynonymExpander::from_path(&path).unwrap();
    let before = expander.snapshot().len();

    std::fs::write(&path, "networking: [unclosed").unwrap();
    assert!(expander.reload().is_err());
    assert_eq!(expander.snapshot().len(), before);
    assert_eq!(
        expander.expand("lan", 5).expanded_phrases,
        vec!["local area network", "vlan", "ethernet"]
    );
}

#[test]
fn test_file_reload_reports_counts() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_dictionary();
    let expander = SynonymExpander::from_path(&path).unwrap();
    let before = ExpansionDictionary::from_yaml_str(SAMPLE_DICTIONARY, "sample")
        .unwrap()
        .len();

    std::fs::write(&path, REVISED_DICTIONARY).unwrap();
    let report = expander.reload().unwrap();

    assert_eq!(report.previous_keywords, before);
    assert_eq!(report.current_keywords, 1);
    assert_eq!(report.version, "2.2");
    assert_eq!(
        expander.expand("LAN", 5).expanded_phrases,
        vec!["lan segment", "campus network"]
    );
}
