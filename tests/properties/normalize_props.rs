use proptest::prelude::*;

use tender_search::search::normalize::{normalize_and_merge, rescale, retain_min_similarity};
use tender_search::search::{PhraseBatch, RawHit, ScoreOrder, TenderRecord};

fn order() -> impl Strategy<Value = ScoreOrder> {
    prop_oneof![Just(ScoreOrder::HigherIsBetter), Just(ScoreOrder::LowerIsBetter)]
}

fn batch(phrase: &str, scores: &[f64]) -> PhraseBatch {
    PhraseBatch {
        phrase: phrase.to_string(),
        hits: scores
            .iter()
            .enumerate()
            .map(|(i, score)| RawHit {
                record: TenderRecord::new(format!("T-{i:03}"), format!("Tender {i}")),
                raw_score: *score,
                matched_phrase: phrase.to_string(),
            })
            .collect(),
    }
}

proptest! {
    #[test]
    fn test_rescale_stays_in_range(scores in prop::collection::vec(-50.0f64..50.0, 1..40), order in order()) {
        let scaled = rescale(&scores, order);
        prop_assert_eq!(scaled.len(), scores.len());
        for value in &scaled {
            prop_assert!((0.0..=100.0).contains(value));
        }
        prop_assert!(scaled.iter().any(|value| (*value - 100.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_best_raw_score_gets_full_similarity(scores in prop::collection::vec(0.0f64..30.0, 1..40)) {
        let scaled = rescale(&scores, ScoreOrder::HigherIsBetter);
        let best = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(index, _)| index)
            .unwrap();
        prop_assert!((scaled[best] - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_similarity_is_monotonic(
        scores in prop::collection::vec(0.0f64..30.0, 1..30),
        low in 0.0f64..100.0,
        bump in 0.0f64..50.0,
    ) {
        let hits = normalize_and_merge(vec![batch("lan", &scores)], "lan", &[], ScoreOrder::HigherIsBetter);
        let mut loose = hits.clone();
        let mut strict = hits;
        retain_min_similarity(&mut loose, low);
        retain_min_similarity(&mut strict, (low + bump).min(100.0));

        prop_assert!(strict.len() <= loose.len());
        for hit in &strict {
            prop_assert!(loose.iter().any(|other| other.record.tender_id == hit.record.tender_id));
        }
    }

    #[test]
    fn test_merge_ranking_is_input_order_independent(
        scores in prop::collection::vec(0.0f64..30.0, 1..20),
        order in order(),
    ) {
        let forward = batch("lan", &scores);
        let mut reversed = forward.clone();
        reversed.hits.reverse();

        let a = normalize_and_merge(vec![forward], "lan", &[], order);
        let b = normalize_and_merge(vec![reversed], "lan", &[], order);
        let ids = |hits: &[tender_search::search::SearchHit]| {
            hits.iter().map(|hit| hit.record.tender_id.clone()).collect::<Vec<_>>()
        };
        prop_assert_eq!(ids(&a), ids(&b));
    }
}
