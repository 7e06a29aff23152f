use std::collections::HashSet;

use proptest::prelude::*;

use tender_search::expansion::{CURATED_THRESHOLD, ExpansionDictionary, expand_with};
use tender_search::test_utils::fixtures::SAMPLE_DICTIONARY;

fn dictionary() -> ExpansionDictionary {
    ExpansionDictionary::from_yaml_str(SAMPLE_DICTIONARY, "sample").unwrap()
}

fn known_keyword() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["lan", "wan", "wi_fi", "api", "erp", "cloud", "security", "soc"])
        .prop_map(str::to_string)
}

proptest! {
    #[test]
    fn test_expansion_respects_max(keyword in known_keyword(), max in 1usize..8) {
        let result = expand_with(&dictionary(), &keyword, max);
        prop_assert!(!result.expanded_phrases.is_empty());
        prop_assert!(result.expanded_phrases.len() <= max);
    }

    #[test]
    fn test_expansion_phrases_are_distinct(keyword in known_keyword(), max in 1usize..8) {
        let result = expand_with(&dictionary(), &keyword, max);
        let unique: HashSet<_> = result.expanded_phrases.iter().collect();
        prop_assert_eq!(unique.len(), result.expanded_phrases.len());
        prop_assert!(result.confidence >= CURATED_THRESHOLD);
    }

    #[test]
    fn test_unknown_keyword_is_its_own_phrase(keyword in "[q-z]{6,12}") {
        let result = expand_with(&dictionary(), &keyword, 5);
        prop_assert_eq!(result.expanded_phrases, vec![keyword]);
        prop_assert!(result.confidence < CURATED_THRESHOLD);
        prop_assert_eq!(result.domain, "general");
    }

    #[test]
    fn test_expansion_is_case_insensitive(keyword in known_keyword()) {
        let dict = dictionary();
        let lower = expand_with(&dict, &keyword, 5);
        let upper = expand_with(&dict, &keyword.to_uppercase(), 5);
        prop_assert_eq!(lower.expanded_phrases, upper.expanded_phrases);
    }
}
