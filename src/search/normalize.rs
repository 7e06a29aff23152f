//! Score normalization and cross-phrase merging.
//!
//! Raw scores are only comparable within one phrase batch, so each batch is
//! rescaled to 0-100 on its own before hits for the same record are merged.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use super::backend::ScoreOrder;
use super::types::{PhraseBatch, RawHit, SearchHit};

/// Similarity given to the best hit of every batch.
pub const MAX_SIMILARITY: f64 = 100.0;

/// Rescale, suppress anti-pattern matches, merge and rank.
///
/// A raw hit is dropped before normalization when its title contains one of
/// `anti_patterns` and the phrase it was reported for does not itself occur
/// in the title. Never fails; no batches means no hits.
pub fn normalize_and_merge(
    batches: Vec<PhraseBatch>,
    keyword: &str,
    anti_patterns: &[String],
    order: ScoreOrder,
) -> Vec<SearchHit> {
    let mut merged: HashMap<String, SearchHit> = HashMap::new();
    let mut suppressed = 0usize;

    for batch in batches {
        let before = batch.hits.len();
        let kept: Vec<RawHit> = batch
            .hits
            .into_iter()
            .filter(|hit| !is_anti_pattern_match(hit, anti_patterns))
            .collect();
        suppressed += before - kept.len();

        let scores: Vec<f64> = kept.iter().map(|hit| hit.raw_score).collect();
        let similarities = rescale(&scores, order);

        for (hit, similarity) in kept.into_iter().zip(similarities) {
            merge_hit(&mut merged, hit, similarity, keyword);
        }
    }

    if suppressed > 0 {
        debug!(suppressed, "Dropped anti-pattern matches");
    }

    let mut hits: Vec<SearchHit> = merged.into_values().collect();
    hits.sort_by(rank_order);
    hits
}

/// Linear 0-100 rescale of one batch; a flat batch maps to 100.
pub fn rescale(scores: &[f64], order: ScoreOrder) -> Vec<f64> {
    let finite = scores.iter().copied().filter(|s| s.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s), hi.max(s))
    });
    let span = max - min;

    scores
        .iter()
        .map(|&score| {
            if !score.is_finite() {
                return 0.0;
            }
            if span <= 0.0 {
                return MAX_SIMILARITY;
            }
            let distance = match order {
                ScoreOrder::HigherIsBetter => score - min,
                ScoreOrder::LowerIsBetter => max - score,
            };
            round2(MAX_SIMILARITY * distance / span)
        })
        .collect()
}

fn merge_hit(merged: &mut HashMap<String, SearchHit>, hit: RawHit, similarity: f64, keyword: &str) {
    let RawHit {
        record,
        raw_score,
        matched_phrase,
    } = hit;

    match merged.get_mut(&record.tender_id) {
        Some(existing) => {
            if similarity > existing.similarity_percent {
                existing.similarity_percent = similarity;
                existing.raw_score = raw_score;
            }
            if !existing.matched_phrases.contains(&matched_phrase) {
                existing.matched_phrases.push(matched_phrase);
            }
        }
        None => {
            let exact_match = contains_whole_word(&record.title, keyword);
            merged.insert(
                record.tender_id.clone(),
                SearchHit {
                    record,
                    raw_score,
                    similarity_percent: similarity,
                    matched_phrases: vec![matched_phrase],
                    exact_match,
                },
            );
        }
    }
}

/// Drop hits below `min_similarity`, keeping rank order.
pub fn retain_min_similarity(hits: &mut Vec<SearchHit>, min_similarity: f64) {
    hits.retain(|hit| hit.similarity_percent >= min_similarity);
}

/// Similarity descending, exact matches first, then id ascending.
pub fn rank_order(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.similarity_percent
        .total_cmp(&a.similarity_percent)
        .then_with(|| b.exact_match.cmp(&a.exact_match))
        .then_with(|| a.record.tender_id.cmp(&b.record.tender_id))
}

fn is_anti_pattern_match(hit: &RawHit, anti_patterns: &[String]) -> bool {
    let title = &hit.record.title;
    anti_patterns
        .iter()
        .any(|pattern| contains_whole_word(title, pattern))
        && !contains_whole_word(title, &hit.matched_phrase)
}

/// Case-insensitive search for `needle` bounded by non-alphanumerics.
pub fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    let step = needle.chars().next().map_or(1, char::len_utf8);
    let mut from = 0;
    // Matches can overlap, so resume one char past a rejected start.
    while let Some(offset) = haystack[from..].find(&needle) {
        let start = from + offset;
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        if !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric) {
            return true;
        }
        from = start + step;
    }
    false
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
