//! Similarity scoring and ranking for nearest-neighbor queries.
//!
//! Queries are exact: every candidate that passes the metadata pre-filter is
//! scored against the query vector, then the best `top_k` are selected. At the
//! scale this index targets (one tenant's lessons and resources) an exact scan
//! over the filtered candidates is cheaper than maintaining an ANN graph, and
//! it never drops in-scope results the way post-filtered ANN search can.
//!
//! # Score
//!
//! ```text
//! cosine_distance = 1 - cos(a, b)          ∈ [0, 2]
//! score           = clamp(1 - distance)    ∈ [0, 1]
//! ```
//!
//! 1.0 means identical direction, 0.0 means orthogonal. Opposed vectors
//! also clamp to 0.0.

use std::cmp::Ordering;

use crate::storage::ScoredRecord;

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine distance in `[0, 2]`: 0 = identical, 1 = orthogonal, 2 = opposite.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Relevance score in `[0, 1]`, computed as `1 - cosine_distance`.
#[inline]
pub fn similarity_score(a: &[f32], b: &[f32]) -> f32 {
    let score = 1.0 - cosine_distance(a, b);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// L2 normalizes a vector to unit length.
///
/// Zero vectors are returned unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Result ordering: score descending, then most recently indexed first,
/// then highest version, then composite key ascending.
///
/// The final key comparison makes the order total, so equal inputs always
/// rank identically.
pub fn compare_ranked(a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.record.indexed_at.cmp(&a.record.indexed_at))
        .then_with(|| b.record.version.cmp(&a.record.version))
        .then_with(|| a.record.key.cmp(&b.record.key))
}

/// Keeps the best `top_k` candidates, sorted by [`compare_ranked`].
///
/// Uses a partial selection first so large candidate sets are not fully
/// sorted.
pub fn select_top_k(mut candidates: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    if top_k == 0 {
        return Vec::new();
    }
    if candidates.len() > top_k {
        candidates.select_nth_unstable_by(top_k - 1, compare_ranked);
        candidates.truncate(top_k);
    }
    candidates.sort_by(compare_ranked);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::IndexedRecord;
    use crate::types::{EntityType, Metadata, Timestamp};
    use proptest::prelude::*;

    fn scored(id: &str, score: f32, indexed_at: i64, version: u64) -> ScoredRecord {
        let mut record = IndexedRecord::new(
            EntityType::Lesson,
            id,
            vec![1.0, 0.0],
            "x".into(),
            Metadata::new(),
            version,
        );
        record.indexed_at = Timestamp::from_millis(indexed_at);
        ScoredRecord { record, score }
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let v = vec![0.3, -0.2, 0.9];
        assert!((similarity_score(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors_score_zero() {
        assert!(similarity_score(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors_clamp_to_zero() {
        assert_eq!(similarity_score(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(similarity_score(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_scale_invariant() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        assert!((similarity_score(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_select_top_k_orders_by_score() {
        let ranked = select_top_k(
            vec![
                scored("a", 0.2, 1, 1),
                scored("b", 0.9, 1, 1),
                scored("c", 0.5, 1, 1),
                scored("d", 0.7, 1, 1),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|s| s.record.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
    }

    #[test]
    fn test_ties_broken_by_most_recent_first() {
        let ranked = select_top_k(
            vec![
                scored("old", 0.5, 100, 1),
                scored("new", 0.5, 300, 1),
                scored("mid", 0.5, 200, 1),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|s| s.record.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_same_timestamp_ties_broken_by_version_then_key() {
        let ranked = select_top_k(
            vec![
                scored("b", 0.5, 100, 1),
                scored("a", 0.5, 100, 1),
                scored("c", 0.5, 100, 7),
            ],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|s| s.record.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_select_top_k_fewer_candidates_than_k() {
        let ranked = select_top_k(vec![scored("a", 0.1, 1, 1)], 10);
        assert_eq!(ranked.len(), 1);
        assert!(select_top_k(vec![scored("a", 0.1, 1, 1)], 0).is_empty());
    }

    proptest! {
        #[test]
        fn prop_score_within_unit_interval(
            a in proptest::collection::vec(-100.0f32..100.0, 8),
            b in proptest::collection::vec(-100.0f32..100.0, 8),
        ) {
            let s = similarity_score(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn prop_score_symmetric(
            a in proptest::collection::vec(-10.0f32..10.0, 4),
            b in proptest::collection::vec(-10.0f32..10.0, 4),
        ) {
            prop_assert!((similarity_score(&a, &b) - similarity_score(&b, &a)).abs() < 1e-5);
        }
    }
}
