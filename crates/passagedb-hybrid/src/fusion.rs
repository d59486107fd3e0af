//! Reciprocal rank fusion.
//!
//! A record at 1-based rank `r` in a list contributes `1 / (k + r)`. Hybrid
//! results are the full outer join of both lists on record id with the two
//! contributions summed; a record missing from a list gets 0 from it. Output
//! is ordered by combined score descending, then id ascending.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use passagedb_core::config::RetrievalSettings;
use passagedb_core::types::{FusedResult, RankedCandidate, RecordId, RetrievalSource, StoreHit};

pub const DEFAULT_RRF_K: f64 = 60.0;
pub const DEFAULT_OVERSAMPLE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfParams {
    /// Smoothing constant; larger values flatten the gap between ranks.
    pub k: f64,
    /// Hybrid mode pulls `oversample * top_k` candidates from each source.
    pub oversample: usize,
}

impl Default for RrfParams {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K, oversample: DEFAULT_OVERSAMPLE }
    }
}

impl From<&RetrievalSettings> for RrfParams {
    fn from(s: &RetrievalSettings) -> Self {
        Self { k: s.rrf_k, oversample: s.oversample }
    }
}

impl RrfParams {
    pub fn pool_size(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.oversample.max(1))
    }
}

pub fn rrf_contribution(k: f64, rank: usize) -> f64 {
    1.0 / (k + rank as f64)
}

/// Turns a store's ordered hits into 1-based ranked candidates.
///
/// If the store repeats an id, the first (best ranked) occurrence wins and
/// later ones are dropped; the remaining candidates keep their list position.
pub fn rank_candidates(hits: Vec<StoreHit>, source: RetrievalSource) -> Vec<RankedCandidate> {
    let mut seen = HashSet::with_capacity(hits.len());
    hits.into_iter()
        .enumerate()
        .filter(|(_, h)| seen.insert(h.id))
        .map(|(i, h)| RankedCandidate { id: h.id, content: h.content, rank: i + 1, raw_score: h.score, source })
        .collect()
}

fn by_score_then_id(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.combined_score.total_cmp(&a.combined_score).then(a.id.cmp(&b.id))
}

fn single(candidate: &RankedCandidate, params: &RrfParams) -> FusedResult {
    let (semantic_rank, lexical_rank) = match candidate.source {
        RetrievalSource::Semantic => (Some(candidate.rank), None),
        RetrievalSource::Lexical => (None, Some(candidate.rank)),
    };
    FusedResult {
        id: candidate.id,
        content: candidate.content.clone(),
        combined_score: rrf_contribution(params.k, candidate.rank),
        semantic_rank,
        lexical_rank,
    }
}

/// Scores a single list the way fusion scores it, for the one-source modes.
pub fn score_single(candidates: &[RankedCandidate], params: &RrfParams, top_k: usize) -> Vec<FusedResult> {
    let mut best: BTreeMap<RecordId, FusedResult> = BTreeMap::new();
    for c in candidates {
        best.entry(c.id).or_insert_with(|| single(c, params));
    }
    let mut out: Vec<FusedResult> = best.into_values().collect();
    out.sort_by(by_score_then_id);
    out.truncate(top_k);
    out
}

/// Full outer join of both lists on id with summed RRF contributions.
///
/// Content is taken from the semantic candidate when a record appears in
/// both lists.
pub fn fuse(
    semantic: &[RankedCandidate],
    lexical: &[RankedCandidate],
    params: &RrfParams,
    top_k: usize,
) -> Vec<FusedResult> {
    let mut merged: BTreeMap<RecordId, FusedResult> = BTreeMap::new();
    for c in semantic {
        merged.entry(c.id).or_insert_with(|| single(c, params));
    }
    for c in lexical {
        match merged.get_mut(&c.id) {
            Some(existing) if existing.lexical_rank.is_none() => {
                existing.combined_score += rrf_contribution(params.k, c.rank);
                existing.lexical_rank = Some(c.rank);
            }
            Some(_) => {}
            None => {
                merged.insert(c.id, single(c, params));
            }
        }
    }
    let mut out: Vec<FusedResult> = merged.into_values().collect();
    out.sort_by(by_score_then_id);
    out.truncate(top_k);
    tracing::debug!(semantic = semantic.len(), lexical = lexical.len(), fused = out.len(), "rank fusion");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(ids: &[RecordId]) -> Vec<StoreHit> {
        ids.iter().map(|&id| StoreHit { id, content: format!("passage {id}"), score: 0.0 }).collect()
    }

    fn sem(ids: &[RecordId]) -> Vec<RankedCandidate> {
        rank_candidates(hits(ids), RetrievalSource::Semantic)
    }

    fn lex(ids: &[RecordId]) -> Vec<RankedCandidate> {
        rank_candidates(hits(ids), RetrievalSource::Lexical)
    }

    fn ids(results: &[FusedResult]) -> Vec<RecordId> {
        results.iter().map(|r| r.id).collect()
    }

    const P: RrfParams = RrfParams { k: 60.0, oversample: 2 };

    #[test]
    fn worked_example_orders_three_one_four_two() {
        let out = fuse(&sem(&[1, 2, 3]), &lex(&[3, 4]), &P, 10);
        assert_eq!(ids(&out), vec![3, 1, 4, 2]);
        assert!((out[0].combined_score - (1.0 / 63.0 + 1.0 / 60.0)).abs() < 1e-12);
        assert_eq!(out[1].combined_score, 1.0 / 61.0);
        assert_eq!(out[2].combined_score, 1.0 / 61.0);
        assert_eq!(out[3].combined_score, 1.0 / 62.0);
        assert_eq!((out[0].semantic_rank, out[0].lexical_rank), (Some(3), Some(1)));
        assert_eq!((out[2].semantic_rank, out[2].lexical_rank), (None, Some(2)));
    }

    #[test]
    fn disjoint_lists_are_the_union_by_single_list_score() {
        let out = fuse(&sem(&[10, 11, 12]), &lex(&[20, 21]), &P, 10);
        // rank 1s tie, then rank 2s tie, then 12
        assert_eq!(ids(&out), vec![10, 20, 11, 21, 12]);
        for r in &out {
            let rank = r.semantic_rank.or(r.lexical_rank).unwrap();
            assert_eq!(r.combined_score, rrf_contribution(60.0, rank));
        }
        assert_eq!(ids(&fuse(&sem(&[10, 11, 12]), &lex(&[20, 21]), &P, 3)), vec![10, 20, 11]);
    }

    #[test]
    fn full_overlap_doubles_each_contribution() {
        let list = [7, 3, 9, 1];
        let out = fuse(&sem(&list), &lex(&list), &P, 10);
        assert_eq!(ids(&out), list.to_vec());
        for (i, r) in out.iter().enumerate() {
            let expected = 2.0 / (60.0 + (i + 1) as f64);
            assert!((r.combined_score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn combined_score_never_exceeds_rank_one_bound() {
        let bound = 2.0 / 61.0;
        let out = fuse(&sem(&[5, 4, 3, 2, 1]), &lex(&[1, 2, 3, 4, 5, 6]), &P, 10);
        assert!(out.iter().all(|r| r.combined_score <= bound));
        let agree = fuse(&sem(&[8]), &lex(&[8]), &P, 1);
        assert_eq!(agree[0].combined_score, 1.0 / 61.0 + 1.0 / 61.0);
    }

    #[test]
    fn fusion_is_deterministic() {
        let a = fuse(&sem(&[4, 8, 15, 16]), &lex(&[23, 42, 8, 4]), &P, 10);
        let b = fuse(&sem(&[4, 8, 15, 16]), &lex(&[23, 42, 8, 4]), &P, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_and_single_element_lists() {
        assert!(fuse(&[], &[], &P, 10).is_empty());
        let only_lex = fuse(&[], &lex(&[5]), &P, 10);
        assert_eq!(ids(&only_lex), vec![5]);
        assert_eq!(only_lex[0].combined_score, 1.0 / 61.0);
        let only_sem = fuse(&sem(&[6]), &[], &P, 10);
        assert_eq!(only_sem[0].semantic_rank, Some(1));
        assert!(fuse(&sem(&[1]), &lex(&[2]), &P, 0).is_empty());
    }

    #[test]
    fn duplicate_id_keeps_best_rank() {
        let c = sem(&[3, 5, 3]);
        assert_eq!(c.len(), 2);
        assert_eq!((c[0].id, c[0].rank), (3, 1));
        assert_eq!((c[1].id, c[1].rank), (5, 2));
        let out = fuse(&c, &lex(&[5, 5]), &P, 10);
        assert_eq!(out[0].id, 5);
        assert_eq!(out[0].combined_score, 1.0 / 62.0 + 1.0 / 61.0);
    }

    #[test]
    fn semantic_content_wins_on_overlap() {
        let s = rank_candidates(vec![StoreHit { id: 1, content: "vector copy".into(), score: 0.1 }], RetrievalSource::Semantic);
        let l = rank_candidates(vec![StoreHit { id: 1, content: "lexical copy".into(), score: 9.0 }], RetrievalSource::Lexical);
        assert_eq!(fuse(&s, &l, &P, 1)[0].content, "vector copy");
    }

    #[test]
    fn single_list_scoring_matches_fusion_of_one_list() {
        let c = lex(&[9, 2, 7]);
        assert_eq!(score_single(&c, &P, 2), fuse(&[], &c, &P, 2));
    }

    #[test]
    fn smaller_k_widens_rank_gaps() {
        let tight = RrfParams { k: 1.0, oversample: 2 };
        assert_eq!(rrf_contribution(tight.k, 1), 0.5);
        assert_eq!(P.pool_size(10), 20);
        assert_eq!(RrfParams { k: 60.0, oversample: 0 }.pool_size(5), 5);
    }
}
