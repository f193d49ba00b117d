//! Re-ranking of nearest-neighbour candidates.
//!
//! The visual and demographic signals are both turned into distance-like
//! terms before they are blended, so a lower fused score is better on both
//! axes:
//!
//! ```text
//! fused = (1 - w) * (1 - visual_similarity) + w * (1 - demographic_similarity)
//! ```
//!
//! When a candidate shares no known demographic field with the query the
//! demographic term is dropped and `fused = 1 - visual_similarity`.
//!
//! The two forms are not on the same scale. With `w = 0.3` a candidate at
//! visual distance 0.1 whose demographics match at 0.5 fuses to
//! `0.7 * 0.1 + 0.3 * 0.5 = 0.22`, so it ranks below a candidate of unknown
//! demographics at visual distance 0.15. A weak demographic match can cost
//! more than no demographic information at all.

use crate::demographic::DemographicScorer;
use crate::results::{AnalysisId, QueryResult, RankedList};
use serde::{Deserialize, Serialize};
use skinmatch_core::{
    sort_with_ties, CancelToken, DemographicProfile, Error, RecordFilter, Result, ScoreOrder,
    Vector, VectorStore,
};
use std::sync::Arc;
use tracing::debug;

/// Tunables of the ranking step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Share of the demographic term in the fused score, in [0, 1]
    pub fusion_weight: f32,
    /// Candidates fetched per final result when the caller does not say
    pub candidate_multiplier: usize,
    /// Default number of final results
    pub k_final: usize,
    /// Fused scores closer than this are ties, broken by insertion order
    pub tie_epsilon: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            fusion_weight: 0.3,
            candidate_multiplier: 2,
            k_final: 10,
            tie_epsilon: 1e-6,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fusion_weight) {
            return Err(Error::InvalidConfig(format!(
                "fusion_weight must be within [0, 1], got {}",
                self.fusion_weight
            )));
        }
        if self.candidate_multiplier == 0 {
            return Err(Error::InvalidConfig("candidate_multiplier must be positive".into()));
        }
        if self.k_final == 0 {
            return Err(Error::InvalidConfig("k_final must be positive".into()));
        }
        if !self.tie_epsilon.is_finite() || self.tie_epsilon < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "tie_epsilon must be a non-negative number, got {}",
                self.tie_epsilon
            )));
        }
        Ok(())
    }

    /// Default candidate pool for `k_final` results, always larger than `k_final`
    pub fn candidates_for(&self, k_final: usize) -> usize {
        k_final
            .saturating_mul(self.candidate_multiplier)
            .max(k_final.saturating_add(1))
    }
}

/// Blend visual and demographic similarity into one lower-is-better score.
///
/// `demographic` is `None` when the profiles had nothing in common to compare.
#[inline]
pub fn fuse(visual_similarity: f32, demographic: Option<f32>, weight: f32) -> f32 {
    let visual_term = 1.0 - visual_similarity;
    match demographic {
        Some(similarity) => (1.0 - weight) * visual_term + weight * (1.0 - similarity),
        None => visual_term,
    }
}

/// Orchestrates search, demographic join and score fusion
pub struct RankingEngine {
    store: Arc<VectorStore>,
    scorer: DemographicScorer,
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(store: Arc<VectorStore>, scorer: DemographicScorer, config: RankingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, scorer, config })
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn scorer(&self) -> &DemographicScorer {
        &self.scorer
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Same engine with a different fusion weight
    pub fn with_fusion_weight(&self, weight: f32) -> Result<Self> {
        let config = RankingConfig {
            fusion_weight: weight,
            ..self.config.clone()
        };
        Self::new(Arc::clone(&self.store), self.scorer.clone(), config)
    }

    /// Rank with the configured `k_final` and candidate multiplier
    pub fn rank_default(&self, query: &Vector, demographics: &DemographicProfile) -> Result<RankedList> {
        let k_final = self.config.k_final;
        self.rank(query, demographics, self.config.candidates_for(k_final), k_final)
    }

    pub fn rank(
        &self,
        query: &Vector,
        demographics: &DemographicProfile,
        k_candidates: usize,
        k_final: usize,
    ) -> Result<RankedList> {
        self.rank_cancellable(query, demographics, k_candidates, k_final, &CancelToken::new())
    }

    /// Full ranking pass. The token is checked between the retrieval, join,
    /// fusion and ordering steps; a cancelled call returns `Cancelled` and
    /// never a truncated list.
    pub fn rank_cancellable(
        &self,
        query: &Vector,
        demographics: &DemographicProfile,
        k_candidates: usize,
        k_final: usize,
        cancel: &CancelToken,
    ) -> Result<RankedList> {
        self.rank_filtered(query, demographics, k_candidates, k_final, None, cancel)
    }

    /// [`rank_cancellable`](Self::rank_cancellable) over the records accepted
    /// by `filter` only
    pub fn rank_filtered(
        &self,
        query: &Vector,
        demographics: &DemographicProfile,
        k_candidates: usize,
        k_final: usize,
        filter: Option<&dyn RecordFilter>,
        cancel: &CancelToken,
    ) -> Result<RankedList> {
        if k_final == 0 {
            return Err(Error::InvalidArgument("k_final must be positive".into()));
        }
        let k_candidates = k_candidates.max(k_final);
        cancel.check()?;

        // 1. retrieve
        let hits = self.store.search_hits(query, k_candidates, filter)?;
        let candidates_considered = hits.len();
        cancel.check()?;

        // 2. join demographics
        let scored: Vec<_> = hits
            .into_iter()
            .map(|hit| {
                let demographic = self.scorer.score_detailed(demographics, &hit.meta.demographics);
                (hit, demographic)
            })
            .collect();
        cancel.check()?;

        // 3. fuse
        let weight = self.config.fusion_weight;
        let mut fused: Vec<(QueryResult, u64)> = scored
            .into_iter()
            .map(|(hit, demographic)| {
                let fused_score = fuse(hit.similarity, demographic.comparable(), weight);
                let result = QueryResult {
                    record_id: hit.meta.id.clone(),
                    visual_similarity: hit.similarity,
                    visual_distance: hit.distance(),
                    demographic_similarity: demographic.similarity,
                    demographics_compared: demographic.is_comparable(),
                    fused_score,
                    rank: 0,
                    condition: hit.meta.condition.clone(),
                    severity: hit.meta.severity,
                };
                (result, hit.meta.sequence)
            })
            .collect();
        cancel.check()?;

        // 4. order, cut, number
        sort_with_ties(
            &mut fused,
            ScoreOrder::Ascending,
            self.config.tie_epsilon,
            |(result, _)| result.fused_score,
            |(_, sequence)| *sequence,
        );
        fused.truncate(k_final);
        let results: Vec<QueryResult> = fused
            .into_iter()
            .enumerate()
            .map(|(i, (mut result, _))| {
                result.rank = i + 1;
                result
            })
            .collect();
        cancel.check()?;

        let ranked = RankedList {
            analysis_id: AnalysisId::new(),
            partial: results.len() < k_final,
            results,
            candidates_considered,
        };
        debug!(
            analysis_id = %ranked.analysis_id,
            k_candidates,
            k_final,
            returned = ranked.results.len(),
            partial = ranked.partial,
            "ranked candidates"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demographic::DemographicWeights;
    use skinmatch_core::{ConditionLabel, RecordId, RecordMeta, Severity, SkinProfileRecord};

    fn engine_with(records: Vec<SkinProfileRecord>, dim: usize) -> RankingEngine {
        let store = Arc::new(VectorStore::with_dimension(dim).unwrap());
        store.insert_batch(records).unwrap();
        RankingEngine::new(store, DemographicScorer::default(), RankingConfig::default()).unwrap()
    }

    fn with_ethnicity(id: &str, data: Vec<f32>, ethnicity: &str) -> SkinProfileRecord {
        SkinProfileRecord::new(id, Vector::new(data), ConditionLabel::Acne, Severity::Mild)
            .with_demographics(DemographicProfile::new().with_ethnicity(ethnicity))
    }

    #[test]
    fn test_fuse_lower_is_better() {
        // perfect visual and demographic match
        assert!(fuse(1.0, Some(1.0), 0.3).abs() < 1e-6);
        // demographics matching lowers the score
        assert!(fuse(0.8, Some(1.0), 0.3) < fuse(0.8, Some(0.0), 0.3));
        // visual similarity raising lowers the score
        assert!(fuse(0.9, Some(0.5), 0.3) < fuse(0.7, Some(0.5), 0.3));
        // missing demographics drops the term
        assert!((fuse(0.8, None, 0.3) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_monotonic_in_both_terms() {
        let weight = 0.3;
        for &(va, vb) in &[(0.9f32, 0.5f32), (0.2, -0.4), (1.0, 0.99)] {
            for &(da, db) in &[(1.0f32, 0.0f32), (0.7, 0.6), (0.5, 0.4)] {
                assert!(fuse(va, Some(da), weight) <= fuse(vb, Some(db), weight));
            }
        }
    }

    #[test]
    fn test_demographics_reorder_close_candidates() {
        let engine = engine_with(
            vec![
                with_ethnicity("closer-b", vec![1.0, 0.10], "B"),
                with_ethnicity("further-a", vec![1.0, 0.25], "A"),
            ],
            2,
        );
        let query = Vector::new(vec![1.0, 0.0]);
        let profile = DemographicProfile::new().with_ethnicity("A");

        let ranked = engine.rank(&query, &profile, 4, 2).unwrap();
        assert_eq!(ranked.results[0].record_id, RecordId::from("further-a"));
        assert_eq!(ranked.results[0].rank, 1);
        assert_eq!(ranked.results[1].rank, 2);
        assert!(ranked.results[0].visual_similarity < ranked.results[1].visual_similarity);

        // visual only: the closer vector wins
        let visual_only = engine.with_fusion_weight(0.0).unwrap();
        let ranked = visual_only.rank(&query, &profile, 4, 2).unwrap();
        assert_eq!(ranked.results[0].record_id, RecordId::from("closer-b"));
    }

    #[test]
    fn test_missing_demographics_do_not_penalize() {
        let engine = engine_with(
            vec![
                SkinProfileRecord::new("unknown", Vector::new(vec![1.0, 0.2]), ConditionLabel::Acne, Severity::Mild),
                with_ethnicity("known", vec![1.0, 0.3], "A"),
            ],
            2,
        );
        let query = Vector::new(vec![1.0, 0.0]);
        let ranked = engine.rank(&query, &DemographicProfile::new(), 4, 2).unwrap();

        for result in &ranked.results {
            assert!(!result.demographics_compared);
            assert!((result.fused_score - result.visual_distance).abs() < 1e-6);
        }
        assert_eq!(ranked.results[0].record_id, RecordId::from("unknown"));
    }

    #[test]
    fn test_partial_flag() {
        let engine = engine_with(
            vec![
                with_ethnicity("a", vec![1.0, 0.0], "A"),
                with_ethnicity("b", vec![0.0, 1.0], "A"),
            ],
            2,
        );
        let ranked = engine
            .rank(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new(), 10, 5)
            .unwrap();
        assert!(ranked.partial);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked.candidates_considered, 2);

        let ranked = engine
            .rank(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new(), 10, 2)
            .unwrap();
        assert!(!ranked.partial);
    }

    #[test]
    fn test_truncates_to_k_final() {
        let records = (0..8u64)
            .map(|i| {
                SkinProfileRecord::new(i, Vector::new(vec![1.0, i as f32]), ConditionLabel::Dryness, Severity::Mild)
            })
            .collect();
        let engine = engine_with(records, 2);
        let ranked = engine
            .rank(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new(), 6, 3)
            .unwrap();
        assert_eq!(ranked.len(), 3);
        let ranks: Vec<usize> = ranked.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        for pair in ranked.results.windows(2) {
            assert!(pair[0].fused_score <= pair[1].fused_score);
        }
    }

    #[test]
    fn test_fused_ties_follow_insertion_order() {
        let engine = engine_with(
            vec![
                with_ethnicity("first", vec![1.0, 1.0], "A"),
                with_ethnicity("second", vec![1.0, 1.0], "A"),
            ],
            2,
        );
        let ranked = engine
            .rank(&Vector::new(vec![1.0, 1.0]), &DemographicProfile::new().with_ethnicity("A"), 4, 2)
            .unwrap();
        assert_eq!(ranked.results[0].record_id, RecordId::from("first"));
        assert_eq!(ranked.results[1].record_id, RecordId::from("second"));
    }

    #[test]
    fn test_cancelled_rank_returns_cancelled() {
        let engine = engine_with(vec![with_ethnicity("a", vec![1.0, 0.0], "A")], 2);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = engine
            .rank_cancellable(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new(), 2, 1, &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_cancel_during_retrieval_returns_cancelled() {
        let engine = engine_with(
            vec![
                with_ethnicity("a", vec![1.0, 0.0], "A"),
                with_ethnicity("b", vec![0.0, 1.0], "A"),
            ],
            2,
        );
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        // the filter runs inside the store scan, after the entry check passed
        let cancelling = move |_: &RecordMeta| {
            trip.cancel();
            true
        };
        let result = engine.rank_filtered(
            &Vector::new(vec![1.0, 0.0]),
            &DemographicProfile::new(),
            2,
            2,
            Some(&cancelling as &dyn RecordFilter),
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_rank_filtered_restricts_candidates() {
        let engine = engine_with(
            vec![
                with_ethnicity("a", vec![1.0, 0.0], "A"),
                with_ethnicity("b", vec![0.9, 0.1], "A"),
            ],
            2,
        );
        let skip_a = |meta: &RecordMeta| meta.id != RecordId::from("a");
        let ranked = engine
            .rank_filtered(
                &Vector::new(vec![1.0, 0.0]),
                &DemographicProfile::new(),
                2,
                2,
                Some(&skip_a as &dyn RecordFilter),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked.results[0].record_id, RecordId::from("b"));
    }

    #[test]
    fn test_errors_propagate() {
        let engine = engine_with(vec![with_ethnicity("a", vec![1.0, 0.0], "A")], 2);
        assert!(matches!(
            engine.rank(&Vector::new(vec![1.0, 0.0, 0.0]), &DemographicProfile::new(), 2, 1),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            engine.rank(&Vector::zeros(2), &DemographicProfile::new(), 2, 1),
            Err(Error::DegenerateVector)
        ));
        assert!(matches!(
            engine.rank(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new(), 2, 0),
            Err(Error::InvalidArgument(_))
        ));

        let empty = RankingEngine::new(
            Arc::new(VectorStore::with_dimension(2).unwrap()),
            DemographicScorer::default(),
            RankingConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            empty.rank_default(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new()),
            Err(Error::EmptyIndex)
        ));
    }

    #[test]
    fn test_config_validation() {
        let store = Arc::new(VectorStore::with_dimension(2).unwrap());
        for config in [
            RankingConfig { fusion_weight: 1.5, ..Default::default() },
            RankingConfig { fusion_weight: f32::NAN, ..Default::default() },
            RankingConfig { candidate_multiplier: 0, ..Default::default() },
            RankingConfig { k_final: 0, ..Default::default() },
        ] {
            assert!(RankingEngine::new(Arc::clone(&store), DemographicScorer::default(), config).is_err());
        }
        let scorer = DemographicScorer::new(DemographicWeights::default()).unwrap();
        assert!(RankingEngine::new(store, scorer, RankingConfig::default()).is_ok());
    }

    #[test]
    fn test_candidates_for() {
        let config = RankingConfig::default();
        assert_eq!(config.candidates_for(10), 20);
        let config = RankingConfig { candidate_multiplier: 1, ..Default::default() };
        assert_eq!(config.candidates_for(10), 11);
    }
}
