//! Output structures of a ranking call

use serde::{Deserialize, Serialize};
use skinmatch_core::{ConditionLabel, RecordId, Severity};
use std::fmt;
use uuid::Uuid;

/// Identifier under which the caller persists an analysis.
///
/// Generated by the engine for every successful ranking, so a result can never
/// reach the analysis store without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One ranked reference case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub record_id: RecordId,
    /// Cosine similarity of the query and the reference vector
    pub visual_similarity: f32,
    /// `1 - visual_similarity`, in [0, 2]
    pub visual_distance: f32,
    /// Weighted demographic match in [0, 1]; 0.0 when nothing was comparable
    pub demographic_similarity: f32,
    /// Whether the demographic term took part in the fused score
    pub demographics_compared: bool,
    /// Lower is better
    pub fused_score: f32,
    /// 1-based
    pub rank: usize,
    pub condition: ConditionLabel,
    pub severity: Severity,
}

/// Ordered candidates of one ranking call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedList {
    pub analysis_id: AnalysisId,
    pub results: Vec<QueryResult>,
    /// Fewer than `k_final` candidates were available
    pub partial: bool,
    /// How many nearest neighbours were re-ranked
    pub candidates_considered: usize,
}

impl RankedList {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn top(&self) -> Option<&QueryResult> {
        self.results.first()
    }

    pub fn ids(&self) -> Vec<&RecordId> {
        self.results.iter().map(|r| &r.record_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_ids_are_unique() {
        assert_ne!(AnalysisId::new(), AnalysisId::new());
    }

    #[test]
    fn test_analysis_id_serializes_as_plain_uuid() {
        let id = AnalysisId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
