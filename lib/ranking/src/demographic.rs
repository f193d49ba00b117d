//! Demographic similarity between two profiles.
//!
//! Each field is a flat categorical attribute compared by exact match. The
//! score is the weighted share of matching fields among the fields known on
//! *both* sides; unknown fields contribute to neither numerator nor
//! denominator.

use serde::{Deserialize, Serialize};
use skinmatch_core::{DemographicProfile, Error, Result};

/// Per-field weights of the demographic score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicWeights {
    pub ethnicity: f32,
    pub skin_type: f32,
    pub age_band: f32,
}

impl Default for DemographicWeights {
    fn default() -> Self {
        Self {
            ethnicity: 0.6,
            skin_type: 0.3,
            age_band: 0.1,
        }
    }
}

impl DemographicWeights {
    /// Weights must be finite, non-negative and not all zero.
    /// They do not need to sum to one: scores are normalized per comparison.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("ethnicity", self.ethnicity),
            ("skin_type", self.skin_type),
            ("age_band", self.age_band),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "demographic weight '{}' must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if self.ethnicity + self.skin_type + self.age_band <= 0.0 {
            return Err(Error::InvalidConfig(
                "demographic weights cannot all be zero".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of comparing two profiles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemographicScore {
    /// Weighted match ratio in [0, 1]; 0.0 when nothing was comparable
    pub similarity: f32,
    /// Sum of the weights of the fields known on both sides
    pub compared_weight: f32,
}

impl DemographicScore {
    pub const NOT_COMPARABLE: DemographicScore = DemographicScore {
        similarity: 0.0,
        compared_weight: 0.0,
    };

    #[inline]
    pub fn is_comparable(&self) -> bool {
        self.compared_weight > 0.0
    }

    /// The similarity if at least one field could be compared
    #[inline]
    pub fn comparable(&self) -> Option<f32> {
        self.is_comparable().then_some(self.similarity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DemographicScorer {
    weights: DemographicWeights,
}

impl DemographicScorer {
    pub fn new(weights: DemographicWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &DemographicWeights {
        &self.weights
    }

    /// Similarity in [0, 1]. Profiles with no field in common score 0.0;
    /// use [`score_detailed`](Self::score_detailed) to tell that apart from a
    /// genuine mismatch.
    pub fn score(&self, a: &DemographicProfile, b: &DemographicProfile) -> f32 {
        self.score_detailed(a, b).similarity
    }

    pub fn score_detailed(&self, a: &DemographicProfile, b: &DemographicProfile) -> DemographicScore {
        let mut matched = 0.0f32;
        let mut compared = 0.0f32;

        let mut compare = |weight: f32, is_match: Option<bool>| {
            if let Some(is_match) = is_match {
                compared += weight;
                if is_match {
                    matched += weight;
                }
            }
        };

        compare(
            self.weights.ethnicity,
            both(a.known_ethnicity(), b.known_ethnicity()).map(|(x, y)| categories_match(x, y)),
        );
        compare(
            self.weights.skin_type,
            both(a.skin_type, b.skin_type).map(|(x, y)| x == y),
        );
        compare(
            self.weights.age_band,
            both(a.age_band, b.age_band).map(|(x, y)| x == y),
        );

        if compared <= 0.0 {
            return DemographicScore::NOT_COMPARABLE;
        }
        DemographicScore {
            similarity: (matched / compared).clamp(0.0, 1.0),
            compared_weight: compared,
        }
    }
}

#[inline]
fn both<T>(a: Option<T>, b: Option<T>) -> Option<(T, T)> {
    a.zip(b)
}

/// Flat, case-insensitive category comparison. Regional sub-groupings are
/// distinct categories.
fn categories_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
