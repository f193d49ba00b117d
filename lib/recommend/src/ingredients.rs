//! Condition -> ingredient mapping.
//!
//! A deterministic lookup table turns the conditions found by the ranking
//! step into beneficial and avoid-listed ingredients. Severity decides how
//! conflicts between conditions resolve: an avoid entry coming from a
//! moderate or severe condition removes the same ingredient from every
//! beneficial list, while a mild condition's avoid entry yields to a
//! recommendation.

use crate::products::canonical_ingredient;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use skinmatch_core::{ConditionLabel, Severity};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientRole {
    Primary,
    Secondary,
    Avoid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRecommendation {
    pub ingredient_name: String,
    pub role: IngredientRole,
    pub source_condition: ConditionLabel,
}

/// Ingredients associated with one condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngredientProfile {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    pub avoid: Vec<String>,
}

impl IngredientProfile {
    fn new(primary: &[&str], secondary: &[&str], avoid: &[&str]) -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            primary: owned(primary),
            secondary: owned(secondary),
            avoid: owned(avoid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientTable {
    entries: HashMap<ConditionLabel, IngredientProfile>,
}

impl Default for IngredientTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IngredientTable {
    pub fn new(entries: HashMap<ConditionLabel, IngredientProfile>) -> Self {
        Self { entries }
    }

    /// Reference dermatology table
    pub fn builtin() -> Self {
        let entries = [
            (
                ConditionLabel::Acne,
                IngredientProfile::new(
                    &["salicylic_acid", "benzoyl_peroxide"],
                    &["niacinamide", "zinc_pca", "tea_tree_oil"],
                    &["coconut_oil", "isopropyl_myristate"],
                ),
            ),
            (
                ConditionLabel::Dryness,
                IngredientProfile::new(
                    &["hyaluronic_acid", "ceramides"],
                    &["glycerin", "squalane", "shea_butter"],
                    &["alcohol_denat", "sodium_lauryl_sulfate"],
                ),
            ),
            (
                ConditionLabel::Redness,
                IngredientProfile::new(
                    &["centella_asiatica", "niacinamide"],
                    &["allantoin", "panthenol"],
                    &["fragrance", "menthol"],
                ),
            ),
            (
                ConditionLabel::Hyperpigmentation,
                IngredientProfile::new(
                    &["vitamin_c", "azelaic_acid"],
                    &["niacinamide", "alpha_arbutin", "tranexamic_acid"],
                    &["bergamot_oil"],
                ),
            ),
            (
                ConditionLabel::Rosacea,
                IngredientProfile::new(
                    &["azelaic_acid", "centella_asiatica"],
                    &["ceramides", "niacinamide"],
                    &["retinol", "alcohol_denat", "fragrance", "witch_hazel", "menthol"],
                ),
            ),
            (
                ConditionLabel::Oiliness,
                IngredientProfile::new(
                    &["niacinamide", "salicylic_acid"],
                    &["zinc_pca", "kaolin"],
                    &["mineral_oil", "coconut_oil"],
                ),
            ),
            (
                ConditionLabel::Wrinkles,
                IngredientProfile::new(
                    &["retinol", "peptides"],
                    &["vitamin_c", "hyaluronic_acid"],
                    &[],
                ),
            ),
            (
                ConditionLabel::Healthy,
                IngredientProfile::new(&[], &["broad_spectrum_spf", "glycerin"], &[]),
            ),
        ];
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, condition: &ConditionLabel) -> Option<&IngredientProfile> {
        self.entries.get(condition)
    }

    pub fn insert(&mut self, condition: ConditionLabel, profile: IngredientProfile) {
        self.entries.insert(condition, profile);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngredientMapper {
    table: IngredientTable,
}

impl IngredientMapper {
    pub fn new(table: IngredientTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &IngredientTable {
        &self.table
    }

    /// Map conditions to ingredient recommendations.
    ///
    /// Output is ordered Primary, Secondary, Avoid; inside a role by input
    /// condition order, then table order. Conditions without a table entry
    /// are skipped with a warning.
    pub fn map(&self, conditions: &[(ConditionLabel, Severity)]) -> Vec<IngredientRecommendation> {
        let mut beneficial: Vec<IngredientRecommendation> = Vec::new();
        let mut beneficial_at: AHashMap<String, usize> = AHashMap::new();
        let mut avoid: Vec<(IngredientRecommendation, Severity)> = Vec::new();
        let mut avoid_at: AHashMap<String, usize> = AHashMap::new();

        for (condition, severity) in conditions {
            let Some(profile) = self.table.get(condition) else {
                warn!(%condition, "no ingredient mapping for condition, skipping");
                continue;
            };

            let roles = [
                (IngredientRole::Primary, &profile.primary),
                (IngredientRole::Secondary, &profile.secondary),
            ];
            for (role, names) in roles {
                for name in names {
                    let name = canonical_ingredient(name);
                    match beneficial_at.get(&name) {
                        Some(&at) => {
                            if role < beneficial[at].role {
                                beneficial[at].role = role;
                            }
                        }
                        None => {
                            beneficial_at.insert(name.clone(), beneficial.len());
                            beneficial.push(IngredientRecommendation {
                                ingredient_name: name,
                                role,
                                source_condition: condition.clone(),
                            });
                        }
                    }
                }
            }

            for name in &profile.avoid {
                let name = canonical_ingredient(name);
                match avoid_at.get(&name) {
                    Some(&at) => {
                        let (rec, strongest) = &mut avoid[at];
                        if *severity > *strongest {
                            *strongest = *severity;
                            rec.source_condition = condition.clone();
                        }
                    }
                    None => {
                        avoid_at.insert(name.clone(), avoid.len());
                        avoid.push((
                            IngredientRecommendation {
                                ingredient_name: name,
                                role: IngredientRole::Avoid,
                                source_condition: condition.clone(),
                            },
                            *severity,
                        ));
                    }
                }
            }
        }

        let escalated: Vec<&str> = avoid
            .iter()
            .filter(|(_, severity)| severity.escalates_avoidance())
            .map(|(rec, _)| rec.ingredient_name.as_str())
            .collect();
        beneficial.retain(|rec| !escalated.contains(&rec.ingredient_name.as_str()));

        let recommended: Vec<&str> = beneficial.iter().map(|r| r.ingredient_name.as_str()).collect();
        let avoid: Vec<IngredientRecommendation> = avoid
            .iter()
            .filter(|(rec, severity)| {
                severity.escalates_avoidance() || !recommended.contains(&rec.ingredient_name.as_str())
            })
            .map(|(rec, _)| rec.clone())
            .collect();

        let mut out: Vec<IngredientRecommendation> = Vec::with_capacity(beneficial.len() + avoid.len());
        out.extend(beneficial.iter().filter(|r| r.role == IngredientRole::Primary).cloned());
        out.extend(beneficial.iter().filter(|r| r.role == IngredientRole::Secondary).cloned());
        out.extend(avoid);
        out
    }
}
