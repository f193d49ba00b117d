//! Product scoring against the recommended ingredient set.

use crate::catalog::{CatalogError, Product, ProductCatalogView, ProductId};
use crate::ingredients::{IngredientRecommendation, IngredientRole};
use ahash::AHashSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use tracing::debug;

/// Canonical form of an ingredient name: trimmed, lowercase, with runs of
/// whitespace, hyphens and underscores collapsed to a single `_`.
///
/// ```
/// use skinmatch_recommend::canonical_ingredient;
/// assert_eq!(canonical_ingredient("  Salicylic-Acid "), "salicylic_acid");
/// ```
pub fn canonical_ingredient(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    pub product_id: ProductId,
    /// Share of required ingredients the product contains, in [0, 1]
    pub match_score: f32,
    pub matched_ingredients: BTreeSet<String>,
    pub contains_avoid_ingredient: bool,
    pub rating: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matches: Vec<ProductMatch>,
    /// Every product contained an avoided ingredient, so none were filtered
    /// and each match carries `contains_avoid_ingredient`.
    pub avoid_fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductMatcher {
    limit: Option<usize>,
}

impl ProductMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` matches after sorting
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Fetch the whole catalog and match against it
    pub async fn match_catalog(
        &self,
        ingredients: &[IngredientRecommendation],
        catalog: &dyn ProductCatalogView,
    ) -> Result<MatchOutcome, CatalogError> {
        let products = catalog.fetch_products(None).await?;
        Ok(self.match_products(ingredients, &products))
    }

    /// Score `products` against the Primary and Secondary ingredients.
    ///
    /// Products containing an Avoid ingredient are dropped. When that would
    /// drop every product, all products are returned flagged instead.
    /// Sorted by score, then rating (unrated last), then catalog order.
    pub fn match_products(
        &self,
        ingredients: &[IngredientRecommendation],
        products: &[Product],
    ) -> MatchOutcome {
        let required: AHashSet<String> = ingredients
            .iter()
            .filter(|r| r.role != IngredientRole::Avoid)
            .map(|r| canonical_ingredient(&r.ingredient_name))
            .collect();
        let avoid: AHashSet<String> = ingredients
            .iter()
            .filter(|r| r.role == IngredientRole::Avoid)
            .map(|r| canonical_ingredient(&r.ingredient_name))
            .collect();

        let scored: Vec<(usize, ProductMatch)> = products
            .iter()
            .enumerate()
            .map(|(position, product)| (position, score_product(product, &required, &avoid)))
            .collect();

        let has_clean = scored.iter().any(|(_, m)| !m.contains_avoid_ingredient);
        let avoid_fallback = !has_clean && !scored.is_empty();
        let mut kept: Vec<(usize, ProductMatch)> = if avoid_fallback {
            scored
        } else {
            scored
                .into_iter()
                .filter(|(_, m)| !m.contains_avoid_ingredient)
                .collect()
        };

        kept.sort_by_key(|(position, m)| {
            (
                Reverse(OrderedFloat(m.match_score)),
                Reverse(m.rating.map(OrderedFloat)),
                *position,
            )
        });

        let mut matches: Vec<ProductMatch> = kept.into_iter().map(|(_, m)| m).collect();
        if let Some(limit) = self.limit {
            matches.truncate(limit);
        }

        debug!(
            products = products.len(),
            required = required.len(),
            matches = matches.len(),
            avoid_fallback,
            "matched products"
        );

        MatchOutcome {
            matches,
            avoid_fallback,
        }
    }
}

fn score_product(product: &Product, required: &AHashSet<String>, avoid: &AHashSet<String>) -> ProductMatch {
    let canonical: AHashSet<String> = product
        .ingredients
        .iter()
        .map(|name| canonical_ingredient(name))
        .collect();

    let matched_ingredients: BTreeSet<String> = canonical
        .iter()
        .filter(|name| required.contains(*name))
        .cloned()
        .collect();
    let match_score = if required.is_empty() {
        0.0
    } else {
        matched_ingredients.len() as f32 / required.len() as f32
    };

    ProductMatch {
        product_id: product.id.clone(),
        match_score,
        matched_ingredients,
        contains_avoid_ingredient: canonical.iter().any(|name| avoid.contains(name)),
        rating: product.rating.filter(|r| r.is_finite()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use skinmatch_core::ConditionLabel;

    fn rec(name: &str, role: IngredientRole) -> IngredientRecommendation {
        IngredientRecommendation {
            ingredient_name: name.to_string(),
            role,
            source_condition: ConditionLabel::Acne,
        }
    }

    fn required_pair_avoid_retinol() -> Vec<IngredientRecommendation> {
        vec![
            rec("niacinamide", IngredientRole::Primary),
            rec("salicylic_acid", IngredientRole::Secondary),
            rec("retinol", IngredientRole::Avoid),
        ]
    }

    fn ids(outcome: &MatchOutcome) -> Vec<&str> {
        outcome.matches.iter().map(|m| m.product_id.as_str()).collect()
    }

    #[test]
    fn test_canonical_ingredient() {
        assert_eq!(canonical_ingredient("Hyaluronic Acid"), "hyaluronic_acid");
        assert_eq!(canonical_ingredient("alcohol  denat"), "alcohol_denat");
        assert_eq!(canonical_ingredient("zinc__pca"), "zinc_pca");
        assert_eq!(canonical_ingredient("   "), "");
    }

    #[test]
    fn test_avoid_product_excluded_first() {
        let products = vec![
            Product::new("p1", "Toner", ["Niacinamide", "water"]),
            Product::new("p2", "Night serum", ["salicylic acid", "Retinol"]),
            Product::new("p3", "Gel", ["salicylic-acid"]),
        ];
        let outcome = ProductMatcher::new().match_products(&required_pair_avoid_retinol(), &products);
        assert!(!outcome.avoid_fallback);
        assert_eq!(ids(&outcome), vec!["p1", "p3"]);
        assert!(outcome.matches.iter().all(|m| !m.contains_avoid_ingredient));
        assert!((outcome.matches[0].match_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fallback_when_every_product_is_avoided() {
        let products = vec![Product::new("p2", "Night serum", ["salicylic acid", "retinol"])];
        let outcome = ProductMatcher::new().match_products(&required_pair_avoid_retinol(), &products);
        assert!(outcome.avoid_fallback);
        assert_eq!(ids(&outcome), vec!["p2"]);
        assert!(outcome.matches[0].contains_avoid_ingredient);
        assert_eq!(
            outcome.matches[0].matched_ingredients,
            BTreeSet::from(["salicylic_acid".to_string()])
        );
    }

    #[test]
    fn test_empty_catalog_is_not_a_fallback() {
        let outcome = ProductMatcher::new().match_products(&required_pair_avoid_retinol(), &[]);
        assert!(outcome.matches.is_empty());
        assert!(!outcome.avoid_fallback);
    }

    #[test]
    fn test_sorted_by_score_then_rating_then_order() {
        let products = vec![
            Product::new("unrated", "A", ["niacinamide"]),
            Product::new("low", "B", ["niacinamide"]).with_rating(3.0),
            Product::new("both", "C", ["niacinamide", "salicylic_acid"]),
            Product::new("high", "D", ["niacinamide"]).with_rating(4.8),
            Product::new("unrated2", "E", ["niacinamide"]),
        ];
        let outcome = ProductMatcher::new().match_products(&required_pair_avoid_retinol(), &products);
        assert_eq!(ids(&outcome), vec!["both", "high", "low", "unrated", "unrated2"]);
        assert!((outcome.matches[0].match_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_required_ingredients_scores_zero() {
        let products = vec![Product::new("p1", "A", ["niacinamide"])];
        let outcome = ProductMatcher::new().match_products(&[rec("retinol", IngredientRole::Avoid)], &products);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].match_score, 0.0);
    }

    #[test]
    fn test_limit() {
        let products: Vec<Product> = (0..10)
            .map(|i| Product::new(format!("p{}", i), "x", ["niacinamide"]))
            .collect();
        let outcome = ProductMatcher::with_limit(3).match_products(&required_pair_avoid_retinol(), &products);
        assert_eq!(ids(&outcome), vec!["p0", "p1", "p2"]);
    }

    #[tokio::test]
    async fn test_match_catalog() {
        let catalog = InMemoryCatalog::new(vec![
            Product::new("p1", "Toner", ["niacinamide"]),
            Product::new("p2", "Serum", ["retinol"]),
        ]);
        let outcome = ProductMatcher::new()
            .match_catalog(&required_pair_avoid_retinol(), &catalog)
            .await
            .unwrap();
        assert_eq!(ids(&outcome), vec!["p1"]);
    }
}
