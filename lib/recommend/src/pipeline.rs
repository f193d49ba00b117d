//! End-to-end recommendation: rank, aggregate conditions, map ingredients,
//! match products.
//!
//! Only the catalog fetch leaves the process. It runs under a timeout and
//! any failure degrades to an ingredient-only response.

use crate::catalog::{CatalogError, Product, ProductCatalogView};
use crate::config::{EngineConfig, RecommendConfig};
use crate::ingredients::{IngredientMapper, IngredientRecommendation};
use crate::products::{ProductMatch, ProductMatcher};
use serde::{Deserialize, Serialize};
use skinmatch_core::{
    CancelToken, ConditionLabel, DemographicProfile, EmbeddingSource, Error, FaceImage, Result,
    Severity, Vector, VectorStore,
};
use skinmatch_ranking::{AnalysisId, DemographicScorer, QueryResult, RankedList, RankingEngine};
use std::sync::Arc;
use tracing::{debug, warn};

/// Input of one recommendation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationQuery {
    pub vector: Vector,
    #[serde(default)]
    pub demographics: DemographicProfile,
    /// Falls back to the configured `k_final`
    #[serde(default)]
    pub k_final: Option<usize>,
    /// Falls back to `k_final * candidate_multiplier`
    #[serde(default)]
    pub k_candidates: Option<usize>,
}

impl RecommendationQuery {
    pub fn new(vector: Vector, demographics: DemographicProfile) -> Self {
        Self {
            vector,
            demographics,
            k_final: None,
            k_candidates: None,
        }
    }

    pub fn with_k(mut self, k_candidates: usize, k_final: usize) -> Self {
        self.k_candidates = Some(k_candidates);
        self.k_final = Some(k_final);
        self
    }
}

/// A condition found among the ranked reference cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub condition: ConditionLabel,
    /// Highest severity among the cases with this condition
    pub severity: Severity,
    /// Rank of the best case with this condition
    pub best_rank: usize,
    pub occurrences: usize,
}

/// What the analysis store persists, keyed by `analysis_id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub analysis_id: AnalysisId,
    pub ranking: RankedList,
    pub conditions: Vec<ConditionSummary>,
    pub ingredients: Vec<IngredientRecommendation>,
    pub products: Vec<ProductMatch>,
    /// Every product contained an avoided ingredient; see `ProductMatch::contains_avoid_ingredient`
    pub avoid_fallback: bool,
    /// `false` when the catalog failed or timed out and `products` is empty for that reason
    pub catalog_available: bool,
}

/// Group ranked results by condition, ordered by best rank, capped at `max`.
pub fn summarize_conditions(results: &[QueryResult], max: usize) -> Vec<ConditionSummary> {
    let mut ordered: Vec<&QueryResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.rank);

    let mut summaries: Vec<ConditionSummary> = Vec::new();
    for result in ordered {
        match summaries.iter_mut().find(|s| s.condition == result.condition) {
            Some(summary) => {
                summary.severity = summary.severity.max(result.severity);
                summary.occurrences += 1;
            }
            None => summaries.push(ConditionSummary {
                condition: result.condition.clone(),
                severity: result.severity,
                best_rank: result.rank,
                occurrences: 1,
            }),
        }
    }
    summaries.truncate(max);
    summaries
}

pub struct Recommender {
    engine: RankingEngine,
    mapper: IngredientMapper,
    matcher: ProductMatcher,
    catalog: Arc<dyn ProductCatalogView>,
    embedder: Option<Arc<dyn EmbeddingSource>>,
    config: RecommendConfig,
}

impl Recommender {
    /// Wire a recommender from an engine config. The store must have the
    /// configured dimension.
    pub fn new(
        store: Arc<VectorStore>,
        catalog: Arc<dyn ProductCatalogView>,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        if store.dimension() != config.dimension {
            return Err(Error::InvalidConfig(format!(
                "store dimension {} does not match configured dimension {}",
                store.dimension(),
                config.dimension
            )));
        }
        let scorer = DemographicScorer::new(config.demographics)?;
        let engine = RankingEngine::new(store, scorer, config.ranking.clone())?;
        Ok(Self {
            engine,
            mapper: IngredientMapper::new(config.ingredient_table()),
            matcher: ProductMatcher::with_limit(config.recommend.product_limit),
            catalog,
            embedder: None,
            config: config.recommend.clone(),
        })
    }

    pub fn from_parts(
        engine: RankingEngine,
        mapper: IngredientMapper,
        matcher: ProductMatcher,
        catalog: Arc<dyn ProductCatalogView>,
        config: RecommendConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            mapper,
            matcher,
            catalog,
            embedder: None,
            config,
        })
    }

    pub fn with_embedding_source(mut self, source: Arc<dyn EmbeddingSource>) -> Self {
        self.embedder = Some(source);
        self
    }

    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    pub fn mapper(&self) -> &IngredientMapper {
        &self.mapper
    }

    pub fn config(&self) -> &RecommendConfig {
        &self.config
    }

    pub async fn recommend(&self, query: &RecommendationQuery, cancel: &CancelToken) -> Result<Recommendation> {
        let ranking_config = self.engine.config();
        let k_final = query.k_final.unwrap_or(ranking_config.k_final);
        let k_candidates = query
            .k_candidates
            .unwrap_or_else(|| ranking_config.candidates_for(k_final));

        let ranking = self.engine.rank_cancellable(
            &query.vector,
            &query.demographics,
            k_candidates,
            k_final,
            cancel,
        )?;

        let conditions = summarize_conditions(&ranking.results, self.config.max_conditions);
        let pairs: Vec<(ConditionLabel, Severity)> = conditions
            .iter()
            .map(|c| (c.condition.clone(), c.severity))
            .collect();
        let ingredients = self.mapper.map(&pairs);
        cancel.check()?;

        let (products, avoid_fallback, catalog_available) = match self.fetch_catalog().await {
            Ok(catalog) => {
                let outcome = self.matcher.match_products(&ingredients, &catalog);
                (outcome.matches, outcome.avoid_fallback, true)
            }
            Err(err) => {
                warn!(
                    analysis_id = %ranking.analysis_id,
                    error = %err,
                    "product catalog unavailable, returning ingredient-only recommendation"
                );
                (Vec::new(), false, false)
            }
        };
        cancel.check()?;

        debug!(
            analysis_id = %ranking.analysis_id,
            conditions = conditions.len(),
            ingredients = ingredients.len(),
            products = products.len(),
            catalog_available,
            "recommendation ready"
        );

        Ok(Recommendation {
            analysis_id: ranking.analysis_id,
            ranking,
            conditions,
            ingredients,
            products,
            avoid_fallback,
            catalog_available,
        })
    }

    /// Embed `image` with the configured source, then [`recommend`](Self::recommend)
    pub async fn recommend_image(
        &self,
        image: &FaceImage,
        demographics: DemographicProfile,
        cancel: &CancelToken,
    ) -> Result<Recommendation> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::InvalidArgument("no embedding source configured".into()))?;
        let vector = embedder.embed(image)?;
        let expected = self.engine.store().dimension();
        if vector.dim() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.dim(),
            });
        }
        cancel.check()?;
        self.recommend(&RecommendationQuery::new(vector, demographics), cancel)
            .await
    }

    async fn fetch_catalog(&self) -> std::result::Result<Vec<Product>, CatalogError> {
        let timeout = self.config.catalog_timeout();
        match tokio::time::timeout(timeout, self.catalog.fetch_products(None)).await {
            Ok(products) => products,
            Err(_) => Err(CatalogError::Timeout(timeout)),
        }
    }
}
