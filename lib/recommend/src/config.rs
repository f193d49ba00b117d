//! Engine configuration, loaded from JSON.
//!
//! Every field has a default so an empty object `{}` is a valid config.

use crate::ingredients::IngredientTable;
use serde::{Deserialize, Serialize};
use skinmatch_core::{Error, Result, StoreConfig, DEFAULT_DIMENSION};
use skinmatch_ranking::{DemographicWeights, RankingConfig};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// Distinct conditions forwarded to the ingredient mapper
    pub max_conditions: usize,
    /// Products kept after matching
    pub product_limit: usize,
    pub catalog_timeout_ms: u64,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            max_conditions: 3,
            product_limit: 20,
            catalog_timeout_ms: 2000,
        }
    }
}

impl RecommendConfig {
    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_conditions == 0 {
            return Err(Error::InvalidConfig("max_conditions must be positive".into()));
        }
        if self.product_limit == 0 {
            return Err(Error::InvalidConfig("product_limit must be positive".into()));
        }
        if self.catalog_timeout_ms == 0 {
            return Err(Error::InvalidConfig("catalog_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dimension: usize,
    pub ranking: RankingConfig,
    pub demographics: DemographicWeights,
    pub recommend: RecommendConfig,
    /// Replaces the built-in ingredient table when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<IngredientTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            ranking: RankingConfig::default(),
            demographics: DemographicWeights::default(),
            recommend: RecommendConfig::default(),
            ingredients: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.store_config().validate()?;
        self.ranking.validate()?;
        self.demographics.validate()?;
        self.recommend.validate()
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            tie_epsilon: self.ranking.tie_epsilon,
            ..StoreConfig::with_dimension(self.dimension)
        }
    }

    pub fn ingredient_table(&self) -> IngredientTable {
        self.ingredients.clone().unwrap_or_default()
    }
}
