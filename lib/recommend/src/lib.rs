//! # skinmatch Recommend
//!
//! Turns a ranked list of reference cases into ingredient and product
//! recommendations.
//!
//! ```text
//! RankedList ──▶ summarize_conditions ──▶ IngredientMapper ──▶ ProductMatcher
//!                                                                   ▲
//!                                          ProductCatalogView ──────┘
//!                                          (timeout, ingredient-only fallback)
//! ```
//!
//! [`Recommender`] wires the steps together behind one async call.

pub mod catalog;
pub mod config;
pub mod ingredients;
pub mod pipeline;
pub mod products;

pub use catalog::{CatalogError, InMemoryCatalog, Product, ProductCatalogView, ProductId};
pub use config::{EngineConfig, RecommendConfig};
pub use ingredients::{
    IngredientMapper, IngredientProfile, IngredientRecommendation, IngredientRole, IngredientTable,
};
pub use pipeline::{
    summarize_conditions, ConditionSummary, Recommendation, RecommendationQuery, Recommender,
};
pub use products::{canonical_ingredient, MatchOutcome, ProductMatch, ProductMatcher};
