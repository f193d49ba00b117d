//! # skinmatch
//!
//! A skin profile similarity engine.
//!
//! skinmatch keeps a corpus of labelled reference cases (an embedding, a
//! skin condition with its severity, and optional demographics), finds the
//! cases closest to a query by exact cosine similarity, re-ranks them with a
//! demographic match, and turns the result into ingredient and product
//! recommendations.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! skinmatch ingest --records corpus.json --out corpus.snapshot
//! skinmatch query --corpus corpus.snapshot --catalog products.json --query query.json
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use skinmatch::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(VectorStore::with_dimension(3).unwrap());
//! store
//!     .insert(
//!         SkinProfileRecord::new("case-1", Vector::new(vec![1.0, 0.2, 0.0]), ConditionLabel::Acne, Severity::Moderate)
//!             .with_demographics(DemographicProfile::new().with_ethnicity("A")),
//!     )
//!     .unwrap();
//!
//! let engine = RankingEngine::new(store, DemographicScorer::default(), RankingConfig::default()).unwrap();
//! let ranked = engine
//!     .rank(&Vector::new(vec![1.0, 0.2, 0.0]), &DemographicProfile::new().with_ethnicity("A"), 4, 2)
//!     .unwrap();
//! assert_eq!(ranked.results[0].condition, ConditionLabel::Acne);
//! assert!(ranked.partial);
//! ```
//!
//! ## Crate Structure
//!
//! - `skinmatch-core` - Vectors, SIMD kernels, records, the snapshot-published `VectorStore`
//! - `skinmatch-ranking` - Demographic scoring and score fusion (`RankingEngine`)
//! - `skinmatch-recommend` - Ingredient mapping, product matching, the `Recommender` pipeline
//! - `skinmatch-storage` - Checksummed corpus snapshots

// Re-export core types
pub use skinmatch_core::{
    AgeBand, CancelToken, ConditionFilter, ConditionLabel, DemographicProfile, EmbeddingSource,
    Error, ExcludeIds, FaceImage, RecordFilter, RecordId, RecordMeta, Result, SearchHit, Severity,
    SkinProfileRecord, SkinTone, StoreConfig, StoredRecord, Vector, VectorStore,
};

// Re-export ranking
pub use skinmatch_ranking::{
    AnalysisId, DemographicScorer, DemographicWeights, QueryResult, RankedList, RankingConfig,
    RankingEngine,
};

// Re-export recommendation
pub use skinmatch_recommend::{
    CatalogError, ConditionSummary, EngineConfig, InMemoryCatalog, IngredientMapper,
    IngredientRecommendation, IngredientRole, IngredientTable, MatchOutcome, Product,
    ProductCatalogView, ProductId, ProductMatch, ProductMatcher, Recommendation,
    RecommendationQuery, Recommender,
};

// Re-export storage
pub use skinmatch_storage::{CorpusSnapshot, SnapshotHeader};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CancelToken, ConditionLabel, CorpusSnapshot, DemographicProfile, DemographicScorer,
        EngineConfig, Error, InMemoryCatalog, Product, ProductCatalogView, RankedList,
        RankingConfig, RankingEngine, Recommendation, RecommendationQuery, Recommender, Result,
        Severity, SkinProfileRecord, Vector, VectorStore,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use skinmatch_core::simd::{dot_product_simd, norm_simd};
}
