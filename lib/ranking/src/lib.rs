//! # skinmatch Ranking
//!
//! Re-ranks visual nearest neighbours with demographic similarity.
//!
//! ## Features
//!
//! - **Demographic scoring**: weighted exact-match over ethnicity, skin tone and age band,
//!   normalized over the fields both profiles actually carry
//! - **Score fusion**: visual and demographic distances blended into one lower-is-better score
//! - **Deterministic order**: ties broken by corpus insertion order
//! - **Cancellation**: a ranking call can be abandoned between its steps
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use skinmatch_core::{ConditionLabel, DemographicProfile, Severity, SkinProfileRecord, Vector, VectorStore};
//! use skinmatch_ranking::{DemographicScorer, RankingConfig, RankingEngine};
//!
//! let store = Arc::new(VectorStore::with_dimension(2).unwrap());
//! store.insert(
//!     SkinProfileRecord::new("r1", Vector::new(vec![1.0, 0.0]), ConditionLabel::Acne, Severity::Mild)
//!         .with_demographics(DemographicProfile::new().with_ethnicity("A")),
//! ).unwrap();
//!
//! let engine = RankingEngine::new(store, DemographicScorer::default(), RankingConfig::default()).unwrap();
//! let ranked = engine
//!     .rank(&Vector::new(vec![1.0, 0.0]), &DemographicProfile::new().with_ethnicity("A"), 4, 2)
//!     .unwrap();
//! assert!(ranked.partial);
//! assert_eq!(ranked.results[0].rank, 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Query     │────>│ VectorStore │────>│ Candidates  │
//! │  (vector)   │     │  (cosine)   │     │ (k_cand.)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!       │                                        │
//!       │              ┌─────────────┐           │
//!       └─────────────>│ Demographic │<──────────┘
//!       (profile)      │   Scorer    │
//!                      └─────────────┘
//!                             │
//!                      ┌─────────────┐
//!                      │   Fusion    │
//!                      │ (k_final)   │
//!                      └─────────────┘
//! ```

pub mod demographic;
pub mod rerank;
pub mod results;

pub use demographic::{DemographicScore, DemographicScorer, DemographicWeights};
pub use rerank::{fuse, RankingConfig, RankingEngine};
pub use results::{AnalysisId, QueryResult, RankedList};
