//! # skinmatch Core
//!
//! Core data structures for the skinmatch similarity engine.
//!
//! - [`Vector`] - Dense embedding with SIMD inner product
//! - [`SkinProfileRecord`] - A labelled reference case (vector, condition, demographics)
//! - [`VectorStore`] - Append-only, snapshot-published corpus with exact cosine search
//! - [`CancelToken`] - Cooperative cancellation for long queries
//! - [`EmbeddingSource`] - Seam for the external feature extractor
//!
//! ## Example
//!
//! ```rust
//! use skinmatch_core::{ConditionLabel, Severity, SkinProfileRecord, Vector, VectorStore};
//!
//! let store = VectorStore::with_dimension(3).unwrap();
//! store
//!     .insert(SkinProfileRecord::new(
//!         "case-1",
//!         Vector::new(vec![1.0, 0.0, 0.0]),
//!         ConditionLabel::Acne,
//!         Severity::Moderate,
//!     ))
//!     .unwrap();
//!
//! let results = store.search(&Vector::new(vec![2.0, 0.0, 0.0]), 5).unwrap();
//! assert!((results[0].1 - 1.0).abs() < 1e-6);
//! ```

pub mod cancel;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod order;
pub mod record;
pub mod store;
pub mod vector;

/// SIMD-optimized vector operations
///
/// - AVX2/FMA on x86_64
/// - NEON on ARM64/Apple Silicon
/// - two-accumulator scalar fallback elsewhere
pub mod simd;

pub use cancel::CancelToken;
pub use embedding::{EmbeddingSource, FaceImage};
pub use error::{Error, Result};
pub use filter::{ConditionFilter, ExcludeIds, RecordFilter};
pub use order::{sort_with_ties, top_k_with_ties, ScoreOrder};
pub use record::{
    AgeBand, ConditionLabel, DemographicProfile, RecordId, RecordMeta, Severity, SkinProfileRecord,
    SkinTone,
};
pub use store::{SearchHit, StoreConfig, StoredRecord, VectorStore, DEFAULT_DIMENSION};
pub use vector::{Vector, UNIT_NORM_TOLERANCE};
