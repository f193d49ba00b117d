//! Seam for the external feature-extraction model.
//!
//! The ranking core never looks inside an image. It asks an
//! [`EmbeddingSource`] for a vector and only checks that the vector lives in
//! the corpus' embedding space (same dimension).

use crate::{Result, Vector};

/// A face-isolated image handed over by the acquisition layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FaceImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self { bytes, width, height }
    }
}

pub trait EmbeddingSource: Send + Sync {
    /// Dimension of the vectors this source produces
    fn dimension(&self) -> usize;

    fn embed(&self, image: &FaceImage) -> Result<Vector>;
}
