use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tolerance for the unit-length invariant.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// A dense embedding of a skin profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0.0; dim],
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        crate::simd::norm_simd(&self.data)
    }

    /// Raw inner product. Equals cosine similarity only when both operands
    /// are unit length.
    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        crate::simd::dot_product_simd(&self.data, &other.data)
    }

    /// Cosine similarity for arbitrary (non-normalized) vectors.
    /// Returns `DegenerateVector` instead of dividing by a zero norm.
    pub fn cosine_similarity(&self, other: &Vector) -> Result<f32> {
        if self.dim() != other.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        let norm_a = checked_norm(&self.data)?;
        let norm_b = checked_norm(&other.data)?;
        let dot: f64 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (f64::from(*a) / norm_a) * (f64::from(*b) / norm_b))
            .sum();
        Ok((dot as f32).clamp(-1.0, 1.0))
    }

    /// Scale the vector to unit length in place.
    ///
    /// The zero vector and vectors with non-finite components are rejected
    /// and leave the vector untouched. Tiny and very large magnitudes are
    /// fine: the norm is taken in `f64`.
    pub fn normalize(&mut self) -> Result<()> {
        let norm = checked_norm(&self.data)?;
        for x in &mut self.data {
            *x = (f64::from(*x) / norm) as f32;
        }
        Ok(())
    }

    /// Unit-length copy of this vector.
    pub fn normalized(&self) -> Result<Self> {
        let mut v = self.clone();
        v.normalize()?;
        Ok(v)
    }

    #[inline]
    pub fn is_unit(&self) -> bool {
        (self.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// Euclidean norm accumulated in `f64`, so squares of `f32` values neither
/// underflow to zero nor overflow.
fn checked_norm(data: &[f32]) -> Result<f64> {
    if data.iter().any(|x| !x.is_finite()) {
        return Err(Error::DegenerateVector);
    }
    let norm = data
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(Error::DegenerateVector);
    }
    Ok(norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_unit_length() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        v.normalize().unwrap();
        assert!(v.is_unit());
        assert!((v.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((v.as_slice()[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let mut v = Vector::zeros(4);
        assert!(matches!(v.normalize(), Err(Error::DegenerateVector)));
        assert_eq!(v, Vector::zeros(4));
    }

    #[test]
    fn test_tiny_vector_normalizes() {
        let v = Vector::new(vec![1e-8; 16]).normalized().unwrap();
        assert!(v.is_unit());
        assert!((v.as_slice()[0] - 0.25).abs() < 1e-6);

        let subnormal = Vector::new(vec![1e-40, 0.0]).normalized().unwrap();
        assert_eq!(subnormal.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_huge_vector_normalizes() {
        let v = Vector::new(vec![1e19; 16]).normalized().unwrap();
        assert!(v.is_unit());
        assert!((v.as_slice()[0] - 0.25).abs() < 1e-6);

        let a = Vector::new(vec![3e38, 3e38]);
        let b = Vector::new(vec![1.0, 1.0]);
        assert!((a.cosine_similarity(&b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_infinite_vector_is_degenerate() {
        let v = Vector::new(vec![f32::INFINITY, 1.0]);
        assert!(matches!(v.normalized(), Err(Error::DegenerateVector)));
    }

    #[test]
    fn test_nan_vector_is_degenerate() {
        let v = Vector::new(vec![f32::NAN, 1.0]);
        assert!(matches!(v.normalized(), Err(Error::DegenerateVector)));
    }

    #[test]
    fn test_cosine_similarity_ignores_magnitude() {
        let a = Vector::new(vec![1.0, 1.0, 0.0]);
        let b = Vector::new(vec![10.0, 10.0, 0.0]);
        assert!((a.cosine_similarity(&b).unwrap() - 1.0).abs() < 1e-6);

        let c = Vector::new(vec![0.0, 0.0, 5.0]);
        assert!(a.cosine_similarity(&c).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let a = Vector::new(vec![1.0, 0.0]);
        let b = Vector::new(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            a.cosine_similarity(&b),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
