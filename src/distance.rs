//! Distance metrics for vector similarity calculation.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XystonError};
use crate::util::simd;

/// Distance metrics for vector similarity calculation.
///
/// All metrics are expressed as distances: lower is more similar. Dot-product
/// similarity is negated so that ordering stays uniform across metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    #[default]
    Euclidean,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
    /// Negated dot product (higher dot product is more similar)
    DotProduct,
}

impl DistanceMetric {
    /// Calculate the distance between two vectors using this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(XystonError::invalid_argument(format!(
                "vector dimensions must match: {} vs {}",
                a.len(),
                b.len()
            )));
        }
        Ok(self.kernel(a, b))
    }

    /// Distance without the dimension check, for hot loops that validated
    /// dimensions up front.
    pub(crate) fn kernel(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => simd::l2_squared(a, b).sqrt(),
            DistanceMetric::Cosine => {
                let dot = simd::dot(a, b);
                let norm_a = simd::norm(a);
                let norm_b = simd::norm(b);
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - (dot / (norm_a * norm_b))
                }
            }
            DistanceMetric::DotProduct => -simd::dot(a, b),
        }
    }

    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::DotProduct => "dot_product",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![3.0, 4.0, 0.0];
        let d = DistanceMetric::Euclidean.distance(&a, &b).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let d = DistanceMetric::Cosine.distance(&a, &b).unwrap();
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        let d = DistanceMetric::Cosine.distance(&a, &b).unwrap();
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product_ordering() {
        let q = vec![1.0, 1.0];
        let near = vec![2.0, 2.0];
        let far = vec![0.5, 0.5];
        let metric = DistanceMetric::DotProduct;
        assert!(metric.distance(&q, &near).unwrap() < metric.distance(&q, &far).unwrap());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert!(DistanceMetric::Euclidean.distance(&a, &b).is_err());
    }
}
