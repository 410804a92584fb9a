//! Exact cosine-similarity vector store.
//!
//! Vectors are normalized to unit L2 norm when the store is built, so the
//! similarity of a unit query is a plain inner product. Search is a linear
//! scan over a contiguous `n × D` buffer; with a few thousand images this is
//! both exact and fast enough.

use crate::error::{Result, VoximError};
use std::cmp::Ordering;

/// Norms at or below this are treated as zero.
const MIN_NORM: f32 = 1e-12;

/// Normalize a vector to unit L2 norm in place.
///
/// Fails with [`VoximError::ZeroVector`] (index 0) when the norm is zero or
/// not finite; callers that know the vector's position remap the index.
pub fn normalize(vector: &mut [f32]) -> Result<()> {
    let norm = l2_norm(vector);
    if !norm.is_finite() || norm <= MIN_NORM {
        return Err(VoximError::ZeroVector { index: 0 });
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

/// Euclidean norm of a vector.
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Ranking order: score descending, then id ascending.
fn rank(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Immutable store of unit-norm vectors with ids `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorStore {
    /// Build a store from raw vectors, normalizing each one.
    ///
    /// Ids are assigned in input order.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `dimension` is zero or any vector has a different length
    /// - `ZeroVector` if a vector cannot be normalized
    pub fn build(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if dimension == 0 {
            return Err(VoximError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (index, mut vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(VoximError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            normalize(&mut vector).map_err(|_| VoximError::ZeroVector { index })?;
            data.extend_from_slice(&vector);
        }

        Ok(Self { dimension, data })
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dimension D shared by every vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored (normalized) vector for an id.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        let end = start.checked_add(self.dimension)?;
        self.data.get(start..end)
    }

    /// Iterate over `(id, vector)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f32])> {
        self.data.chunks_exact(self.dimension).enumerate()
    }

    /// Exact top-k search by inner product.
    ///
    /// `query` must be unit-norm for scores to be cosine similarities.
    /// Returns `min(top_k, size())` `(id, score)` pairs, best first, with
    /// equal scores ordered by ascending id.
    ///
    /// # Errors
    /// `DimensionMismatch` if `query.len() != dimension()`.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(VoximError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if top_k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .iter()
            .map(|(id, vector)| (id, dot(query, vector)))
            .collect();

        if top_k < scored.len() {
            scored.select_nth_unstable_by(top_k - 1, rank);
            scored.truncate(top_k);
        }
        scored.sort_unstable_by(rank);
        Ok(scored)
    }
}
