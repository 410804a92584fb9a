//! Query encoder adapter: one search phrase in, one unit-norm vector out.

use crate::embed::encoder::{EncodeInput, Encoder};
use crate::error::{Result, VoximError};
use crate::index::store::normalize;
use std::sync::Arc;

/// Wraps an [`Encoder`] for single-phrase text queries.
///
/// Owns normalization, so the store's unit-norm invariant holds no matter
/// what the underlying model returns.
#[derive(Clone)]
pub struct QueryEncoder {
    encoder: Arc<dyn Encoder>,
    expected_dimension: Option<usize>,
}

impl QueryEncoder {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            expected_dimension: None,
        }
    }

    /// Reject vectors whose length differs from the index dimension.
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    pub fn model_name(&self) -> &str {
        self.encoder.model_name()
    }

    /// Encode one phrase into a unit vector.
    ///
    /// # Errors
    /// - `EmptyQuery` for empty or whitespace-only text
    /// - `Encoder` if the encoder fails or returns other than one vector
    /// - `DimensionMismatch` if an expected dimension is set and differs
    /// - `ZeroVector` if the returned vector cannot be normalized
    pub fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoximError::EmptyQuery);
        }

        let mut vectors = self.encoder.encode_batch(&[EncodeInput::text(text)])?;
        if vectors.len() != 1 {
            return Err(VoximError::Encoder {
                message: format!("expected 1 query vector, got {}", vectors.len()),
            });
        }
        let mut vector = vectors.remove(0);

        if let Some(expected) = self.expected_dimension
            && vector.len() != expected
        {
            return Err(VoximError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        normalize(&mut vector)?;
        Ok(vector)
    }
}
