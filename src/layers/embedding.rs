//! Embedding layer implementation
//!
//! This module provides an EmbeddingLayer that maps integer indices to dense
//! vectors. Indices may come in a tensor of any rank: the output shape is the
//! input shape with the embedding dimension appended.

use std::sync::Arc;

use crate::backend::TensorAlgebra;
use crate::error::{Error, Result};
use crate::layers::strategy::{
    AnyRank, MaskStrategy, NonZeroInput, PropagateMask, SequenceOnly, ShapeStrategy,
};
use crate::layers::Layer;
use crate::tensor::{Mask, Shape, Tensor};
use crate::utils::SimpleRng;

/// Half-width of the uniform weight initialization range.
const INIT_LIMIT: f32 = 0.05;

/// Lookup table from indices to dense vectors.
///
/// Index values are stored in an `f32` tensor and must be integral.
///
/// # Fields
///
/// * `vocab_size` - Number of rows in the table
/// * `embedding_dim` - Length of each vector
/// * `weights` - Row-major table (vocab_size × embedding_dim)
/// * `shape_rule` - Output-shape inference (any rank by default)
/// * `mask_rule` - Output mask (propagate, or index-zero masking with `mask_zero`)
///
/// # Example
///
/// ```
/// use masked_layers::backend::{select_backend, BackendKind};
/// use masked_layers::layers::{EmbeddingLayer, Layer};
/// use masked_layers::tensor::Shape;
/// use masked_layers::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = EmbeddingLayer::new(1000, 50, select_backend(BackendKind::Graph), &mut rng);
/// let out = layer.compute_output_shape(&Shape::known(&[32, 10])).unwrap();
/// assert_eq!(out, Shape::known(&[32, 10, 50]));
/// ```
#[derive(Debug)]
pub struct EmbeddingLayer {
    vocab_size: usize,
    embedding_dim: usize,
    weights: Vec<f32>,
    shape_rule: Box<dyn ShapeStrategy>,
    mask_rule: Box<dyn MaskStrategy>,
    algebra: Arc<dyn TensorAlgebra>,
}

impl EmbeddingLayer {
    /// Create a new EmbeddingLayer with uniform initialization in [-0.05, 0.05).
    ///
    /// # Arguments
    ///
    /// * `vocab_size` - Number of distinct indices
    /// * `embedding_dim` - Size of each embedding vector
    /// * `algebra` - Backend used for mask computation
    /// * `rng` - Random number generator for weight initialization
    pub fn new(
        vocab_size: usize,
        embedding_dim: usize,
        algebra: Arc<dyn TensorAlgebra>,
        rng: &mut SimpleRng,
    ) -> Self {
        let mut weights = vec![0.0f32; vocab_size * embedding_dim];
        rng.fill_uniform(&mut weights, INIT_LIMIT);

        Self {
            vocab_size,
            embedding_dim,
            weights,
            shape_rule: Box::new(AnyRank),
            mask_rule: Box::new(PropagateMask),
            algebra,
        }
    }

    /// Create an EmbeddingLayer from a fixed `(vocab_size, embedding_dim)` table.
    pub fn from_weights(weights: Tensor, algebra: Arc<dyn TensorAlgebra>) -> Result<Self> {
        if weights.rank() != 2 {
            return Err(Error::RankMismatch {
                layer: "embedding".to_string(),
                expected: "2 (weight table)".to_string(),
                actual: weights.rank(),
            });
        }
        let vocab_size = weights.shape()[0];
        let embedding_dim = weights.shape()[1];

        Ok(Self {
            vocab_size,
            embedding_dim,
            weights: weights.into_vec(),
            shape_rule: Box::new(AnyRank),
            mask_rule: Box::new(PropagateMask),
            algebra,
        })
    }

    /// Treat index 0 as padding: the output mask is `input != 0`.
    pub fn with_mask_zero(mut self, mask_zero: bool) -> Self {
        self.mask_rule = if mask_zero {
            Box::new(NonZeroInput)
        } else {
            Box::new(PropagateMask)
        };
        self
    }

    /// Restrict input to `(batch, time)`, the classic embedding contract.
    pub fn sequence_only(self) -> Self {
        self.with_shape_strategy(Box::new(SequenceOnly))
    }

    /// Replace the output-shape rule.
    pub fn with_shape_strategy(mut self, shape_rule: Box<dyn ShapeStrategy>) -> Self {
        self.shape_rule = shape_rule;
        self
    }

    /// Get the vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Get the embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Embedding vector for `index`.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.vocab_size {
            return None;
        }
        let start = index * self.embedding_dim;
        Some(&self.weights[start..start + self.embedding_dim])
    }

    /// Row for an index stored as f32; it must be a whole number in range.
    fn lookup(&self, value: f32) -> Result<&[f32]> {
        let out_of_range = || Error::IndexOutOfRange {
            index: value,
            vocab_size: self.vocab_size,
        };
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return Err(out_of_range());
        }
        self.row(value as usize).ok_or_else(out_of_range)
    }
}

impl Layer for EmbeddingLayer {
    fn name(&self) -> &str {
        "embedding"
    }

    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        self.shape_rule
            .output_shape(self.name(), input_shape, self.embedding_dim)
    }

    fn supports_masking(&self) -> bool {
        true
    }

    fn compute_mask(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Option<Mask>> {
        self.mask_rule
            .compute_mask(self.algebra.as_ref(), input, mask)
    }

    fn forward(&self, input: &Tensor, _mask: Option<&Mask>) -> Result<Tensor> {
        let out_shape = self
            .compute_output_shape(&input.symbolic_shape())?
            .to_concrete()
            .unwrap_or_else(|| {
                let mut shape = input.shape().to_vec();
                shape.push(self.embedding_dim);
                shape
            });

        let mut data = Vec::with_capacity(input.len() * self.embedding_dim);
        for &value in input.data() {
            data.extend_from_slice(self.lookup(value)?);
        }

        Tensor::from_vec(data, &out_shape)
    }

    fn parameter_count(&self) -> usize {
        self.weights.len()
    }
}
