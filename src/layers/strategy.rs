//! Pluggable mask and shape rules
//!
//! Layers do not hard-code how they propagate masks or infer shapes. They are
//! built from small strategy objects chosen at construction time, so a layer
//! variant is a different combination of strategies rather than a subclass.

use std::fmt;

use crate::backend::TensorAlgebra;
use crate::error::{Error, Result};
use crate::tensor::{Dim, Mask, Shape, Tensor};

/// Computes a layer's output mask.
pub trait MaskStrategy: fmt::Debug + Send + Sync {
    /// Output mask for `input` given the incoming `mask`.
    fn compute_mask(
        &self,
        algebra: &dyn TensorAlgebra,
        input: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<Option<Mask>>;
}

/// Hands the incoming mask on unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateMask;

impl MaskStrategy for PropagateMask {
    fn compute_mask(
        &self,
        _algebra: &dyn TensorAlgebra,
        _input: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<Option<Mask>> {
        Ok(mask.cloned())
    }
}

/// Ends mask propagation: the output mask is always `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumeMask;

impl MaskStrategy for ConsumeMask {
    fn compute_mask(
        &self,
        _algebra: &dyn TensorAlgebra,
        _input: &Tensor,
        _mask: Option<&Mask>,
    ) -> Result<Option<Mask>> {
        Ok(None)
    }
}

/// A position stays valid if any element along the innermost mask axis is
/// valid. `None` stays `None`.
///
/// Used when the wrapped layer collapses that axis, e.g. a recurrent encoder
/// distributed over slots: a slot whose whole sub-sequence is padding becomes
/// masked out.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyOverLastAxis;

impl MaskStrategy for AnyOverLastAxis {
    fn compute_mask(
        &self,
        algebra: &dyn TensorAlgebra,
        _input: &Tensor,
        mask: Option<&Mask>,
    ) -> Result<Option<Mask>> {
        mask.map(|mask| algebra.any(mask, -1)).transpose()
    }
}

/// Masks every input element equal to zero (the padding index).
#[derive(Debug, Clone, Copy, Default)]
pub struct NonZeroInput;

impl MaskStrategy for NonZeroInput {
    fn compute_mask(
        &self,
        algebra: &dyn TensorAlgebra,
        input: &Tensor,
        _mask: Option<&Mask>,
    ) -> Result<Option<Mask>> {
        Ok(Some(algebra.not_equal(input, 0.0)))
    }
}

/// Infers an output shape that appends a feature dimension to the input.
pub trait ShapeStrategy: fmt::Debug + Send + Sync {
    /// Output shape for `input_shape`; `features` is the appended size.
    fn output_shape(&self, layer: &str, input_shape: &Shape, features: usize) -> Result<Shape>;
}

/// Accepts any rank: `S -> S + (features,)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyRank;

impl ShapeStrategy for AnyRank {
    fn output_shape(&self, _layer: &str, input_shape: &Shape, features: usize) -> Result<Shape> {
        Ok(input_shape.with_trailing(Dim::Known(features)))
    }
}

/// Accepts only `(batch, time)` input: `(b, t) -> (b, t, features)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceOnly;

impl ShapeStrategy for SequenceOnly {
    fn output_shape(&self, layer: &str, input_shape: &Shape, features: usize) -> Result<Shape> {
        if input_shape.rank() != 2 {
            return Err(Error::RankMismatch {
                layer: layer.to_string(),
                expected: "2".to_string(),
                actual: input_shape.rank(),
            });
        }
        Ok(input_shape.with_trailing(Dim::Known(features)))
    }
}
