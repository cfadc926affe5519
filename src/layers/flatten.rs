//! Flatten layer implementation
//!
//! Collapses every non-batch dimension into one: `(b, d1, d2, ...) -> (b, d1*d2*...)`.
//!
//! The plain variant does not support masking. The masked variant zeroes every
//! masked-out position before flattening and then stops mask propagation, since
//! the usual consumer is a dense layer that has no notion of masks.

use std::sync::Arc;

use tracing::trace;

use crate::backend::{switch, TensorAlgebra};
use crate::error::{Error, Result};
use crate::layers::strategy::{ConsumeMask, MaskStrategy};
use crate::layers::Layer;
use crate::tensor::{Dim, Mask, Shape, Tensor};

/// Flatten layer, optionally mask-aware.
///
/// # Example
///
/// ```
/// use masked_layers::backend::{select_backend, BackendKind};
/// use masked_layers::layers::{FlattenLayer, Layer};
/// use masked_layers::tensor::{Mask, Tensor};
///
/// let layer = FlattenLayer::masked(select_backend(BackendKind::Symbolic));
/// let input = Tensor::ones(&[1, 2, 2]);
/// let mask = Mask::from_vec(vec![true, false], &[1, 2]).unwrap();
///
/// let out = layer.forward(&input, Some(&mask)).unwrap();
/// assert_eq!(out.data(), &[1.0, 1.0, 0.0, 0.0]);
/// assert!(layer.compute_mask(&input, Some(&mask)).unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct FlattenLayer {
    masking: Option<Masking>,
}

/// Backend and mask rule of the mask-aware variant.
#[derive(Debug)]
struct Masking {
    algebra: Arc<dyn TensorAlgebra>,
    mask_rule: Box<dyn MaskStrategy>,
}

impl FlattenLayer {
    /// Plain flatten; receiving a mask is an error.
    pub fn new() -> Self {
        Self { masking: None }
    }

    /// Mask-aware flatten: masked positions are zeroed through `algebra`'s
    /// conditional select, and the output mask is always `None`.
    pub fn masked(algebra: Arc<dyn TensorAlgebra>) -> Self {
        Self {
            masking: Some(Masking {
                algebra,
                mask_rule: Box::new(ConsumeMask),
            }),
        }
    }

    fn flatten(&self, input: &Tensor) -> Result<Tensor> {
        let Some(&batch) = input.shape().first() else {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: ">= 1".to_string(),
                actual: 0,
            });
        };
        let features = input.shape()[1..].iter().product::<usize>();
        input.reshape(&[batch, features])
    }

    fn zero_masked(&self, algebra: &dyn TensorAlgebra, input: &Tensor, mask: &Mask) -> Result<Tensor> {
        // (b, t) -> (b, t, 1) so the mask spans the feature axis.
        let cond = algebra.expand_dims(mask, -1)?;
        trace!(
            masked = mask.len() - mask.count_valid(),
            "zeroing masked positions before flatten"
        );
        switch(algebra, &cond, input, &algebra.zeros_like(input))
    }
}

impl Default for FlattenLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for FlattenLayer {
    fn name(&self) -> &str {
        if self.masking.is_some() {
            "masked_flatten"
        } else {
            "flatten"
        }
    }

    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        if input_shape.rank() == 0 {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: ">= 1".to_string(),
                actual: 0,
            });
        }
        let features = input_shape
            .product_from(1)
            .ok_or_else(|| Error::UndefinedShape {
                layer: self.name().to_string(),
                shape: input_shape.to_string(),
            })?;
        Ok(Shape::new(vec![input_shape[0], Dim::Known(features)]))
    }

    fn supports_masking(&self) -> bool {
        self.masking.is_some()
    }

    fn compute_mask(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Option<Mask>> {
        match (&self.masking, mask) {
            (Some(masking), _) => masking
                .mask_rule
                .compute_mask(masking.algebra.as_ref(), input, mask),
            (None, Some(_)) => Err(Error::MaskingUnsupported {
                layer: self.name().to_string(),
            }),
            (None, None) => Ok(None),
        }
    }

    fn forward(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Tensor> {
        match (&self.masking, mask) {
            (Some(masking), Some(mask)) => {
                let zeroed = self.zero_masked(masking.algebra.as_ref(), input, mask)?;
                self.flatten(&zeroed)
            }
            (None, Some(_)) => Err(Error::MaskingUnsupported {
                layer: self.name().to_string(),
            }),
            (_, None) => self.flatten(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{select_backend, BackendKind};

    fn arange(shape: &[usize]) -> Tensor {
        let len: usize = shape.iter().product();
        Tensor::from_vec((0..len).map(|v| v as f32 + 1.0).collect(), shape).unwrap()
    }

    #[test]
    fn test_plain_flatten() {
        let layer = FlattenLayer::new();
        let input = arange(&[2, 3, 4]);
        let out = layer.forward(&input, None).unwrap();

        assert_eq!(out.shape(), &[2, 12]);
        assert_eq!(out.data(), input.data());
        assert!(!layer.supports_masking());
        assert!(layer.masking.is_none());
        assert!(layer.compute_mask(&input, None).unwrap().is_none());
    }

    #[test]
    fn test_plain_flatten_rejects_mask() {
        let layer = FlattenLayer::new();
        let input = arange(&[2, 3, 4]);
        let mask = Mask::all_valid(&[2, 3]);

        assert!(matches!(
            layer.forward(&input, Some(&mask)),
            Err(Error::MaskingUnsupported { .. })
        ));
        assert!(matches!(
            layer.compute_mask(&input, Some(&mask)),
            Err(Error::MaskingUnsupported { .. })
        ));
    }

    #[test]
    fn test_masked_flatten_zeroes_masked_rows() {
        for kind in [BackendKind::Graph, BackendKind::Symbolic] {
            let layer = FlattenLayer::masked(select_backend(kind));
            let input = arange(&[2, 3, 4]);
            let mut valid = vec![true; 6];
            valid[1] = false; // mask[0, 1]
            let mask = Mask::from_vec(valid, &[2, 3]).unwrap();

            let out = layer.forward(&input, Some(&mask)).unwrap();
            assert_eq!(out.shape(), &[2, 12], "backend {}", kind);
            for (i, (&got, &original)) in out.data().iter().zip(input.data()).enumerate() {
                if (4..8).contains(&i) {
                    assert_eq!(got, 0.0, "backend {} index {}", kind, i);
                } else {
                    assert_eq!(got, original, "backend {} index {}", kind, i);
                }
            }
        }
    }

    #[test]
    fn test_masked_flatten_without_mask_passes_through() {
        let layer = FlattenLayer::masked(select_backend(BackendKind::Graph));
        let input = arange(&[2, 2, 2]);
        let out = layer.forward(&input, None).unwrap();
        assert_eq!(out.data(), input.data());
        assert!(layer.compute_mask(&input, None).unwrap().is_none());
    }

    #[test]
    fn test_masked_flatten_output_mask_always_none() {
        let layer = FlattenLayer::masked(select_backend(BackendKind::Symbolic));
        let input = arange(&[2, 3, 4]);
        let mask = Mask::from_vec(vec![false; 6], &[2, 3]).unwrap();
        assert!(layer.compute_mask(&input, Some(&mask)).unwrap().is_none());
    }

    #[test]
    fn test_masked_flatten_rank_mismatch_graph() {
        // Mask as wide as the input: the expanded mask no longer lines up.
        let layer = FlattenLayer::masked(select_backend(BackendKind::Graph));
        let input = arange(&[2, 3]);
        let mask = Mask::all_valid(&[2, 3]);
        assert!(layer.forward(&input, Some(&mask)).is_err());
    }

    #[test]
    fn test_output_shape() {
        let layer = FlattenLayer::masked(select_backend(BackendKind::Graph));
        let shape = Shape::from(vec![None, Some(3), Some(4)]);
        assert_eq!(
            layer.compute_output_shape(&shape).unwrap(),
            Shape::from(vec![None, Some(12)])
        );

        let undefined = Shape::from(vec![None, None, Some(4)]);
        assert!(matches!(
            layer.compute_output_shape(&undefined),
            Err(Error::UndefinedShape { .. })
        ));
    }
}
