//! Sequential model
//!
//! Runs layers in order, threading both the tensor and its mask from one layer
//! to the next. This is where masking support is enforced: a mask may only
//! reach a layer that declares `supports_masking`.

use tracing::debug;

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{Mask, Shape, Tensor};

/// A container that chains layers together.
///
/// # Example
///
/// ```
/// use masked_layers::backend::{select_backend, BackendKind};
/// use masked_layers::layers::{DenseLayer, FlattenLayer};
/// use masked_layers::model::Sequential;
/// use masked_layers::tensor::{Mask, Tensor};
/// use masked_layers::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let model = Sequential::new()
///     .add(FlattenLayer::masked(select_backend(BackendKind::Graph)))
///     .add(DenseLayer::new(6, 2, &mut rng));
///
/// let input = Tensor::ones(&[1, 3, 2]);
/// let mask = Mask::from_vec(vec![true, true, false], &[1, 3]).unwrap();
/// let (output, output_mask) = model.forward(&input, Some(&mask)).unwrap();
/// assert_eq!(output.shape(), &[1, 2]);
/// assert!(output_mask.is_none());
/// ```
#[derive(Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    /// Creates a new empty model.
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Adds a layer (builder pattern).
    pub fn add<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Pushes an already boxed layer.
    pub fn push(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    /// Returns the number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in execution order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    /// Total number of trainable parameters.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    /// Chains output-shape inference through every layer.
    pub fn output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        self.layers
            .iter()
            .try_fold(input_shape.clone(), |shape, layer| layer.compute_output_shape(&shape))
    }

    /// Runs every layer, returning the final output and mask.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::MaskingUnsupported`] when a mask is present in front
    /// of a layer that does not support masking, and propagates any layer error.
    pub fn forward(&self, input: &Tensor, mask: Option<&Mask>) -> Result<(Tensor, Option<Mask>)> {
        let mut current = input.clone();
        let mut current_mask = mask.cloned();

        for (index, layer) in self.layers.iter().enumerate() {
            if current_mask.is_some() && !layer.supports_masking() {
                return Err(Error::MaskingUnsupported {
                    layer: format!("{} (#{})", layer.name(), index),
                });
            }

            let output = layer.forward(&current, current_mask.as_ref())?;
            let output_mask = layer.compute_mask(&current, current_mask.as_ref())?;

            debug!(
                index,
                layer = layer.name(),
                input = ?current.shape(),
                output = ?output.shape(),
                mask = ?output_mask.as_ref().map(|mask| mask.shape().to_vec()),
                "layer applied"
            );

            current = output;
            current_mask = output_mask;
        }

        Ok((current, current_mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{select_backend, BackendKind};
    use crate::layers::{DenseLayer, EmbeddingLayer, FlattenLayer};
    use crate::utils::SimpleRng;

    #[test]
    fn test_empty_model_is_identity() {
        let model = Sequential::new();
        let input = Tensor::ones(&[2, 2]);
        let mask = Mask::all_valid(&[2]);
        let (out, out_mask) = model.forward(&input, Some(&mask)).unwrap();
        assert_eq!(out, input);
        assert_eq!(out_mask, Some(mask));
        assert!(model.is_empty());
    }

    #[test]
    fn test_mask_reaching_dense_is_rejected() {
        let mut rng = SimpleRng::new(1);
        let algebra = select_backend(BackendKind::Graph);
        let model = Sequential::new()
            .add(
                EmbeddingLayer::new(5, 2, algebra, &mut rng)
                    .with_mask_zero(true),
            )
            .add(FlattenLayer::new())
            .add(DenseLayer::new(6, 1, &mut rng));

        let input = Tensor::from_vec(vec![1.0, 2.0, 0.0], &[1, 3]).unwrap();
        let err = model.forward(&input, None).err().unwrap();
        assert!(matches!(err, Error::MaskingUnsupported { layer } if layer.starts_with("flatten")));
    }

    #[test]
    fn test_output_shape_chain() {
        let mut rng = SimpleRng::new(1);
        let algebra = select_backend(BackendKind::Symbolic);
        let model = Sequential::new()
            .add(EmbeddingLayer::new(5, 2, algebra.clone(), &mut rng))
            .add(FlattenLayer::masked(algebra))
            .add(DenseLayer::new(6, 4, &mut rng));

        let shape = model
            .output_shape(&Shape::from(vec![None, Some(3)]))
            .unwrap();
        assert_eq!(shape, Shape::from(vec![None, Some(4)]));
        assert_eq!(model.len(), 3);
        assert_eq!(model.layer_names(), vec!["embedding", "masked_flatten", "dense"]);
        assert_eq!(model.parameter_count(), 5 * 2 + 6 * 4 + 4);
    }
}
