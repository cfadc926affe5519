//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types implement.
//! The trait exposes the hooks a model uses to run a layer: output-shape
//! inference, mask computation and forward computation.

use crate::error::{Error, Result};
use crate::tensor::{Mask, Shape, Tensor};

/// Core trait for neural network layers.
///
/// All layer types (Embedding, Flatten, TimeDistributed, etc.) implement this
/// trait so that a [`Sequential`](crate::model::Sequential) model can chain
/// them without knowing their concrete types.
///
/// # Masking
///
/// A mask marks which positions of the input are real data and which are
/// padding. A layer that returns `false` from [`supports_masking`] must never
/// receive a mask; the default [`compute_mask`] enforces that and otherwise
/// passes the incoming mask through unchanged.
///
/// # Example
///
/// ```ignore
/// let output = layer.forward(&input, mask.as_ref())?;
/// let output_mask = layer.compute_mask(&input, mask.as_ref())?;
/// ```
///
/// [`supports_masking`]: Layer::supports_masking
/// [`compute_mask`]: Layer::compute_mask
pub trait Layer: Send + Sync {
    /// Short layer type name used in errors and logs (e.g. `"masked_flatten"`).
    fn name(&self) -> &str;

    /// Output shape for a given input shape.
    ///
    /// # Arguments
    ///
    /// * `input_shape` - Input shape, possibly with unknown dimensions
    ///
    /// # Errors
    ///
    /// Implementations return an error when the input rank or a known dimension
    /// is incompatible with the layer.
    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape>;

    /// Whether the layer accepts an input mask.
    fn supports_masking(&self) -> bool {
        false
    }

    /// Mask to hand to the next layer.
    ///
    /// # Arguments
    ///
    /// * `input` - The input the layer is being applied to
    /// * `mask` - Incoming mask, `None` meaning "nothing is masked"
    ///
    /// # Errors
    ///
    /// The default implementation fails with [`Error::MaskingUnsupported`] when a
    /// mask reaches a layer that does not support masking.
    fn compute_mask(&self, _input: &Tensor, mask: Option<&Mask>) -> Result<Option<Mask>> {
        match mask {
            Some(_) if !self.supports_masking() => Err(Error::MaskingUnsupported {
                layer: self.name().to_string(),
            }),
            _ => Ok(mask.cloned()),
        }
    }

    /// Forward computation.
    ///
    /// # Arguments
    ///
    /// * `input` - Input tensor
    /// * `mask` - Incoming mask; layers that ignore masks may disregard it
    fn forward(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Tensor>;

    /// Get the number of trainable parameters in the layer.
    fn parameter_count(&self) -> usize {
        0
    }
}
