//! Time-distribution wrapper
//!
//! Applies an inner layer independently at every position of the time axis
//! (axis 1). The batch and time axes are merged, the inner layer runs once on
//! `(batch * time, ...)`, and the result is split back into `(batch, time, ...)`.

use std::sync::Arc;

use tracing::debug;

use crate::backend::TensorAlgebra;
use crate::error::{Error, Result};
use crate::layers::strategy::{AnyOverLastAxis, MaskStrategy};
use crate::layers::Layer;
use crate::tensor::{Array, Mask, Shape, Tensor};

/// Wraps a layer so that it is applied to every timestep.
///
/// Without a mask override, an incoming mask must be aligned with the
/// `(batch, time)` axes. If the inner layer consumes it, the output mask is
/// whatever the inner layer reports, split back per timestep. Otherwise the
/// mask passes through unchanged, so padded timesteps stay masked. [`TimeDistributed::rnn`]
/// instead reduces the incoming mask with a logical OR over its innermost axis,
/// for inner layers (recurrent encoders) that collapse that axis and report no
/// mask of their own.
///
/// # Example
///
/// ```
/// use masked_layers::backend::{select_backend, BackendKind};
/// use masked_layers::layers::{Layer, SimpleRnnLayer, TimeDistributed};
/// use masked_layers::tensor::{Mask, Tensor};
/// use masked_layers::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(7);
/// let encoder = SimpleRnnLayer::new(3, 4, &mut rng);
/// let layer = TimeDistributed::rnn(Box::new(encoder), select_backend(BackendKind::Graph));
///
/// // batch 1, 2 slots, 2 words per slot, 3 features per word
/// let input = Tensor::ones(&[1, 2, 2, 3]);
/// let mask = Mask::from_vec(vec![true, false, false, false], &[1, 2, 2]).unwrap();
///
/// let out = layer.forward(&input, Some(&mask)).unwrap();
/// assert_eq!(out.shape(), &[1, 2, 4]);
/// let slot_mask = layer.compute_mask(&input, Some(&mask)).unwrap().unwrap();
/// assert_eq!(slot_mask.data(), &[true, false]);
/// ```
pub struct TimeDistributed {
    inner: Box<dyn Layer>,
    algebra: Arc<dyn TensorAlgebra>,
    mask_override: Option<Box<dyn MaskStrategy>>,
}

impl TimeDistributed {
    /// Wraps `inner`; the output mask comes from the inner layer.
    pub fn new(inner: Box<dyn Layer>, algebra: Arc<dyn TensorAlgebra>) -> Self {
        Self {
            inner,
            algebra,
            mask_override: None,
        }
    }

    /// Wraps `inner` and computes the output mask with `strategy`.
    pub fn with_mask_strategy(
        inner: Box<dyn Layer>,
        algebra: Arc<dyn TensorAlgebra>,
        strategy: Box<dyn MaskStrategy>,
    ) -> Self {
        Self {
            inner,
            algebra,
            mask_override: Some(strategy),
        }
    }

    /// Wraps a recurrent layer that does not return sequences. A timestep stays
    /// valid if any element of its sub-sequence was valid.
    pub fn rnn(inner: Box<dyn Layer>, algebra: Arc<dyn TensorAlgebra>) -> Self {
        Self::with_mask_strategy(inner, algebra, Box::new(AnyOverLastAxis))
    }

    /// The wrapped layer.
    pub fn inner(&self) -> &dyn Layer {
        self.inner.as_ref()
    }

    fn split_leading(&self, shape: &[usize]) -> Result<(usize, usize)> {
        if shape.len() < 3 {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: ">= 3".to_string(),
                actual: shape.len(),
            });
        }
        Ok((shape[0], shape[1]))
    }

    /// `(b, t, rest...) -> (b * t, rest...)`
    fn merge_time<T: Copy>(array: &Array<T>) -> Result<Array<T>> {
        let shape = array.shape();
        let mut merged = vec![shape[0] * shape[1]];
        merged.extend_from_slice(&shape[2..]);
        array.reshape(&merged)
    }

    /// `(b * t, rest...) -> (b, t, rest...)`
    fn split_time<T: Copy>(
        &self,
        array: &Array<T>,
        batch: usize,
        time: usize,
    ) -> Result<Array<T>> {
        let shape = array.shape();
        if shape.first() != Some(&(batch * time)) {
            return Err(Error::ShapeMismatch {
                expected: vec![batch * time],
                actual: shape.to_vec(),
            });
        }
        let mut split = vec![batch, time];
        split.extend_from_slice(&shape[1..]);
        array.reshape(&split)
    }

    /// Decides where an incoming mask goes. A mask must start with the
    /// `(batch, time)` axes. It is handed to the inner layer when it also
    /// covers an inner axis and the inner layer accepts masks; otherwise it
    /// bypasses the inner layer and stays attached to the output timesteps.
    fn route_mask(&self, mask: Option<&Mask>, batch: usize, time: usize) -> Result<MaskRoute> {
        let Some(mask) = mask else {
            return Ok(MaskRoute::Absent);
        };
        if mask.rank() < 2 || mask.shape()[..2] != [batch, time] {
            return Err(Error::MaskingUnsupported {
                layer: format!("{} (mask shape {:?})", self.name(), mask.shape()),
            });
        }
        if mask.rank() >= 3 && self.inner.supports_masking() {
            Ok(MaskRoute::Inner(Self::merge_time(mask)?))
        } else {
            Ok(MaskRoute::Bypass)
        }
    }
}

/// Where an incoming mask is routed by [`TimeDistributed`].
enum MaskRoute {
    Absent,
    Inner(Mask),
    Bypass,
}

impl MaskRoute {
    fn inner_mask(&self) -> Option<&Mask> {
        match self {
            MaskRoute::Inner(mask) => Some(mask),
            _ => None,
        }
    }
}

impl Layer for TimeDistributed {
    fn name(&self) -> &str {
        if self.mask_override.is_some() {
            "time_distributed_rnn"
        } else {
            "time_distributed"
        }
    }

    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        if input_shape.rank() < 3 {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: ">= 3".to_string(),
                actual: input_shape.rank(),
            });
        }
        let dims = input_shape.dims();
        let child_input = Shape::new(vec![dims[0]]).concat(&dims[2..]);
        let child_output = self.inner.compute_output_shape(&child_input)?;
        Ok(Shape::new(vec![dims[0], dims[1]]).concat(child_output.dims().get(1..).unwrap_or(&[])))
    }

    fn supports_masking(&self) -> bool {
        true
    }

    fn compute_mask(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Option<Mask>> {
        if let Some(strategy) = &self.mask_override {
            return strategy.compute_mask(self.algebra.as_ref(), input, mask);
        }

        let (batch, time) = self.split_leading(input.shape())?;
        let route = self.route_mask(mask, batch, time)?;
        let merged = Self::merge_time(input)?;
        let inner_out = self
            .inner
            .compute_mask(&merged, route.inner_mask())?
            .map(|mask| self.split_time(&mask, batch, time))
            .transpose()?;

        match route {
            MaskRoute::Bypass => Ok(inner_out.or_else(|| mask.cloned())),
            _ => Ok(inner_out),
        }
    }

    fn forward(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Tensor> {
        let (batch, time) = self.split_leading(input.shape())?;
        let route = self.route_mask(mask, batch, time)?;
        let merged = Self::merge_time(input)?;

        debug!(
            layer = self.name(),
            inner = self.inner.name(),
            batch,
            time,
            inner_masked = route.inner_mask().is_some(),
            "distributing over time axis"
        );

        let output = self.inner.forward(&merged, route.inner_mask())?;
        self.split_time(&output, batch, time)
    }

    fn parameter_count(&self) -> usize {
        self.inner.parameter_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{select_backend, BackendKind};
    use crate::layers::{DenseLayer, EmbeddingLayer, FlattenLayer};
    use crate::tensor::Dim;
    use crate::utils::SimpleRng;

    #[test]
    fn test_rnn_mask_any_over_last_axis() {
        let layer = TimeDistributed::rnn(
            Box::new(FlattenLayer::new()),
            select_backend(BackendKind::Graph),
        );
        let input = Tensor::zeros(&[2, 2, 3]);
        let mask = Mask::from_vec(
            vec![
                false, false, false, // (0, 0) fully padding
                true, false, false, // (0, 1)
                false, false, true, // (1, 0)
                true, true, true, // (1, 1)
            ],
            &[2, 2, 3],
        )
        .unwrap();

        let out = layer.compute_mask(&input, Some(&mask)).unwrap().unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data(), &[false, true, true, true]);
    }

    #[test]
    fn test_rnn_mask_none_stays_none() {
        let layer = TimeDistributed::rnn(
            Box::new(FlattenLayer::new()),
            select_backend(BackendKind::Symbolic),
        );
        let input = Tensor::zeros(&[2, 2, 3]);
        assert!(layer.compute_mask(&input, None).unwrap().is_none());
    }

    #[test]
    fn test_rnn_mask_is_repeatable() {
        let layer = TimeDistributed::rnn(
            Box::new(FlattenLayer::new()),
            select_backend(BackendKind::Graph),
        );
        let input = Tensor::zeros(&[1, 2, 2]);
        let mask = Mask::from_vec(vec![false, true, false, false], &[1, 2, 2]).unwrap();
        let first = layer.compute_mask(&input, Some(&mask)).unwrap();
        let second = layer.compute_mask(&input, Some(&mask)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_forward_applies_inner_per_timestep() {
        let mut rng = SimpleRng::new(42);
        let dense = DenseLayer::new(3, 2, &mut rng);
        let expected = dense
            .forward(&Tensor::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap(), None)
            .unwrap();

        let layer = TimeDistributed::new(Box::new(dense), select_backend(BackendKind::Graph));
        let input = Tensor::from_vec(
            vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0],
            &[2, 2, 3],
        )
        .unwrap();
        let out = layer.forward(&input, None).unwrap();

        assert_eq!(out.shape(), &[2, 2, 2]);
        for step in out.data().chunks(2) {
            assert_eq!(step, expected.data());
        }
    }

    #[test]
    fn test_default_mask_delegates_to_inner() {
        let weights = Tensor::from_vec(vec![0.0, 0.0, 1.0, 1.0], &[2, 2]).unwrap();
        let algebra = select_backend(BackendKind::Graph);
        let embedding = EmbeddingLayer::from_weights(weights, algebra.clone())
            .unwrap()
            .with_mask_zero(true);
        let layer = TimeDistributed::new(Box::new(embedding), algebra);

        let input = Tensor::from_vec(vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0], &[1, 2, 3]).unwrap();
        let mask = layer.compute_mask(&input, None).unwrap().unwrap();
        assert_eq!(mask.shape(), &[1, 2, 3]);
        assert_eq!(mask.data(), &[true, false, false, false, true, true]);
    }

    #[test]
    fn test_default_mask_none_for_collapsing_inner() {
        let layer = TimeDistributed::new(
            Box::new(FlattenLayer::masked(select_backend(BackendKind::Graph))),
            select_backend(BackendKind::Graph),
        );
        let input = Tensor::zeros(&[1, 2, 3, 4]);
        let mask = Mask::all_valid(&[1, 2, 3]);
        assert!(layer.compute_mask(&input, Some(&mask)).unwrap().is_none());
    }

    #[test]
    fn test_mask_passes_through_non_masking_inner() {
        let mut rng = SimpleRng::new(42);
        let layer = TimeDistributed::new(
            Box::new(DenseLayer::new(3, 2, &mut rng)),
            select_backend(BackendKind::Graph),
        );
        assert_eq!(layer.inner().name(), "dense");

        let input = Tensor::ones(&[1, 2, 3]);
        let mask = Mask::from_vec(vec![true, false], &[1, 2]).unwrap();

        let out_mask = layer.compute_mask(&input, Some(&mask)).unwrap();
        assert_eq!(out_mask, Some(mask.clone()));
        let out = layer.forward(&input, Some(&mask)).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2]);
    }

    #[test]
    fn test_rank_two_mask_bypasses_masking_inner() {
        let layer = TimeDistributed::new(
            Box::new(FlattenLayer::masked(select_backend(BackendKind::Graph))),
            select_backend(BackendKind::Graph),
        );
        let input = Tensor::ones(&[2, 3, 4, 5]);
        let mask = Mask::from_vec(vec![true, true, false, true, false, false], &[2, 3]).unwrap();

        assert_eq!(layer.compute_mask(&input, Some(&mask)).unwrap(), Some(mask.clone()));
        // Inner flatten runs unmasked, nothing is zeroed.
        let out = layer.forward(&input, Some(&mask)).unwrap();
        assert_eq!(out.shape(), &[2, 3, 20]);
        assert!(out.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_misaligned_mask_is_rejected() {
        let mut rng = SimpleRng::new(42);
        let layer = TimeDistributed::new(
            Box::new(DenseLayer::new(3, 2, &mut rng)),
            select_backend(BackendKind::Graph),
        );
        let input = Tensor::ones(&[1, 2, 3]);

        for mask in [Mask::all_valid(&[2]), Mask::all_valid(&[1, 3]), Mask::all_valid(&[2, 2, 3])] {
            assert!(matches!(
                layer.compute_mask(&input, Some(&mask)),
                Err(Error::MaskingUnsupported { .. })
            ));
            assert!(matches!(
                layer.forward(&input, Some(&mask)),
                Err(Error::MaskingUnsupported { .. })
            ));
        }
    }

    #[test]
    fn test_output_shape() {
        let mut rng = SimpleRng::new(42);
        let layer = TimeDistributed::new(
            Box::new(DenseLayer::new(3, 5, &mut rng)),
            select_backend(BackendKind::Graph),
        );
        let shape = Shape::from(vec![None, Some(4), Some(3)]);
        assert_eq!(
            layer.compute_output_shape(&shape).unwrap(),
            Shape::new(vec![Dim::Unknown, Dim::Known(4), Dim::Known(5)])
        );
        assert!(layer.compute_output_shape(&Shape::known(&[2, 3])).is_err());
    }

    #[test]
    fn test_rank_two_input_rejected() {
        let layer = TimeDistributed::new(
            Box::new(FlattenLayer::new()),
            select_backend(BackendKind::Graph),
        );
        assert!(matches!(
            layer.forward(&Tensor::zeros(&[2, 3]), None),
            Err(Error::RankMismatch { actual: 2, .. })
        ));
    }
}
