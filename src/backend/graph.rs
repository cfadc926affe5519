//! Graph-compiled backend

use tracing::trace;

use super::{select, BackendKind, TensorAlgebra};
use crate::error::{Error, Result};
use crate::tensor::{Mask, Tensor};

/// Provider with graph-compiled `where` semantics.
///
/// `where` does not broadcast: the condition must match the selected tensors'
/// shape exactly, or be a vector selecting whole rows along the first axis.
/// A per-position mask with a trailing size-1 axis is therefore widened to the
/// feature dimension before selecting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBackend;

impl GraphBackend {
    fn select_where(cond: &Mask, then_tensor: &Tensor, else_tensor: &Tensor) -> Result<Tensor> {
        if then_tensor.shape() != else_tensor.shape() {
            return Err(Error::ShapeMismatch {
                expected: then_tensor.shape().to_vec(),
                actual: else_tensor.shape().to_vec(),
            });
        }

        if cond.shape() == then_tensor.shape() {
            let data = select(cond.data(), then_tensor.data(), else_tensor.data());
            return Tensor::from_vec(data, then_tensor.shape());
        }

        // Rank-1 condition picks whole rows.
        if cond.rank() == 1 && then_tensor.rank() > 1 && cond.len() == then_tensor.shape()[0] {
            let row = then_tensor.len() / cond.len().max(1);
            let mut data = Vec::with_capacity(then_tensor.len());
            for (i, &keep) in cond.data().iter().enumerate() {
                let source = if keep { then_tensor } else { else_tensor };
                data.extend_from_slice(&source.data()[i * row..(i + 1) * row]);
            }
            return Tensor::from_vec(data, then_tensor.shape());
        }

        Err(Error::ShapeMismatch {
            expected: then_tensor.shape().to_vec(),
            actual: cond.shape().to_vec(),
        })
    }
}

impl TensorAlgebra for GraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    fn switch(&self, cond: &Mask, then_tensor: &Tensor, else_tensor: &Tensor) -> Result<Tensor> {
        let features = then_tensor.trailing_dim();
        if cond.rank() > 0 && cond.trailing_dim() == 1 && features != 1 {
            // Trailing axis is an embedding/feature axis the mask does not cover.
            trace!(features, "widening trailing mask axis");
            let widened = self.dot(&cond.to_tensor(), &Tensor::ones(&[1, features]))?;
            let cond = widened.map(|value| value != 0.0);
            return Self::select_where(&cond, then_tensor, else_tensor);
        }
        Self::select_where(cond, then_tensor, else_tensor)
    }
}
