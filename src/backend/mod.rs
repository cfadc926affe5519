//! Tensor-algebra providers
//!
//! Layers never ask "which backend is active". Instead they are handed a
//! [`TensorAlgebra`] at construction time and call through it. Two providers
//! exist, mirroring the two numeric backends whose conditional-select
//! primitives differ:
//!
//! - [`GraphBackend`]: graph-compiled semantics. `where` requires exactly
//!   matching shapes, so [`TensorAlgebra::switch`] widens a trailing size-1
//!   condition with a matrix product against a ones row first.
//! - [`SymbolicBackend`]: symbolic-expression semantics. `switch` broadcasts
//!   all three operands natively.
//!
//! Everything other than `switch` behaves identically and is provided by the
//! trait's default methods.
//!
//! # Example
//!
//! ```
//! use masked_layers::backend::{select_backend, switch, BackendKind};
//! use masked_layers::tensor::{Mask, Tensor};
//!
//! let algebra = select_backend(BackendKind::Graph);
//! let cond = Mask::from_vec(vec![true, false], &[2, 1]).unwrap();
//! let then = Tensor::ones(&[2, 3]);
//! let out = switch(algebra.as_ref(), &cond, &then, &then.zeros_like()).unwrap();
//! assert_eq!(out.data(), &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
//! ```

mod graph;
mod symbolic;

pub use graph::GraphBackend;
pub use symbolic::SymbolicBackend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::tensor::{normalize_axis, Mask, Tensor};

/// Identifies one of the supported numeric backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Graph-compiled backend (strict-shape `where`).
    Graph,
    /// Symbolic-expression backend (broadcasting `switch`).
    Symbolic,
}

impl BackendKind {
    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Graph => "graph",
            BackendKind::Symbolic => "symbolic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    /// Accepts the canonical names as well as the names of the engines they
    /// model (`tensorflow`, `theano`), case-insensitively.
    fn from_str(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "graph" | "tensorflow" => Ok(BackendKind::Graph),
            "symbolic" | "theano" => Ok(BackendKind::Symbolic),
            _ => Err(Error::UnsupportedBackend(name.to_string())),
        }
    }
}

/// Returns the provider for `kind`.
pub fn select_backend(kind: BackendKind) -> Arc<dyn TensorAlgebra> {
    match kind {
        BackendKind::Graph => Arc::new(GraphBackend),
        BackendKind::Symbolic => Arc::new(SymbolicBackend),
    }
}

/// Element-wise conditional select `cond ? then : else` through `algebra`.
///
/// See [`TensorAlgebra::switch`] for the per-backend shape rules.
pub fn switch(
    algebra: &dyn TensorAlgebra,
    cond: &Mask,
    then_tensor: &Tensor,
    else_tensor: &Tensor,
) -> Result<Tensor> {
    trace!(
        backend = %algebra.kind(),
        cond = ?cond.shape(),
        then = ?then_tensor.shape(),
        "switch"
    );
    algebra.switch(cond, then_tensor, else_tensor)
}

/// Tensor operations layers need from a numeric backend.
pub trait TensorAlgebra: fmt::Debug + Send + Sync {
    /// Which backend this provider models.
    fn kind(&self) -> BackendKind;

    /// Element-wise select: positions where `cond` is true take `then_tensor`,
    /// the rest take `else_tensor`.
    fn switch(&self, cond: &Mask, then_tensor: &Tensor, else_tensor: &Tensor) -> Result<Tensor>;

    /// Logical OR along `axis`; the reduced axis is removed.
    fn any(&self, mask: &Mask, axis: isize) -> Result<Mask> {
        let shape = mask.shape();
        let axis = normalize_axis(axis, shape.len())?;
        let outer: usize = shape[..axis].iter().product();
        let len = shape[axis];
        let inner: usize = shape[axis + 1..].iter().product();

        let data = mask.data();
        let mut out = vec![false; outer * inner];
        for o in 0..outer {
            for j in 0..len {
                let base = (o * len + j) * inner;
                for i in 0..inner {
                    out[o * inner + i] |= data[base + i];
                }
            }
        }

        let mut out_shape = shape.to_vec();
        out_shape.remove(axis);
        Mask::from_vec(out, &out_shape)
    }

    /// Inserts a size-1 axis at `axis`.
    fn expand_dims(&self, mask: &Mask, axis: isize) -> Result<Mask> {
        mask.expand_dims(axis)
    }

    /// Zeros shaped like `tensor`.
    fn zeros_like(&self, tensor: &Tensor) -> Tensor {
        tensor.zeros_like()
    }

    /// `tensor != value`, element-wise.
    fn not_equal(&self, tensor: &Tensor, value: f32) -> Mask {
        tensor.map(|x| x != value)
    }

    /// Contracts the last axis of `lhs` with the first axis of the 2-D `rhs`:
    /// `(..., k) x (k, n) -> (..., n)`.
    fn dot(&self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
        if lhs.rank() == 0 || rhs.rank() != 2 || rhs.shape()[0] != lhs.trailing_dim() {
            return Err(Error::ShapeMismatch {
                expected: vec![lhs.trailing_dim(), rhs.trailing_dim()],
                actual: rhs.shape().to_vec(),
            });
        }
        let k = rhs.shape()[0];
        let n = rhs.shape()[1];
        let rows = lhs.len() / k.max(1);

        let mut out = vec![0.0f32; rows * n];
        for (row, out_row) in out.chunks_exact_mut(n.max(1)).enumerate().take(rows) {
            let lhs_row = &lhs.data()[row * k..(row + 1) * k];
            for (p, &a) in lhs_row.iter().enumerate() {
                let rhs_row = &rhs.data()[p * n..(p + 1) * n];
                for (value, &b) in out_row.iter_mut().zip(rhs_row) {
                    *value += a * b;
                }
            }
        }

        let mut shape = lhs.shape().to_vec();
        if let Some(last) = shape.last_mut() {
            *last = n;
        }
        Tensor::from_vec(out, &shape)
    }
}

/// Element-wise select over equally sized buffers.
pub(crate) fn select(cond: &[bool], then_data: &[f32], else_data: &[f32]) -> Vec<f32> {
    cond.iter()
        .zip(then_data.iter().zip(else_data))
        .map(|(&c, (&t, &e))| if c { t } else { e })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("graph".parse::<BackendKind>().unwrap(), BackendKind::Graph);
        assert_eq!("TensorFlow".parse::<BackendKind>().unwrap(), BackendKind::Graph);
        assert_eq!("symbolic".parse::<BackendKind>().unwrap(), BackendKind::Symbolic);
        assert_eq!("theano".parse::<BackendKind>().unwrap(), BackendKind::Symbolic);

        let err = "cntk".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedBackend(name) if name == "cntk"));
    }

    #[test]
    fn test_select_backend_kind() {
        assert_eq!(select_backend(BackendKind::Graph).kind(), BackendKind::Graph);
        assert_eq!(select_backend(BackendKind::Symbolic).kind(), BackendKind::Symbolic);
    }

    #[test]
    fn test_any_last_axis() {
        let algebra = GraphBackend;
        let mask = Mask::from_vec(
            vec![false, false, true, false, false, false, true, true],
            &[2, 2, 2],
        )
        .unwrap();
        let reduced = algebra.any(&mask, -1).unwrap();
        assert_eq!(reduced.shape(), &[2, 2]);
        assert_eq!(reduced.data(), &[false, true, false, true]);
    }

    #[test]
    fn test_any_middle_axis() {
        let algebra = SymbolicBackend;
        let mask = Mask::from_vec(vec![true, false, false, false], &[2, 2]).unwrap();
        let reduced = algebra.any(&mask, 0).unwrap();
        assert_eq!(reduced.data(), &[true, false]);
        assert!(algebra.any(&mask, 2).is_err());
    }

    #[test]
    fn test_dot_ones_row() {
        let algebra = GraphBackend;
        let lhs = Tensor::from_vec(vec![1.0, 0.0], &[2, 1]).unwrap();
        let out = algebra.dot(&lhs, &Tensor::ones(&[1, 3])).unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        assert_eq!(out.data(), &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dot_shape_mismatch() {
        let algebra = GraphBackend;
        let lhs = Tensor::zeros(&[2, 2]);
        assert!(algebra.dot(&lhs, &Tensor::ones(&[3, 1])).is_err());
    }

    #[test]
    fn test_not_equal() {
        let algebra = SymbolicBackend;
        let t = Tensor::from_vec(vec![0.0, 3.0, 0.0], &[3]).unwrap();
        assert_eq!(algebra.not_equal(&t, 0.0).data(), &[false, true, false]);
    }
}
