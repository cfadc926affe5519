//! Symbolic-expression backend

use super::{select, BackendKind, TensorAlgebra};
use crate::error::Result;
use crate::tensor::broadcast::{broadcast_shapes, broadcast_to};
use crate::tensor::{Mask, Tensor};

/// Provider with symbolic-expression `switch` semantics.
///
/// The native `switch` broadcasts condition and branches against each other,
/// so no shape adjustment happens before selecting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicBackend;

impl TensorAlgebra for SymbolicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Symbolic
    }

    fn switch(&self, cond: &Mask, then_tensor: &Tensor, else_tensor: &Tensor) -> Result<Tensor> {
        let shape = broadcast_shapes(cond.shape(), then_tensor.shape())?;
        let shape = broadcast_shapes(&shape, else_tensor.shape())?;

        let cond = broadcast_to(cond, &shape)?;
        let then_tensor = broadcast_to(then_tensor, &shape)?;
        let else_tensor = broadcast_to(else_tensor, &shape)?;

        let data = select(cond.data(), then_tensor.data(), else_tensor.data());
        Tensor::from_vec(data, &shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_switch_matching_shapes() {
        let cond = Mask::from_vec(vec![false, true, true], &[3]).unwrap();
        let then = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let other = Tensor::from_vec(vec![-1.0, -2.0, -3.0], &[3]).unwrap();
        let out = SymbolicBackend.switch(&cond, &then, &other).unwrap();
        assert_eq!(out.data(), &[-1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_switch_broadcasts_natively() {
        let cond = Mask::from_vec(vec![true, false], &[2, 1]).unwrap();
        let then = Tensor::ones(&[2, 2]);
        let out = SymbolicBackend.switch(&cond, &then, &Tensor::zeros(&[1])).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data(), &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_switch_incompatible() {
        let cond = Mask::all_valid(&[2, 3]);
        let err = SymbolicBackend
            .switch(&cond, &Tensor::zeros(&[2, 4]), &Tensor::zeros(&[2, 4]))
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleShapes { .. }));
    }
}
