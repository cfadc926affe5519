//! Numpy-style broadcasting
//!
//! Shapes are aligned on their trailing dimensions; a pair of dimensions is
//! compatible when they are equal or one of them is 1.

use super::{strides, Array};
use crate::error::{Error, Result};

/// Broadcast result shape of `lhs` and `rhs`.
///
/// # Errors
///
/// Returns [`Error::IncompatibleShapes`] when a dimension pair is neither equal
/// nor contains a 1.
pub fn broadcast_shapes(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = vec![0usize; rank];
    for i in 0..rank {
        let l = if i < rank - lhs.len() { 1 } else { lhs[i - (rank - lhs.len())] };
        let r = if i < rank - rhs.len() { 1 } else { rhs[i - (rank - rhs.len())] };
        out[i] = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => {
                return Err(Error::IncompatibleShapes {
                    lhs: lhs.to_vec(),
                    rhs: rhs.to_vec(),
                })
            }
        };
    }
    Ok(out)
}

/// Materializes `array` broadcast to `target`.
pub fn broadcast_to<T: Copy>(array: &Array<T>, target: &[usize]) -> Result<Array<T>> {
    let source = array.shape();
    if source == target {
        return Ok(array.clone());
    }
    if broadcast_shapes(source, target)? != target {
        return Err(Error::IncompatibleShapes {
            lhs: source.to_vec(),
            rhs: target.to_vec(),
        });
    }

    let offset = target.len() - source.len();
    let source_strides = strides(source);
    let target_strides = strides(target);
    let len: usize = target.iter().product();
    let mut data = Vec::with_capacity(len);

    for flat in 0..len {
        let mut src_index = 0;
        for (axis, &stride) in target_strides.iter().enumerate() {
            if axis < offset {
                continue;
            }
            let src_axis = axis - offset;
            if source[src_axis] == 1 {
                continue;
            }
            let coord = (flat / stride) % target[axis];
            src_index += coord * source_strides[src_axis];
        }
        data.push(array.data()[src_index]);
    }

    Array::from_vec(data, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{Mask, Tensor};

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3, 1], &[2, 3, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shapes(&[4], &[2, 3, 4]).unwrap(), vec![2, 3, 4]);
        assert_eq!(broadcast_shapes(&[], &[5]).unwrap(), vec![5]);
        assert!(broadcast_shapes(&[2, 3], &[2, 4]).is_err());
    }

    #[test]
    fn test_broadcast_trailing_axis() {
        let mask = Mask::from_vec(vec![true, false], &[2, 1]).unwrap();
        let wide = broadcast_to(&mask, &[2, 3]).unwrap();
        assert_eq!(wide.data(), &[true, true, true, false, false, false]);
    }

    #[test]
    fn test_broadcast_leading_axis() {
        let row = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let tiled = broadcast_to(&row, &[2, 3]).unwrap();
        assert_eq!(tiled.data(), &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_broadcast_to_smaller_fails() {
        let t = Tensor::zeros(&[2, 3]);
        assert!(broadcast_to(&t, &[3]).is_err());
    }
}
