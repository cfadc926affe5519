//! Dense row-major arrays for layer inputs, outputs and masks
//!
//! [`Tensor`] holds `f32` values and [`Mask`] holds `bool` validity flags. Both
//! are instances of the generic [`Array`] so that shape handling (reshape,
//! expand_dims, broadcasting) is written once.

pub mod broadcast;
mod shape;

pub use shape::{Dim, Shape};

use crate::error::{Error, Result};

/// Dense row-major array with a fixed concrete shape.
///
/// Invariant: `data.len()` equals the product of `shape`.
#[derive(Debug, Clone, PartialEq)]
pub struct Array<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

/// Floating point tensor.
pub type Tensor = Array<f32>;

/// Boolean validity mask; `true` marks real data, `false` marks padding.
pub type Mask = Array<bool>;

/// Resolves a possibly negative axis against `rank`.
pub fn normalize_axis(axis: isize, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 { rank as isize + axis } else { axis };
    if resolved < 0 || resolved as usize >= rank {
        return Err(Error::InvalidAxis { axis, rank });
    }
    Ok(resolved as usize)
}

/// Row-major strides for `shape`.
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

impl<T: Copy> Array<T> {
    /// Creates an array from row-major data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataLength`] if `data.len()` does not match the shape.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::DataLength {
                shape: shape.to_vec(),
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// Creates an array with every element set to `value`.
    pub fn full(shape: &[usize], value: T) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![value; len],
        }
    }

    /// Concrete shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the last dimension (1 for scalars).
    pub fn trailing_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Row-major data.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Consumes the array and returns its data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for ((&i, &dim), stride) in index.iter().zip(&self.shape).zip(strides(&self.shape)) {
            if i >= dim {
                return None;
            }
            offset += i * stride;
        }
        self.data.get(offset).copied()
    }

    /// Returns the same data under a new shape with the same element count.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Self::from_vec(self.data.clone(), shape)
    }

    /// Inserts a size-1 dimension at `axis` (negative axes count from the end,
    /// `-1` appends a trailing axis).
    pub fn expand_dims(&self, axis: isize) -> Result<Self> {
        let position = normalize_axis(axis, self.rank() + 1)?;
        let mut shape = self.shape.clone();
        shape.insert(position, 1);
        Ok(Self {
            shape,
            data: self.data.clone(),
        })
    }

    /// Applies `f` element-wise.
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> Array<U> {
        Array {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&value| f(value)).collect(),
        }
    }

    /// Symbolic shape with every dimension known.
    pub fn symbolic_shape(&self) -> Shape {
        Shape::known(&self.shape)
    }
}

impl Tensor {
    /// Tensor of zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Tensor of ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zeros with the shape of `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(&self.shape)
    }
}

impl Mask {
    /// Mask with every position valid.
    pub fn all_valid(shape: &[usize]) -> Self {
        Self::full(shape, true)
    }

    /// Number of valid positions.
    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|&&valid| valid).count()
    }

    /// Casts to `0.0`/`1.0` values.
    pub fn to_tensor(&self) -> Tensor {
        self.map(|valid| if valid { 1.0 } else { 0.0 })
    }
}
