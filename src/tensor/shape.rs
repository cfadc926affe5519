//! Symbolic shapes used for output-shape inference
//!
//! Shape inference runs before any data exists, so dimensions may be unknown
//! (typically the batch dimension). A [`Shape`] is an ordered list of [`Dim`]s.

use std::fmt;
use std::ops::Index;

/// A single dimension of a symbolic shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Dimension with a fixed size.
    Known(usize),
    /// Dimension whose size is only known at execution time.
    Unknown,
}

impl Dim {
    /// Returns the size if known.
    pub fn size(self) -> Option<usize> {
        match self {
            Dim::Known(size) => Some(size),
            Dim::Unknown => None,
        }
    }
}

impl From<usize> for Dim {
    fn from(size: usize) -> Self {
        Dim::Known(size)
    }
}

impl From<Option<usize>> for Dim {
    fn from(size: Option<usize>) -> Self {
        size.map_or(Dim::Unknown, Dim::Known)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(size) => write!(f, "{}", size),
            Dim::Unknown => write!(f, "None"),
        }
    }
}

/// Ordered sequence of possibly-unknown dimensions.
///
/// # Example
///
/// ```
/// use masked_layers::tensor::{Dim, Shape};
///
/// let shape = Shape::new(vec![Dim::Unknown, Dim::Known(10)]);
/// assert_eq!(shape.rank(), 2);
/// assert_eq!(shape.with_trailing(Dim::Known(50)).to_string(), "(None, 10, 50)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<Dim>);

impl Shape {
    /// Creates a shape from a list of dimensions.
    pub fn new(dims: Vec<Dim>) -> Self {
        Self(dims)
    }

    /// Creates a fully known shape.
    pub fn known(dims: &[usize]) -> Self {
        Self(dims.iter().copied().map(Dim::Known).collect())
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// The dimensions in order.
    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    /// Last dimension, if the shape is not scalar.
    pub fn last(&self) -> Option<Dim> {
        self.0.last().copied()
    }

    /// Returns a new shape with `dim` appended.
    pub fn with_trailing(&self, dim: Dim) -> Shape {
        let mut dims = self.0.clone();
        dims.push(dim);
        Shape(dims)
    }

    /// Concatenates `self` and `other`.
    pub fn concat(&self, other: &[Dim]) -> Shape {
        let mut dims = self.0.clone();
        dims.extend_from_slice(other);
        Shape(dims)
    }

    /// Converts to concrete sizes when every dimension is known.
    pub fn to_concrete(&self) -> Option<Vec<usize>> {
        self.0.iter().map(|dim| dim.size()).collect()
    }

    /// Product of dimensions `from..`, or `None` if any of them is unknown.
    pub fn product_from(&self, from: usize) -> Option<usize> {
        self.0
            .iter()
            .skip(from)
            .try_fold(1usize, |acc, dim| dim.size().map(|size| acc * size))
    }
}

impl Index<usize> for Shape {
    type Output = Dim;

    fn index(&self, index: usize) -> &Dim {
        &self.0[index]
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::known(dims)
    }
}

impl From<Vec<Option<usize>>> for Shape {
    fn from(dims: Vec<Option<usize>>) -> Self {
        Shape(dims.into_iter().map(Dim::from).collect())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Shape::known(&[32, 10]).to_string(), "(32, 10)");
        assert_eq!(Shape::known(&[7]).to_string(), "(7,)");
        assert_eq!(Shape::from(vec![None, Some(3)]).to_string(), "(None, 3)");
    }

    #[test]
    fn test_product_from() {
        let shape = Shape::from(vec![None, Some(3), Some(4)]);
        assert_eq!(shape.product_from(1), Some(12));
        assert_eq!(shape.product_from(0), None);
        assert_eq!(shape.to_concrete(), None);
        assert_eq!(Shape::known(&[2, 3]).to_concrete(), Some(vec![2, 3]));
    }
}
