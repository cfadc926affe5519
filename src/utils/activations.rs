//! Activation functions for dense layers
//!
//! This module provides the activations a [`DenseLayer`](crate::layers::DenseLayer)
//! can apply to its output rows:
//! - Linear (identity)
//! - ReLU
//! - Tanh
//! - Softmax (row-wise)

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Activation applied after a dense transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// Identity.
    #[default]
    Linear,
    /// max(0, x).
    Relu,
    /// Hyperbolic tangent.
    Tanh,
    /// Row-wise softmax.
    Softmax,
}

impl Activation {
    /// Names accepted by [`FromStr`].
    pub const NAMES: [&'static str; 4] = ["linear", "relu", "tanh", "softmax"];

    /// Applies the activation in place to `rows` rows of `cols` values.
    pub fn apply(self, data: &mut [f32], rows: usize, cols: usize) {
        match self {
            Activation::Linear => {}
            Activation::Relu => relu_inplace(data),
            Activation::Tanh => tanh_inplace(data),
            Activation::Softmax => softmax_rows(data, rows, cols),
        }
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            _ => Err(Error::config(format!(
                "Invalid activation function '{}'. Must be one of: {}",
                name,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        };
        f.write_str(name)
    }
}

/// ReLU activation function applied in-place.
///
/// Sets all negative values to 0.0, keeps positive values unchanged.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Tanh activation function applied in-place.
pub fn tanh_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        *value = value.tanh();
    }
}

/// Softmax activation function applied row-wise.
///
/// Converts logits to probabilities for each row. Uses the max-subtraction
/// trick for numerical stability to avoid overflow with large values.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        let mut max_value = row[0];
        for &value in row.iter().skip(1) {
            if value > max_value {
                max_value = value;
            }
        }

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}
