//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected layer)
//! that performs the transformation: output = activation(input × weights + biases)
//! over the last axis of its input.

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{Dim, Mask, Shape, Tensor};
use crate::utils::{Activation, SimpleRng};

/// Dense (fully connected) layer with weights and biases.
///
/// Performs the linear transformation: y = xW + b
/// where x is the input (... × input_size),
/// W is the weight matrix (input_size × output_size),
/// and b is the bias vector (output_size).
///
/// Dense layers have no notion of masks; put a masked flatten in front of one
/// to fold a mask into the values.
///
/// # Fields
///
/// * `input_size` - Number of input features
/// * `output_size` - Number of output features
/// * `weights` - Weight matrix stored in row-major format (input_size × output_size)
/// * `biases` - Bias vector (output_size)
/// * `activation` - Activation applied to each output row
///
/// # Example
///
/// ```
/// use masked_layers::layers::DenseLayer;
/// use masked_layers::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new(784, 512, &mut rng);
/// assert_eq!(layer.input_size(), 784);
/// assert_eq!(layer.output_size(), 512);
/// ```
#[derive(Debug, Clone)]
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
    activation: Activation,
}

impl DenseLayer {
    /// Create a new DenseLayer with Xavier initialization.
    ///
    /// Weights are initialized using Xavier/Glorot initialization:
    /// randomly sampled from uniform distribution [-limit, limit]
    /// where limit = sqrt(6 / (input_size + output_size)).
    ///
    /// Biases are initialized to zero.
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of input features
    /// * `output_size` - Number of output features
    /// * `rng` - Random number generator for weight initialization
    pub fn new(input_size: usize, output_size: usize, rng: &mut SimpleRng) -> Self {
        // Xavier initialization: limit = sqrt(6 / (fan_in + fan_out))
        let mut weights = vec![0.0f32; input_size * output_size];
        let limit = (6.0f32 / (input_size + output_size).max(1) as f32).sqrt();
        rng.fill_uniform(&mut weights, limit);

        Self {
            input_size,
            output_size,
            weights,
            biases: vec![0.0f32; output_size],
            activation: Activation::Linear,
        }
    }

    /// Create a DenseLayer from explicit weights (input_size × output_size) and biases.
    pub fn from_parameters(weights: Tensor, biases: Vec<f32>) -> Result<Self> {
        if weights.rank() != 2 || weights.shape()[1] != biases.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![weights.shape().first().copied().unwrap_or(0), biases.len()],
                actual: weights.shape().to_vec(),
            });
        }
        Ok(Self {
            input_size: weights.shape()[0],
            output_size: weights.shape()[1],
            weights: weights.into_vec(),
            biases,
            activation: Activation::Linear,
        })
    }

    /// Set the output activation.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Get the input size of the layer.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Get the output size of the layer.
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Get the activation.
    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for DenseLayer {
    fn name(&self) -> &str {
        "dense"
    }

    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        match input_shape.last() {
            None => Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: ">= 1".to_string(),
                actual: 0,
            }),
            Some(Dim::Known(size)) if size != self.input_size => Err(Error::ShapeMismatch {
                expected: vec![self.input_size],
                actual: vec![size],
            }),
            Some(_) => {
                let mut dims = input_shape.dims().to_vec();
                dims.pop();
                dims.push(Dim::Known(self.output_size));
                Ok(Shape::new(dims))
            }
        }
    }

    /// Forward propagation over the last axis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the trailing dimension differs from
    /// `input_size`.
    fn forward(&self, input: &Tensor, _mask: Option<&Mask>) -> Result<Tensor> {
        let out_shape = self
            .compute_output_shape(&input.symbolic_shape())?
            .to_concrete()
            .unwrap_or_default();
        let rows = input.len() / self.input_size.max(1);

        let mut output = vec![0.0f32; rows * self.output_size];
        for (x, y) in input
            .data()
            .chunks_exact(self.input_size.max(1))
            .zip(output.chunks_exact_mut(self.output_size.max(1)))
        {
            y.copy_from_slice(&self.biases);
            for (i, &value) in x.iter().enumerate() {
                let row = &self.weights[i * self.output_size..(i + 1) * self.output_size];
                for (out, &w) in y.iter_mut().zip(row) {
                    *out += value * w;
                }
            }
        }
        self.activation.apply(&mut output, rows, self.output_size);

        Tensor::from_vec(output, &out_shape)
    }

    /// Returns input_size × output_size (weights) + output_size (biases).
    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}
