//! Simple recurrent layer
//!
//! An Elman RNN that encodes a `(batch, time, features)` sequence:
//!
//! h' = tanh(x W_ih + h W_hh + b)
//!
//! Masked timesteps leave the hidden state untouched, so padding at the end
//! (or anywhere) of a sequence does not change its encoding.

use crate::error::{Error, Result};
use crate::layers::Layer;
use crate::tensor::{Dim, Mask, Shape, Tensor};
use crate::utils::activations::tanh_inplace;
use crate::utils::SimpleRng;

/// Single-layer tanh RNN.
///
/// By default only the final hidden state is returned, collapsing the time
/// axis; the layer then reports no output mask. With `return_sequences` the
/// hidden state at every step is returned and the input mask is propagated.
#[derive(Debug, Clone)]
pub struct SimpleRnnLayer {
    input_size: usize,
    units: usize,
    /// input_size × units
    weight_ih: Vec<f32>,
    /// units × units
    weight_hh: Vec<f32>,
    bias: Vec<f32>,
    return_sequences: bool,
}

impl SimpleRnnLayer {
    /// Creates a new SimpleRnnLayer with Xavier-uniform weights and zero bias.
    pub fn new(input_size: usize, units: usize, rng: &mut SimpleRng) -> Self {
        let mut weight_ih = vec![0.0f32; input_size * units];
        rng.fill_uniform(
            &mut weight_ih,
            (6.0f32 / (input_size + units).max(1) as f32).sqrt(),
        );

        let mut weight_hh = vec![0.0f32; units * units];
        rng.fill_uniform(&mut weight_hh, (3.0f32 / units.max(1) as f32).sqrt());

        Self {
            input_size,
            units,
            weight_ih,
            weight_hh,
            bias: vec![0.0f32; units],
            return_sequences: false,
        }
    }

    /// Return the hidden state at every timestep instead of only the last one.
    pub fn with_return_sequences(mut self, return_sequences: bool) -> Self {
        self.return_sequences = return_sequences;
        self
    }

    /// Returns the expected input size.
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Returns the hidden state size.
    pub fn units(&self) -> usize {
        self.units
    }

    /// Whether every timestep's state is returned.
    pub fn return_sequences(&self) -> bool {
        self.return_sequences
    }

    fn step(&self, x: &[f32], hidden: &[f32], next: &mut [f32]) {
        next.copy_from_slice(&self.bias);
        for (i, &value) in x.iter().enumerate() {
            let row = &self.weight_ih[i * self.units..(i + 1) * self.units];
            for (out, &w) in next.iter_mut().zip(row) {
                *out += value * w;
            }
        }
        for (j, &h) in hidden.iter().enumerate() {
            let row = &self.weight_hh[j * self.units..(j + 1) * self.units];
            for (out, &w) in next.iter_mut().zip(row) {
                *out += h * w;
            }
        }
        tanh_inplace(next);
    }

    fn check_input(&self, shape: &[usize]) -> Result<(usize, usize)> {
        if shape.len() != 3 {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: "3".to_string(),
                actual: shape.len(),
            });
        }
        if shape[2] != self.input_size {
            return Err(Error::ShapeMismatch {
                expected: vec![shape[0], shape[1], self.input_size],
                actual: shape.to_vec(),
            });
        }
        Ok((shape[0], shape[1]))
    }
}

impl Layer for SimpleRnnLayer {
    fn name(&self) -> &str {
        "simple_rnn"
    }

    fn compute_output_shape(&self, input_shape: &Shape) -> Result<Shape> {
        if input_shape.rank() != 3 {
            return Err(Error::RankMismatch {
                layer: self.name().to_string(),
                expected: "3".to_string(),
                actual: input_shape.rank(),
            });
        }
        if let Dim::Known(features) = input_shape[2] {
            if features != self.input_size {
                return Err(Error::ShapeMismatch {
                    expected: vec![self.input_size],
                    actual: vec![features],
                });
            }
        }
        let units = Dim::Known(self.units);
        Ok(if self.return_sequences {
            Shape::new(vec![input_shape[0], input_shape[1], units])
        } else {
            Shape::new(vec![input_shape[0], units])
        })
    }

    fn supports_masking(&self) -> bool {
        true
    }

    fn compute_mask(&self, _input: &Tensor, mask: Option<&Mask>) -> Result<Option<Mask>> {
        if self.return_sequences {
            Ok(mask.cloned())
        } else {
            Ok(None)
        }
    }

    fn forward(&self, input: &Tensor, mask: Option<&Mask>) -> Result<Tensor> {
        let (batch, time) = self.check_input(input.shape())?;
        if let Some(mask) = mask {
            if mask.shape() != [batch, time] {
                return Err(Error::ShapeMismatch {
                    expected: vec![batch, time],
                    actual: mask.shape().to_vec(),
                });
            }
        }

        let steps_out = if self.return_sequences { time } else { 1 };
        let mut output = vec![0.0f32; batch * steps_out * self.units];
        let mut hidden = vec![0.0f32; self.units];
        let mut next = vec![0.0f32; self.units];

        for b in 0..batch {
            hidden.iter_mut().for_each(|h| *h = 0.0);
            for t in 0..time {
                let valid = mask.map_or(true, |mask| mask.data()[b * time + t]);
                if valid {
                    let offset = (b * time + t) * self.input_size;
                    self.step(&input.data()[offset..offset + self.input_size], &hidden, &mut next);
                    std::mem::swap(&mut hidden, &mut next);
                }
                if self.return_sequences {
                    let offset = (b * time + t) * self.units;
                    output[offset..offset + self.units].copy_from_slice(&hidden);
                }
            }
            if !self.return_sequences {
                output[b * self.units..(b + 1) * self.units].copy_from_slice(&hidden);
            }
        }

        let shape = if self.return_sequences {
            vec![batch, time, self.units]
        } else {
            vec![batch, self.units]
        };
        Tensor::from_vec(output, &shape)
    }

    fn parameter_count(&self) -> usize {
        self.weight_ih.len() + self.weight_hh.len() + self.bias.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(batch: usize, time: usize, features: usize) -> Tensor {
        let len = batch * time * features;
        Tensor::from_vec(
            (0..len).map(|v| (v as f32 * 0.37).sin()).collect(),
            &[batch, time, features],
        )
        .unwrap()
    }

    #[test]
    fn test_parameter_count() {
        let mut rng = SimpleRng::new(42);
        let layer = SimpleRnnLayer::new(5, 4, &mut rng);
        assert_eq!(layer.parameter_count(), 5 * 4 + 4 * 4 + 4);
    }

    #[test]
    fn test_output_shapes() {
        let mut rng = SimpleRng::new(42);
        let layer = SimpleRnnLayer::new(3, 4, &mut rng);
        let input = sequence(2, 5, 3);

        assert_eq!(layer.forward(&input, None).unwrap().shape(), &[2, 4]);

        let seq = layer.clone().with_return_sequences(true);
        assert_eq!(seq.forward(&input, None).unwrap().shape(), &[2, 5, 4]);
        assert_eq!(
            seq.compute_output_shape(&Shape::from(vec![None, Some(5), Some(3)]))
                .unwrap(),
            Shape::from(vec![None, Some(5), Some(4)])
        );
    }

    #[test]
    fn test_trailing_padding_does_not_change_encoding() {
        let mut rng = SimpleRng::new(9);
        let layer = SimpleRnnLayer::new(3, 4, &mut rng);

        let short = sequence(1, 2, 3);
        let mut padded_data = short.data().to_vec();
        padded_data.extend_from_slice(&[0.7, -0.2, 0.9]);
        let padded = Tensor::from_vec(padded_data, &[1, 3, 3]).unwrap();
        let mask = Mask::from_vec(vec![true, true, false], &[1, 3]).unwrap();

        let expected = layer.forward(&short, None).unwrap();
        let got = layer.forward(&padded, Some(&mask)).unwrap();
        assert_eq!(expected.data(), got.data());
    }

    #[test]
    fn test_fully_masked_sequence_is_zero() {
        let mut rng = SimpleRng::new(9);
        let layer = SimpleRnnLayer::new(3, 4, &mut rng);
        let mask = Mask::from_vec(vec![false; 3], &[1, 3]).unwrap();
        let out = layer.forward(&sequence(1, 3, 3), Some(&mask)).unwrap();
        assert!(out.data().iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_mask_propagation() {
        let mut rng = SimpleRng::new(9);
        let input = sequence(1, 2, 3);
        let mask = Mask::all_valid(&[1, 2]);

        let last = SimpleRnnLayer::new(3, 2, &mut rng);
        assert!(last.compute_mask(&input, Some(&mask)).unwrap().is_none());

        let seq = last.with_return_sequences(true);
        assert_eq!(seq.compute_mask(&input, Some(&mask)).unwrap(), Some(mask));
    }

    #[test]
    fn test_input_checks() {
        let mut rng = SimpleRng::new(9);
        let layer = SimpleRnnLayer::new(3, 2, &mut rng);
        assert!(matches!(
            layer.forward(&Tensor::zeros(&[2, 3]), None),
            Err(Error::RankMismatch { .. })
        ));
        assert!(matches!(
            layer.forward(&Tensor::zeros(&[2, 3, 4]), None),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(layer
            .forward(&Tensor::zeros(&[1, 2, 3]), Some(&Mask::all_valid(&[1, 3])))
            .is_err());
    }
}
