//! Shared utilities for layer implementations
//!
//! This module provides random number generation for weight initialization,
//! activation functions applied by dense layers, and logging setup.

pub mod activations;
pub mod logging;
pub mod rng;

pub use activations::Activation;
pub use rng::SimpleRng;
