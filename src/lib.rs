//! Masked Layers Library
//!
//! Neural network layers for sequence and NLP data, where inputs are padded and
//! a validity mask has to travel alongside the values.
//!
//! # Modules
//!
//! - `tensor`: Dense tensors, boolean masks and symbolic shapes
//! - `backend`: Tensor-algebra providers (graph-compiled and symbolic) and `switch`
//! - `layers`: Layer trait, mask/shape strategies and layer implementations
//! - `model`: Sequential model threading masks between layers
//! - `architecture`: Architecture configuration and model building
//! - `config`: Runtime configuration (backend, logging)
//! - `utils`: Shared utilities (RNG, activation functions, logging)

pub mod architecture;
pub mod backend;
pub mod config;
pub mod error;
pub mod layers;
pub mod model;
pub mod tensor;
pub mod utils;

pub use error::{Error, Result};
