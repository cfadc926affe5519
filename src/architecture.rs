//! Architecture configuration structures
//!
//! This module provides configuration structures for defining sequence models
//! via JSON configuration files, so that layer stacks can be changed without
//! code changes.

use std::fs;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::backend::TensorAlgebra;
use crate::error::{Error, Result};
use crate::layers::{
    DenseLayer, EmbeddingLayer, FlattenLayer, Layer, SimpleRnnLayer, TimeDistributed,
};
use crate::model::Sequential;
use crate::tensor::Shape;
use crate::utils::{Activation, SimpleRng};

/// Configuration for a single layer in the model.
///
/// Defines the layer type and its parameters. Different layer types require different fields:
///
/// - **Embedding**: Requires `vocab_size` and `embedding_dim`; optional `mask_zero`
///   (default false) and `any_shape` (default true)
/// - **Flatten** / **MaskedFlatten**: No parameters
/// - **Dense**: Requires `input_size` and `output_size`; optional `activation` (default linear)
/// - **SimpleRnn**: Requires `input_size` and `units`; optional `return_sequences` (default false)
/// - **TimeDistributed** / **TimeDistributedRnn**: Requires `inner`, a nested layer configuration
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "embedding",
///   "vocab_size": 1000,
///   "embedding_dim": 50,
///   "mask_zero": true
/// }
/// ```
///
/// ```json
/// {
///   "layer_type": "time_distributed_rnn",
///   "inner": { "layer_type": "simple_rnn", "input_size": 50, "units": 32 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LayerConfig {
    /// Type of layer: "embedding", "flatten", "masked_flatten", "dense",
    /// "simple_rnn", "time_distributed" or "time_distributed_rnn"
    pub layer_type: String,

    // Embedding parameters
    /// Vocabulary size for Embedding layer
    pub vocab_size: Option<usize>,
    /// Embedding dimension for Embedding layer
    pub embedding_dim: Option<usize>,
    /// Treat index 0 as padding (default: false)
    pub mask_zero: Option<bool>,
    /// Accept input of any rank (default: true); false restricts to (batch, time)
    pub any_shape: Option<bool>,

    // Dense / SimpleRnn parameters
    /// Input size for Dense and SimpleRnn layers
    pub input_size: Option<usize>,
    /// Output size for Dense layer
    pub output_size: Option<usize>,
    /// Activation for Dense layer (default: linear)
    pub activation: Option<String>,
    /// Hidden size for SimpleRnn layer
    pub units: Option<usize>,
    /// Return the state at every timestep (default: false)
    pub return_sequences: Option<bool>,

    // TimeDistributed parameters
    /// Wrapped layer for TimeDistributed layers
    pub inner: Option<Box<LayerConfig>>,
}

/// Configuration for the entire model.
///
/// Contains a sequence of layer configurations applied in order, and an
/// optional input shape (`null` for unknown dimensions) used to check that the
/// layers fit together when the model is built.
///
/// # Example
///
/// ```json
/// {
///   "input_shape": [null, 4, 6],
///   "layers": [
///     { "layer_type": "embedding", "vocab_size": 100, "embedding_dim": 8, "mask_zero": true },
///     {
///       "layer_type": "time_distributed_rnn",
///       "inner": { "layer_type": "simple_rnn", "input_size": 8, "units": 16 }
///     },
///     { "layer_type": "masked_flatten" },
///     { "layer_type": "dense", "input_size": 64, "output_size": 3, "activation": "softmax" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureConfig {
    /// Input shape, `null` marking unknown dimensions
    pub input_shape: Option<Vec<Option<usize>>>,
    /// Sequence of layer configurations defining the network structure
    pub layers: Vec<LayerConfig>,
}

/// Loads an architecture configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into an `ArchitectureConfig`.
/// Performs validation on the configuration structure.
///
/// # Returns
///
/// `Ok(ArchitectureConfig)` on success, or an error if the file cannot be read, the JSON is
/// invalid or a layer is misconfigured.
///
/// # Examples
///
/// ```no_run
/// use masked_layers::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/slot_encoder.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: &str) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    debug!(path, layers = config.layers.len(), "loaded architecture");
    Ok(config)
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - Architecture has at least one layer
/// - Each layer has the required fields for its type
/// - Parameter values are within valid ranges
///
/// Whether consecutive layers fit together is checked by [`build_model`], which
/// runs shape inference when an input shape is configured.
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.layers.is_empty() {
        return Err(Error::config("Architecture must have at least one layer"));
    }

    for (i, layer) in config.layers.iter().enumerate() {
        validate_layer(layer, &format!("Layer {}", i))?;
    }

    Ok(())
}

fn require(value: Option<usize>, context: &str, kind: &str, field: &str) -> Result<usize> {
    match value {
        None => Err(Error::config(format!(
            "{}: {} layer requires '{}'",
            context, kind, field
        ))),
        Some(0) => Err(Error::config(format!(
            "{}: {} must be greater than 0",
            context, field
        ))),
        Some(value) => Ok(value),
    }
}

/// Validates a single layer configuration.
///
/// Checks that the layer has all required fields for its type and that
/// parameter values are within valid ranges.
fn validate_layer(layer: &LayerConfig, context: &str) -> Result<()> {
    let layer_type = layer.layer_type.to_lowercase();

    match layer_type.as_str() {
        "embedding" => {
            require(layer.vocab_size, context, "Embedding", "vocab_size")?;
            require(layer.embedding_dim, context, "Embedding", "embedding_dim")?;
        }
        "flatten" | "masked_flatten" => {}
        "dense" => {
            require(layer.input_size, context, "Dense", "input_size")?;
            require(layer.output_size, context, "Dense", "output_size")?;
            if let Some(activation) = &layer.activation {
                activation
                    .parse::<Activation>()
                    .map_err(|err| Error::config(format!("{}: {}", context, err)))?;
            }
        }
        "simple_rnn" => {
            require(layer.input_size, context, "SimpleRnn", "input_size")?;
            require(layer.units, context, "SimpleRnn", "units")?;
        }
        "time_distributed" | "time_distributed_rnn" => {
            let inner = layer.inner.as_deref().ok_or_else(|| {
                Error::config(format!(
                    "{}: {} layer requires 'inner'",
                    context, layer.layer_type
                ))
            })?;
            validate_layer(inner, &format!("{} (inner)", context))?;
        }
        _ => {
            return Err(Error::config(format!(
                "{}: Unknown layer type '{}'",
                context, layer.layer_type
            )));
        }
    }

    Ok(())
}

/// Builds a single layer from its configuration.
fn build_layer(
    layer: &LayerConfig,
    algebra: &Arc<dyn TensorAlgebra>,
    rng: &mut SimpleRng,
) -> Result<Box<dyn Layer>> {
    let layer_type = layer.layer_type.to_lowercase();
    let context = "build";

    let built: Box<dyn Layer> = match layer_type.as_str() {
        "embedding" => {
            let vocab_size = require(layer.vocab_size, context, "Embedding", "vocab_size")?;
            let embedding_dim =
                require(layer.embedding_dim, context, "Embedding", "embedding_dim")?;
            let mut embedding = EmbeddingLayer::new(vocab_size, embedding_dim, algebra.clone(), rng)
                .with_mask_zero(layer.mask_zero.unwrap_or(false));
            if !layer.any_shape.unwrap_or(true) {
                embedding = embedding.sequence_only();
            }
            Box::new(embedding)
        }
        "flatten" => Box::new(FlattenLayer::new()),
        "masked_flatten" => Box::new(FlattenLayer::masked(algebra.clone())),
        "dense" => {
            let input_size = require(layer.input_size, context, "Dense", "input_size")?;
            let output_size = require(layer.output_size, context, "Dense", "output_size")?;
            let activation = match &layer.activation {
                Some(name) => name.parse::<Activation>()?,
                None => Activation::Linear,
            };
            Box::new(DenseLayer::new(input_size, output_size, rng).with_activation(activation))
        }
        "simple_rnn" => {
            let input_size = require(layer.input_size, context, "SimpleRnn", "input_size")?;
            let units = require(layer.units, context, "SimpleRnn", "units")?;
            Box::new(
                SimpleRnnLayer::new(input_size, units, rng)
                    .with_return_sequences(layer.return_sequences.unwrap_or(false)),
            )
        }
        "time_distributed" | "time_distributed_rnn" => {
            let inner_config = layer.inner.as_deref().ok_or_else(|| {
                Error::config(format!("{} layer requires 'inner'", layer.layer_type))
            })?;
            let inner = build_layer(inner_config, algebra, rng)?;
            if layer_type == "time_distributed_rnn" {
                Box::new(TimeDistributed::rnn(inner, algebra.clone()))
            } else {
                Box::new(TimeDistributed::new(inner, algebra.clone()))
            }
        }
        _ => {
            return Err(Error::config(format!(
                "Unknown layer type: {}",
                layer.layer_type
            )))
        }
    };

    Ok(built)
}

/// Builds a sequential model from an architecture configuration.
///
/// Every layer that needs backend operations receives `algebra`; weights are
/// drawn from `rng` in layer order, so the same seed gives the same model.
///
/// # Errors
///
/// Returns an error if a layer is misconfigured or, when `input_shape` is
/// configured, if the layers do not fit together.
///
/// # Examples
///
/// ```no_run
/// use masked_layers::architecture::{build_model, load_architecture};
/// use masked_layers::backend::{select_backend, BackendKind};
/// use masked_layers::utils::SimpleRng;
///
/// let config = load_architecture("config/architectures/slot_encoder.json").unwrap();
/// let mut rng = SimpleRng::new(42);
/// let model = build_model(&config, select_backend(BackendKind::Graph), &mut rng).unwrap();
/// ```
pub fn build_model(
    config: &ArchitectureConfig,
    algebra: Arc<dyn TensorAlgebra>,
    rng: &mut SimpleRng,
) -> Result<Sequential> {
    validate_architecture(config)?;

    let mut model = Sequential::new();
    for layer in &config.layers {
        model.push(build_layer(layer, &algebra, rng)?);
    }

    if let Some(dims) = &config.input_shape {
        let output = model.output_shape(&Shape::from(dims.clone()))?;
        info!(
            backend = %algebra.kind(),
            layers = model.len(),
            parameters = model.parameter_count(),
            output_shape = %output,
            "built model"
        );
    } else {
        info!(
            backend = %algebra.kind(),
            layers = model.len(),
            parameters = model.parameter_count(),
            "built model"
        );
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{select_backend, BackendKind};

    fn parse(json: &str) -> ArchitectureConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_validate_empty() {
        let config = parse(r#"{ "layers": [] }"#);
        assert!(validate_architecture(&config).is_err());
    }

    #[test]
    fn test_validate_nested_inner_error() {
        let config = parse(
            r#"{ "layers": [ { "layer_type": "time_distributed_rnn",
                "inner": { "layer_type": "simple_rnn", "input_size": 4 } } ] }"#,
        );
        let err = validate_architecture(&config).unwrap_err().to_string();
        assert!(err.contains("Layer 0 (inner)"), "{}", err);
        assert!(err.contains("units"), "{}", err);
    }

    #[test]
    fn test_build_time_distributed_names() {
        let config = parse(
            r#"{ "layers": [
                { "layer_type": "time_distributed",
                  "inner": { "layer_type": "dense", "input_size": 3, "output_size": 2 } },
                { "layer_type": "time_distributed_rnn",
                  "inner": { "layer_type": "flatten" } }
            ] }"#,
        );
        let mut rng = SimpleRng::new(42);
        let model = build_model(&config, select_backend(BackendKind::Graph), &mut rng).unwrap();
        assert_eq!(
            model.layer_names(),
            vec!["time_distributed", "time_distributed_rnn"]
        );
    }
}
