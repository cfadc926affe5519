//! Error types for layer, tensor and configuration operations
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! the single [`Error`] enum below.

use thiserror::Error;

/// The main error type for masked_layers operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Two shapes that must be identical differ.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// Two shapes cannot be broadcast against each other.
    #[error("Incompatible shapes for broadcasting: {lhs:?} and {rhs:?}")]
    IncompatibleShapes {
        /// Left-hand operand shape.
        lhs: Vec<usize>,
        /// Right-hand operand shape.
        rhs: Vec<usize>,
    },

    /// A layer received input of a rank it cannot handle.
    #[error("{layer}: expected input of rank {expected}, got rank {actual}")]
    RankMismatch {
        /// Layer reporting the error.
        layer: String,
        /// Human-readable description of the accepted rank(s).
        expected: String,
        /// The rank that was received.
        actual: usize,
    },

    /// Axis out of range for a tensor of the given rank.
    #[error("Invalid axis {axis} for tensor with {rank} dimensions")]
    InvalidAxis {
        /// Requested axis (negative counts from the end).
        axis: isize,
        /// Rank of the tensor.
        rank: usize,
    },

    /// Buffer length does not match the shape it is paired with.
    #[error("Data length {actual} does not match shape {shape:?} ({expected} elements)")]
    DataLength {
        /// Shape the data was paired with.
        shape: Vec<usize>,
        /// Number of elements implied by the shape.
        expected: usize,
        /// Number of elements supplied.
        actual: usize,
    },

    /// Shape inference needed a dimension that is not known.
    #[error("{layer}: shape {shape} is not fully defined")]
    UndefinedShape {
        /// Layer reporting the error.
        layer: String,
        /// Rendered input shape.
        shape: String,
    },

    /// Embedding index outside the vocabulary.
    #[error("Embedding index {index} out of range for vocabulary of size {vocab_size}")]
    IndexOutOfRange {
        /// Offending index value as stored in the input.
        index: f32,
        /// Vocabulary size of the embedding.
        vocab_size: usize,
    },

    /// A mask reached a layer that does not support masking.
    #[error("Layer {layer} does not support masking, but was passed an input mask")]
    MaskingUnsupported {
        /// Layer that received the mask.
        layer: String,
    },

    /// Backend name that is neither the graph nor the symbolic backend.
    #[error("Unsupported backend '{0}'. Must be one of: graph, symbolic")]
    UnsupportedBackend(String),

    /// Invalid configuration contents.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for masked_layers operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::InvalidConfig`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfig(message.into())
    }
}
