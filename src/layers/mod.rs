//! Layer abstractions for sequence models
//!
//! This module provides the Layer trait, the mask/shape strategies layers are
//! composed from, and the layer types themselves.

mod r#trait;
pub mod dense;
pub mod embedding;
pub mod flatten;
pub mod recurrent;
pub mod strategy;
pub mod time_distributed;

// Re-export the Layer trait for convenience
pub use r#trait::Layer;
pub use dense::DenseLayer;
pub use embedding::EmbeddingLayer;
pub use flatten::FlattenLayer;
pub use recurrent::SimpleRnnLayer;
pub use strategy::{
    AnyOverLastAxis, AnyRank, ConsumeMask, MaskStrategy, NonZeroInput, PropagateMask,
    SequenceOnly, ShapeStrategy,
};
pub use time_distributed::TimeDistributed;
