//! Error types for photosort-embeddings.

use thiserror::Error;

/// Errors from embedding models and the inference worker.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model failed to embed a batch.
    #[error("Batch embedding failed: {0}")]
    BatchFailed(String),

    /// The model produced a vector of unexpected width.
    #[error("Model produced dimension {actual}, expected {expected}")]
    DimensionMismatch {
        /// The model's declared output width
        expected: usize,
        /// The width actually produced
        actual: usize,
    },

    /// The model broke the one-to-one input/output correspondence.
    #[error("Model returned {outputs} vectors for {inputs} inputs")]
    CountMismatch {
        /// Batch size submitted
        inputs: usize,
        /// Vectors returned
        outputs: usize,
    },

    /// An image could not be read or decoded.
    #[error("Failed to decode '{path}': {message}")]
    DecodeFailed {
        /// The offending path
        path: String,
        /// Decoder error text
        message: String,
    },

    /// The inference worker has shut down.
    #[error("Inference worker is no longer running")]
    WorkerClosed,
}

impl EmbeddingError {
    /// Construct a `BatchFailed` from anything displayable.
    pub fn batch(msg: impl Into<String>) -> Self {
        EmbeddingError::BatchFailed(msg.into())
    }
}

/// Result type alias for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
