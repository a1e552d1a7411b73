//! Embedding records.

use serde::{Deserialize, Serialize};

/// One image's embedding, keyed by its path.
///
/// The path is an opaque string relative to the project root and is the
/// identity key everywhere in the system. Records are created by the
/// producer, never mutated, and destroyed only when the project is
/// discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Identity key: the image's path relative to the project root.
    pub path: String,

    /// The embedding vector. Dimension is fixed per project at first use;
    /// vectors are not necessarily unit-normalized.
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    /// Create a new record.
    pub fn new(path: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            path: path.into(),
            vector,
        }
    }

    /// Dimension of this record's vector.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
