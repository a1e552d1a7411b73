//! The embedding model trait.

use photosort_core::DecodedImage;

use crate::error::EmbeddingResult;

/// A vision model that embeds decoded images into fixed-width vectors.
///
/// Implementations are owned exclusively by the inference worker and are
/// never called concurrently, so they only need `Send`, not `Sync`.
/// Output vectors must correspond positionally to the input batch and all
/// carry the model's declared [`dimension`](ImageEmbedder::dimension).
pub trait ImageEmbedder: Send {
    /// The model's output width. Fixed for the life of the model.
    fn dimension(&self) -> usize;

    /// Embed a batch, one output vector per input in order.
    ///
    /// # Errors
    /// `EmbeddingError::BatchFailed` when the batch fails as a whole; the
    /// pipeline marks the batch's paths as processed and continues.
    fn embed_batch(&mut self, batch: &[DecodedImage]) -> EmbeddingResult<Vec<Vec<f32>>>;
}
