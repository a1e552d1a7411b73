//! The inference worker.
//!
//! Owns an [`ImageEmbedder`] exclusively and serves batches one at a time,
//! so the model is never called concurrently. The handle implements the
//! core's [`BatchEmbedder`] contract and validates the model's positional
//! and dimensional guarantees before results reach the pipeline.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use photosort_core::{BatchEmbedder, CoreError, CoreResult, DecodedImage};

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::model::ImageEmbedder;

struct EmbedRequest {
    batch: Vec<DecodedImage>,
    reply: oneshot::Sender<EmbeddingResult<Vec<Vec<f32>>>>,
}

/// Handle to the inference worker. Cloneable; all clones feed the same
/// serialized model.
#[derive(Clone)]
pub struct EmbedderHandle {
    tx: mpsc::Sender<EmbedRequest>,
    dimension: usize,
}

impl EmbedderHandle {
    /// Submit a batch to the worker.
    pub async fn embed_batch(&self, batch: Vec<DecodedImage>) -> EmbeddingResult<Vec<Vec<f32>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EmbedRequest { batch, reply })
            .await
            .map_err(|_| EmbeddingError::WorkerClosed)?;
        rx.await.map_err(|_| EmbeddingError::WorkerClosed)?
    }
}

#[async_trait]
impl BatchEmbedder for EmbedderHandle {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, batch: &[DecodedImage]) -> CoreResult<Vec<Vec<f32>>> {
        self.embed_batch(batch.to_vec())
            .await
            .map_err(|e| CoreError::embedding(e.to_string()))
    }
}

/// Spawn the inference worker around a model.
///
/// The worker validates every batch result against the model's declared
/// dimension and the one-to-one ordering contract; violations surface as
/// batch failures rather than corrupt records.
pub fn spawn_inference_worker(
    mut embedder: Box<dyn ImageEmbedder>,
) -> (EmbedderHandle, JoinHandle<()>) {
    let dimension = embedder.dimension();
    let (tx, mut rx) = mpsc::channel::<EmbedRequest>(8);

    let join = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let result = run_batch(embedder.as_mut(), &request.batch);
            let _ = request.reply.send(result);
        }
        tracing::debug!("inference worker stopped");
    });

    (EmbedderHandle { tx, dimension }, join)
}

fn run_batch(
    embedder: &mut dyn ImageEmbedder,
    batch: &[DecodedImage],
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let expected = embedder.dimension();
    let vectors = embedder.embed_batch(batch)?;

    if vectors.len() != batch.len() {
        return Err(EmbeddingError::CountMismatch {
            inputs: batch.len(),
            outputs: vectors.len(),
        });
    }
    for vector in &vectors {
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(vectors)
}
