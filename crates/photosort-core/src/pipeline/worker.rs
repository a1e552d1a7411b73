//! The clustering worker task.
//!
//! Owns the [`ClusterEngine`] exclusively and serves one pass at a time.
//! A pass always runs to completion; there is no cancellation path.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::clustering::ClusterEngine;
use crate::error::{CoreError, CoreResult};
use crate::types::{ClusterSet, EmbeddingRecord};

/// Request envelope for one clustering pass.
#[derive(Debug)]
pub struct ClusterRequest {
    /// Snapshot of the non-excluded records.
    pub records: Vec<EmbeddingRecord>,
    /// Requested cluster count (clamped by the engine).
    pub k: usize,
    /// Representative dedup threshold.
    pub threshold: f32,
    /// Warm-start centroids from the previous pass, if any.
    pub previous_centroids: Option<Vec<Vec<f32>>>,
    /// Reply channel for the finished pass.
    pub reply: oneshot::Sender<ClusterSet>,
}

/// Handle for submitting passes to the clustering worker.
#[derive(Debug, Clone)]
pub struct ClusterWorkerHandle {
    tx: mpsc::Sender<ClusterRequest>,
}

impl ClusterWorkerHandle {
    /// A handle backed by a raw request channel, for tests and alternate
    /// worker implementations.
    pub fn manual(buffer: usize) -> (Self, mpsc::Receiver<ClusterRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Submit a pass and get a receiver for its result.
    ///
    /// # Errors
    /// `CoreError::ChannelClosed` if the worker has shut down.
    pub async fn submit(
        &self,
        records: Vec<EmbeddingRecord>,
        k: usize,
        threshold: f32,
        previous_centroids: Option<Vec<Vec<f32>>>,
    ) -> CoreResult<oneshot::Receiver<ClusterSet>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ClusterRequest {
                records,
                k,
                threshold,
                previous_centroids,
                reply,
            })
            .await
            .map_err(|_| CoreError::ChannelClosed("clustering worker".into()))?;
        Ok(rx)
    }
}

/// Spawn the clustering worker.
///
/// The worker drains its queue in order and exits when every handle is
/// dropped.
pub fn spawn_cluster_worker(mut engine: ClusterEngine) -> (ClusterWorkerHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ClusterRequest>(8);

    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let set = engine.update_clusters(
                &request.records,
                request.k,
                request.threshold,
                request.previous_centroids.as_deref(),
            );
            // A dropped reply just means the coordinator went away.
            let _ = request.reply.send(set);
        }
        tracing::debug!("clustering worker stopped");
    });

    (ClusterWorkerHandle { tx }, handle)
}
