//! The coordinator.
//!
//! Single entry point for re-cluster requests, exclusions, freeze
//! transitions, and settings changes. Owns the store and the freeze manager
//! on one task; the clustering worker runs passes and replies over a
//! oneshot channel.
//!
//! # Coalescing
//!
//! `request_recluster` while a pass is in flight sets a pending flag and
//! returns; completion of the in-flight pass triggers exactly one follow-up
//! pass no matter how many requests arrived meanwhile.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::error::{CoreError, CoreResult};
use crate::freeze::FreezeManager;
use crate::store::EmbeddingStore;
use crate::traits::{Presenter, ProjectStore};
use crate::types::{ClusterSet, EmbeddingRecord};

use super::worker::ClusterWorkerHandle;

/// Commands accepted by the coordinator task.
enum Command {
    PutRecords {
        records: Vec<EmbeddingRecord>,
        total_images_found: usize,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    RequestRecluster,
    Exclude {
        path: String,
        reply: oneshot::Sender<CoreResult<bool>>,
    },
    Restore {
        path: String,
        reply: oneshot::Sender<bool>,
    },
    Freeze {
        index: usize,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    Unfreeze {
        index: usize,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    SetK {
        k: usize,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    SetThreshold {
        threshold: f32,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    LatestClusters {
        reply: oneshot::Sender<Option<ClusterSet>>,
    },
    WaitIdle {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Cloneable handle to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    async fn send(&self, command: Command) -> CoreResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))
    }

    /// Insert freshly produced records and persist the store snapshot.
    ///
    /// # Errors
    /// `CoreError::DimensionMismatch` is fatal for the session; persistence
    /// failures are absorbed (the next flush retries).
    pub async fn put_records(
        &self,
        records: Vec<EmbeddingRecord>,
        total_images_found: usize,
    ) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::PutRecords {
            records,
            total_images_found,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// Request a re-cluster pass. Coalesces with any pass in flight.
    pub async fn request_recluster(&self) -> CoreResult<()> {
        self.send(Command::RequestRecluster).await
    }

    /// Exclude a path from clustering. Returns whether the exclusion set
    /// changed.
    ///
    /// # Errors
    /// `CoreError::FrozenRepresentative` if the path is currently shown as
    /// a frozen cluster's representative.
    pub async fn exclude(&self, path: impl Into<String>) -> CoreResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Exclude {
            path: path.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// Restore a previously excluded path. Returns whether the exclusion
    /// set changed.
    pub async fn restore(&self, path: impl Into<String>) -> CoreResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Restore {
            path: path.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))
    }

    /// Freeze the cluster at `index` in the latest pass.
    pub async fn freeze(&self, index: usize) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Freeze { index, reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// Unfreeze the cluster at `index` and recompute its representatives.
    pub async fn unfreeze(&self, index: usize) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unfreeze { index, reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// Change the cluster count. Schedules an immediate re-cluster; the
    /// warm start is invalidated by centroid-count mismatch.
    pub async fn set_k(&self, k: usize) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetK { k, reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// Change the dedup threshold. Schedules an immediate re-cluster.
    pub async fn set_threshold(&self, threshold: f32) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetThreshold { threshold, reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))?
    }

    /// The most recently published pass, if any.
    pub async fn latest_clusters(&self) -> CoreResult<Option<ClusterSet>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::LatestClusters { reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))
    }

    /// Resolve once no pass is in flight and none is pending.
    pub async fn wait_idle(&self) -> CoreResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::WaitIdle { reply }).await?;
        rx.await
            .map_err(|_| CoreError::ChannelClosed("coordinator".into()))
    }

    /// Stop the coordinator task.
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.send(Command::Shutdown).await
    }
}

/// The coordinator task state.
pub struct Coordinator {
    store: EmbeddingStore,
    freeze: FreezeManager,
    worker: ClusterWorkerHandle,
    presenter: Arc<dyn Presenter>,
    project_store: Arc<dyn ProjectStore>,
    project: String,

    k: usize,
    threshold: f32,

    is_clustering: bool,
    pending_recluster: bool,
    latest: Option<ClusterSet>,
    warm_centroids: Option<Vec<Vec<f32>>>,

    /// Records inserted but not yet durably written. Persistence failures
    /// leave them here; the next flush retries the whole buffer.
    unpersisted: Vec<EmbeddingRecord>,
    total_images_found: usize,

    idle_waiters: Vec<oneshot::Sender<()>>,

    rx: mpsc::Receiver<Command>,
    inflight: Option<oneshot::Receiver<ClusterSet>>,
}

impl Coordinator {
    /// Spawn the coordinator task.
    pub fn spawn(
        store: EmbeddingStore,
        freeze: FreezeManager,
        worker: ClusterWorkerHandle,
        presenter: Arc<dyn Presenter>,
        project_store: Arc<dyn ProjectStore>,
        project: impl Into<String>,
        config: &PipelineConfig,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let total_images_found = store.len();
        let coordinator = Coordinator {
            store,
            freeze,
            worker,
            presenter,
            project_store,
            project: project.into(),
            k: config.k,
            threshold: config.threshold,
            is_clustering: false,
            pending_recluster: false,
            latest: None,
            warm_centroids: None,
            unpersisted: Vec::new(),
            total_images_found,
            idle_waiters: Vec::new(),
            rx,
            inflight: None,
        };
        let join = tokio::spawn(coordinator.run());
        (CoordinatorHandle { tx }, join)
    }

    async fn run(mut self) {
        loop {
            if let Some(mut pass_rx) = self.inflight.take() {
                tokio::select! {
                    result = &mut pass_rx => {
                        self.is_clustering = false;
                        match result {
                            Ok(set) => self.on_pass_complete(set).await,
                            Err(_) => {
                                tracing::warn!("clustering worker dropped an in-flight pass");
                                self.pending_recluster = false;
                                self.notify_idle();
                            }
                        }
                    }
                    maybe_cmd = self.rx.recv() => {
                        self.inflight = Some(pass_rx);
                        match maybe_cmd {
                            Some(cmd) => {
                                if self.handle(cmd).await {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                }
            } else {
                match self.rx.recv().await {
                    Some(cmd) => {
                        if self.handle(cmd).await {
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }

    /// Handle one command. Returns true on shutdown.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::PutRecords {
                records,
                total_images_found,
                reply,
            } => {
                self.total_images_found = total_images_found.max(self.store.len());
                let result = self.put_records(records);
                let _ = reply.send(result);
            }
            Command::RequestRecluster => self.request_recluster().await,
            Command::Exclude { path, reply } => {
                let result = self.store.exclude(&path);
                if let Ok(true) = result {
                    self.persist_manifest();
                    self.request_recluster().await;
                }
                let _ = reply.send(result);
            }
            Command::Restore { path, reply } => {
                let changed = self.store.restore(&path);
                if changed {
                    self.persist_manifest();
                    self.request_recluster().await;
                }
                let _ = reply.send(changed);
            }
            Command::Freeze { index, reply } => {
                let _ = reply.send(self.freeze_cluster(index).await);
            }
            Command::Unfreeze { index, reply } => {
                let _ = reply.send(self.unfreeze_cluster(index).await);
            }
            Command::SetK { k, reply } => {
                let result = if k < 2 {
                    Err(CoreError::config(format!("k must be >= 2, got {k}")))
                } else {
                    if k != self.k {
                        tracing::info!(old_k = self.k, new_k = k, "cluster count changed");
                        self.k = k;
                        self.request_recluster().await;
                    }
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Command::SetThreshold { threshold, reply } => {
                let result = if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
                    if threshold != self.threshold {
                        tracing::info!(threshold, "dedup threshold changed");
                        self.threshold = threshold;
                        self.request_recluster().await;
                    }
                    Ok(())
                } else {
                    Err(CoreError::config(format!(
                        "threshold must be in [0, 1], got {threshold}"
                    )))
                };
                let _ = reply.send(result);
            }
            Command::LatestClusters { reply } => {
                let _ = reply.send(self.latest.clone());
            }
            Command::WaitIdle { reply } => {
                if self.is_clustering || self.pending_recluster {
                    self.idle_waiters.push(reply);
                } else {
                    let _ = reply.send(());
                }
            }
            Command::Shutdown => return true,
        }
        false
    }

    /// Insert records into the store, then persist store and manifest.
    fn put_records(&mut self, records: Vec<EmbeddingRecord>) -> CoreResult<()> {
        self.store.put_many(records.clone())?;
        self.unpersisted.extend(records);
        self.persist_records();
        Ok(())
    }

    /// Durably write the unpersisted buffer and the manifest. Failures are
    /// logged and retried on the next flush; the in-memory view stays
    /// intact.
    fn persist_records(&mut self) {
        if self.unpersisted.is_empty() {
            self.persist_manifest();
            return;
        }
        match self
            .project_store
            .put_records(&self.project, &self.unpersisted)
        {
            Ok(()) => {
                self.unpersisted.clear();
                self.persist_manifest();
            }
            Err(e) => {
                tracing::warn!(error = %e, buffered = self.unpersisted.len(),
                    "record persistence failed; will retry on next flush");
            }
        }
    }

    fn persist_manifest(&mut self) {
        let manifest = self.store.manifest(self.total_images_found);
        if let Err(e) = self.project_store.put_manifest(&self.project, &manifest) {
            tracing::warn!(error = %e, "manifest persistence failed; will retry on next flush");
        }
    }

    /// Queue a pass, coalescing with any pass already in flight.
    async fn request_recluster(&mut self) {
        if self.is_clustering {
            self.pending_recluster = true;
            return;
        }
        self.start_pass().await;
    }

    async fn start_pass(&mut self) {
        let records = self.store.valid();
        tracing::debug!(records = records.len(), k = self.k, "starting clustering pass");
        match self
            .worker
            .submit(records, self.k, self.threshold, self.warm_centroids.clone())
            .await
        {
            Ok(rx) => {
                self.is_clustering = true;
                self.inflight = Some(rx);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to submit clustering pass");
                self.notify_idle();
            }
        }
    }

    /// Completion handling: apply the freeze manager, publish, retain the
    /// raw centroids for the next warm start, and run the coalesced
    /// follow-up if one is pending.
    async fn on_pass_complete(&mut self, set: ClusterSet) {
        self.warm_centroids = Some(set.centroids.clone());

        let set = self.freeze.apply(set, self.threshold);
        self.store.set_pinned(self.freeze.pinned_paths());

        self.presenter.render(&set).await;
        self.latest = Some(set);

        if self.pending_recluster {
            self.pending_recluster = false;
            self.start_pass().await;
        } else {
            self.notify_idle();
        }
    }

    async fn freeze_cluster(&mut self, index: usize) -> CoreResult<()> {
        let Some(mut latest) = self.latest.take() else {
            return Err(CoreError::ClusterNotFound { index });
        };
        let result = self.freeze.freeze(&mut latest, index);
        if result.is_ok() {
            self.store.set_pinned(self.freeze.pinned_paths());
            self.presenter.render(&latest).await;
        }
        self.latest = Some(latest);
        result
    }

    async fn unfreeze_cluster(&mut self, index: usize) -> CoreResult<()> {
        let Some(mut latest) = self.latest.take() else {
            return Err(CoreError::ClusterNotFound { index });
        };
        let result = self.freeze.unfreeze(&mut latest, index, self.threshold);
        if result.is_ok() {
            self.store.set_pinned(self.freeze.pinned_paths());
            self.presenter.render(&latest).await;
        }
        self.latest = Some(latest);
        result
    }

    fn notify_idle(&mut self) {
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}
