//! The embedding producer.
//!
//! Picks batches of unprocessed paths uniformly at random without
//! replacement, decodes them, invokes the embedder once per batch, and
//! flushes buffered records to the coordinator every `refresh_interval`
//! records (or when the pool empties). Pausable and resumable with
//! level-triggered transitions; abort is terminal and drains the buffered
//! records without starting new batches.
//!
//! A batch that fails to open or embed is poisoned input: its paths are
//! recorded as exclusions through the coordinator, so they are persisted
//! with the session and never retried on resume.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

use crate::config::{PipelineConfig, INTER_BATCH_YIELD_MS};
use crate::error::CoreResult;
use crate::traits::{BatchEmbedder, ImageOpener, Presenter, ProgressStats};
use crate::types::EmbeddingRecord;

use super::coordinator::CoordinatorHandle;

/// Producer run state. Pause and resume are level-triggered; abort is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    /// Producing batches.
    Running,
    /// Holding at the next batch boundary until resumed.
    Paused,
    /// Stopping at the next batch boundary; buffered records still flush.
    Aborted,
}

/// Control handle for a running producer.
#[derive(Debug)]
pub struct ProducerGate {
    tx: watch::Sender<ProducerState>,
}

impl ProducerGate {
    /// Create a gate and the receiver a producer watches.
    pub fn new() -> (Self, watch::Receiver<ProducerState>) {
        let (tx, rx) = watch::channel(ProducerState::Running);
        (Self { tx }, rx)
    }

    /// Pause at the next batch boundary. No-op after abort.
    pub fn pause(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ProducerState::Running {
                *state = ProducerState::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Resume a paused producer. No-op after abort.
    pub fn resume(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ProducerState::Paused {
                *state = ProducerState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Abort: terminal, the producer drains and stops.
    pub fn abort(&self) {
        self.tx.send_if_modified(|state| {
            if *state != ProducerState::Aborted {
                *state = ProducerState::Aborted;
                true
            } else {
                false
            }
        });
    }
}

/// Outcome of a producer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    /// Records produced and flushed this run.
    pub produced: usize,
    /// Batches whose embedding call failed (their paths were durably
    /// excluded so a resumed session does not retry them).
    pub failed_batches: usize,
    /// Whether the run ended on an abort.
    pub aborted: bool,
}

/// The embedding producer.
pub struct Producer {
    opener: Arc<dyn ImageOpener>,
    embedder: Arc<dyn BatchEmbedder>,
    coordinator: CoordinatorHandle,
    presenter: Arc<dyn Presenter>,
    batch_size: usize,
    refresh_rx: watch::Receiver<usize>,
    state_rx: watch::Receiver<ProducerState>,
    rng: ChaCha8Rng,
}

impl Producer {
    /// Create a producer.
    ///
    /// `refresh_rx` carries the flush cadence and may be written mid-run;
    /// the next flush decision uses the current value. `state_rx` comes
    /// from a [`ProducerGate`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &PipelineConfig,
        opener: Arc<dyn ImageOpener>,
        embedder: Arc<dyn BatchEmbedder>,
        coordinator: CoordinatorHandle,
        presenter: Arc<dyn Presenter>,
        refresh_rx: watch::Receiver<usize>,
        state_rx: watch::Receiver<ProducerState>,
    ) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| rand::thread_rng().next_u64());
        Self {
            opener,
            embedder,
            coordinator,
            presenter,
            batch_size: config.batch_size,
            refresh_rx,
            state_rx,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Run until the pool of unprocessed paths empties or the gate aborts.
    ///
    /// `all_paths` is the scanner's enumeration; `processed` the paths
    /// already embedded in a prior session.
    ///
    /// # Errors
    /// Only fatal errors propagate (dimension mismatch, a dead
    /// coordinator). Embedding and persistence failures are absorbed:
    /// failed paths are excluded through the coordinator and the run
    /// continues.
    pub async fn run(
        mut self,
        all_paths: Vec<String>,
        processed: HashSet<String>,
    ) -> CoreResult<ProducerReport> {
        let total = all_paths.len();
        let mut pool: Vec<String> = all_paths
            .into_iter()
            .filter(|p| !processed.contains(p))
            .collect();
        let mut processed_count = total - pool.len();

        let mut pending: Vec<EmbeddingRecord> = Vec::new();
        let mut produced = 0usize;
        let mut failed_batches = 0usize;
        let started = Instant::now();
        let mut aborted = false;

        tracing::info!(total, remaining = pool.len(), "producer started");

        while !pool.is_empty() {
            if self.wait_until_runnable().await == ProducerState::Aborted {
                aborted = true;
                break;
            }

            let batch_paths = self.pick_batch(&mut pool);
            let (images, opened_paths, failed_paths) = self.open_batch(&batch_paths).await;
            processed_count += failed_paths.len();
            self.mark_failed(&failed_paths).await;

            if !images.is_empty() {
                match self.embedder.embed(&images).await {
                    Ok(vectors) if vectors.len() == opened_paths.len() => {
                        processed_count += opened_paths.len();
                        produced += opened_paths.len();
                        for (path, vector) in opened_paths.into_iter().zip(vectors) {
                            pending.push(EmbeddingRecord::new(path, vector));
                        }
                    }
                    Ok(vectors) => {
                        tracing::warn!(
                            expected = opened_paths.len(),
                            got = vectors.len(),
                            "embedder broke positional correspondence; batch excluded"
                        );
                        failed_batches += 1;
                        processed_count += opened_paths.len();
                        self.mark_failed(&opened_paths).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, batch = opened_paths.len(),
                            "embedding batch failed; batch excluded");
                        failed_batches += 1;
                        processed_count += opened_paths.len();
                        self.mark_failed(&opened_paths).await;
                    }
                }
            }

            let refresh_interval = *self.refresh_rx.borrow();
            if pending.len() >= refresh_interval {
                self.flush(&mut pending, total).await?;
            }

            let stats = ProgressStats::measured(
                processed_count,
                total,
                started.elapsed().as_secs_f64(),
                "embedding images",
            );
            self.presenter.notify_stats(&stats).await;

            tokio::time::sleep(Duration::from_millis(INTER_BATCH_YIELD_MS)).await;
        }

        if !pending.is_empty() {
            self.flush(&mut pending, total).await?;
        }

        let action = if aborted { "aborted" } else { "embedding complete" };
        let stats = ProgressStats {
            completed: !aborted && processed_count >= total,
            ..ProgressStats::measured(
                processed_count,
                total,
                started.elapsed().as_secs_f64(),
                action,
            )
        };
        self.presenter.notify_stats(&stats).await;

        tracing::info!(produced, failed_batches, aborted, "producer finished");
        Ok(ProducerReport {
            produced,
            failed_batches,
            aborted,
        })
    }

    /// Block while paused; report the level on exit. Level-triggered: a
    /// pause set and cleared between batch boundaries is never observed.
    async fn wait_until_runnable(&mut self) -> ProducerState {
        loop {
            let state = *self.state_rx.borrow();
            match state {
                ProducerState::Running => return ProducerState::Running,
                ProducerState::Aborted => return ProducerState::Aborted,
                ProducerState::Paused => {
                    if self.state_rx.changed().await.is_err() {
                        // Gate dropped while paused: treat as running.
                        return ProducerState::Running;
                    }
                }
            }
        }
    }

    /// Draw up to `batch_size` paths uniformly at random without
    /// replacement.
    fn pick_batch(&mut self, pool: &mut Vec<String>) -> Vec<String> {
        let count = self.batch_size.min(pool.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let i = self.rng.gen_range(0..pool.len());
            batch.push(pool.swap_remove(i));
        }
        batch
    }

    /// Decode a batch. Images that fail to open are dropped from the batch
    /// and returned separately so the caller can record them as poisoned.
    async fn open_batch(
        &self,
        paths: &[String],
    ) -> (Vec<crate::types::DecodedImage>, Vec<String>, Vec<String>) {
        let mut images = Vec::with_capacity(paths.len());
        let mut opened = Vec::with_capacity(paths.len());
        let mut failed = Vec::new();
        for path in paths {
            match self.opener.open(path).await {
                Ok(image) => {
                    images.push(image);
                    opened.push(path.clone());
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "failed to open image; excluded");
                    failed.push(path.clone());
                }
            }
        }
        (images, opened, failed)
    }

    /// Durably mark poisoned paths by excluding them through the
    /// coordinator. The exclusion lands in the persisted manifest, so a
    /// resumed session skips these paths instead of retrying them forever.
    /// A path that never produced a record cannot be a frozen
    /// representative, so the exclusion is only refused when the
    /// coordinator itself is gone.
    async fn mark_failed(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.coordinator.exclude(path.as_str()).await {
                tracing::warn!(path, error = %e, "failed to record poisoned path");
            }
        }
    }

    /// Flush buffered records: insert + persist on the coordinator, then
    /// notify it that new data is available.
    async fn flush(&mut self, pending: &mut Vec<EmbeddingRecord>, total: usize) -> CoreResult<()> {
        let records: Vec<EmbeddingRecord> = pending.drain(..).collect();
        tracing::debug!(records = records.len(), "flushing produced records");
        self.coordinator.put_records(records, total).await?;
        self.coordinator.request_recluster().await?;
        Ok(())
    }
}
