//! Seams to the external collaborators.
//!
//! The core consumes an embedder, an image opener, and a durable record
//! store, and produces to a presentation surface. Each is a trait here so
//! higher layers depend on contracts, not concrete types, and so tests can
//! substitute deterministic fakes.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{ClusterSet, DecodedImage, EmbeddingRecord, ProjectManifest};

/// Batch embedding contract consumed by the producer.
///
/// Output vectors correspond positionally to the input batch. The
/// implementation is expected to serialize calls into the underlying model;
/// the core never assumes the model is thread-safe.
#[async_trait]
pub trait BatchEmbedder: Send + Sync {
    /// Output width of the model. Fixed at first use for a project.
    fn dimension(&self) -> usize;

    /// Embed a batch of decoded images, one output vector per input.
    ///
    /// # Errors
    /// `CoreError::Embedding` if the batch fails as a whole. The caller
    /// marks the batch's paths as processed and continues.
    async fn embed(&self, batch: &[DecodedImage]) -> CoreResult<Vec<Vec<f32>>>;
}

/// Opens an image handle into decoded pixels.
#[async_trait]
pub trait ImageOpener: Send + Sync {
    /// Decode the image at `path` (relative to the project root).
    async fn open(&self, path: &str) -> CoreResult<DecodedImage>;
}

/// Durable keyed record store, one namespace per project.
///
/// Composite keys are `"{project}|{path}"`; the manifest is a single value
/// per project. Implementations must make `put_records` atomic with respect
/// to concurrent readers.
pub trait ProjectStore: Send + Sync {
    /// Append or replace records for a project.
    fn put_records(&self, project: &str, records: &[EmbeddingRecord]) -> CoreResult<()>;

    /// All records previously persisted for a project, via by-prefix scan.
    fn records_for_project(&self, project: &str) -> CoreResult<Vec<EmbeddingRecord>>;

    /// Write the project manifest.
    fn put_manifest(&self, project: &str, manifest: &ProjectManifest) -> CoreResult<()>;

    /// Read the project manifest. A corrupted manifest reads as `None`
    /// ("no prior session").
    fn get_manifest(&self, project: &str) -> CoreResult<Option<ProjectManifest>>;
}

/// Progress statistics published to the presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Images embedded so far.
    pub processed: usize,
    /// Total images discovered.
    pub total: usize,
    /// Average seconds per image over the run.
    pub speed_sec_per_image: f64,
    /// Estimated remaining time in milliseconds.
    pub eta_millis: u64,
    /// Human-readable description of the current action.
    pub current_action: String,
    /// Whether the run has finished.
    pub completed: bool,
}

impl ProgressStats {
    /// Stats for a run that has produced `processed` of `total` records in
    /// `elapsed_secs` seconds.
    pub fn measured(processed: usize, total: usize, elapsed_secs: f64, action: &str) -> Self {
        let speed = if processed > 0 {
            elapsed_secs / processed as f64
        } else {
            0.0
        };
        let remaining = total.saturating_sub(processed);
        let eta_millis = (speed * remaining as f64 * 1000.0) as u64;
        Self {
            processed,
            total,
            speed_sec_per_image: speed,
            eta_millis,
            current_action: action.to_string(),
            completed: processed >= total,
        }
    }
}

/// The presentation surface.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Render a new pass result.
    async fn render(&self, set: &ClusterSet);

    /// Publish progress statistics.
    async fn notify_stats(&self, stats: &ProgressStats);
}
