//! Pipeline configuration.
//!
//! A closed configuration record whose fields are enumerated here; invalid
//! combinations are rejected at construction. Runtime-tunable settings
//! (`k`, `threshold`, `refresh_interval`) have dedicated setters on the
//! coordinator handle; the rest are fixed for the session.

use crate::error::{CoreError, CoreResult};

/// Default number of clusters.
pub const DEFAULT_K: usize = 6;

/// Default cosine-distance deduplication threshold for representative
/// selection.
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.15;

/// Default flush cadence in records.
pub const DEFAULT_REFRESH_INTERVAL: usize = 20;

/// Default embedding batch size.
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Default Lloyd's iteration cap.
pub const DEFAULT_ITERATION_CAP: usize = 20;

/// Default representatives per cluster. The freeze contract requires a
/// cluster to carry exactly this many representatives before it can be
/// frozen.
pub const DEFAULT_REPRESENTATIVES_PER_CLUSTER: usize = 16;

/// Maximum yield between producer batches, in milliseconds. Keeps the
/// presentation surface responsive while embedding runs.
pub const INTER_BATCH_YIELD_MS: u64 = 30;

/// Configuration for the photosort pipeline.
///
/// All parameters are validated at construction time via [`PipelineConfig::validate`].
///
/// # Example
///
/// ```
/// use photosort_core::PipelineConfig;
///
/// let config = PipelineConfig::default().with_k(8).with_threshold(0.2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of clusters. Must be >= 2. Clamped to the record count when
    /// fewer records exist.
    pub k: usize,

    /// Cosine-distance dedup threshold for representative selection, in
    /// `[0, 1]`. `0` admits all candidates; `1` effectively allows only the
    /// single closest member.
    pub threshold: f32,

    /// Flush cadence: the producer flushes after this many newly produced
    /// records. May be changed mid-run; the next flush uses the new value.
    pub refresh_interval: usize,

    /// Embedding batch size.
    pub batch_size: usize,

    /// Lloyd's iteration cap.
    pub iteration_cap: usize,

    /// Representatives per cluster. The freeze contract requires exactly
    /// this many.
    pub representatives_per_cluster: usize,

    /// Seed for all sampling (K-Means++ init, orphan re-seeding, producer
    /// batch selection). `None` draws a seed at startup.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            threshold: DEFAULT_DEDUP_THRESHOLD,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            iteration_cap: DEFAULT_ITERATION_CAP,
            representatives_per_cluster: DEFAULT_REPRESENTATIVES_PER_CLUSTER,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigError` naming the offending field if any
    /// value is out of range.
    pub fn validate(&self) -> CoreResult<()> {
        if self.k < 2 {
            return Err(CoreError::config(format!("k must be >= 2, got {}", self.k)));
        }
        if !self.threshold.is_finite() {
            return Err(CoreError::config("threshold must be a finite number"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CoreError::config(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.refresh_interval == 0 {
            return Err(CoreError::config("refresh_interval must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(CoreError::config("batch_size must be > 0"));
        }
        if self.iteration_cap == 0 {
            return Err(CoreError::config("iteration_cap must be > 0"));
        }
        if self.representatives_per_cluster == 0 {
            return Err(CoreError::config("representatives_per_cluster must be > 0"));
        }
        Ok(())
    }

    /// Minimum member overlap for a frozen group to claim a cluster in a new
    /// pass: half the representative count.
    #[inline]
    pub fn min_freeze_match(&self) -> usize {
        self.representatives_per_cluster / 2
    }

    /// Set the number of clusters.
    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the dedup threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the flush cadence.
    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: usize) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// Set the embedding batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the Lloyd's iteration cap.
    #[must_use]
    pub fn with_iteration_cap(mut self, iteration_cap: usize) -> Self {
        self.iteration_cap = iteration_cap;
        self
    }

    /// Set the sampling seed (reproducible runs).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k, DEFAULT_K);
        assert_eq!(config.representatives_per_cluster, 16);
        assert_eq!(config.min_freeze_match(), 8);
    }

    #[test]
    fn rejects_k_below_two() {
        let config = PipelineConfig::default().with_k(1);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("k must be >= 2"));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        assert!(PipelineConfig::default()
            .with_threshold(1.5)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_threshold(-0.1)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_threshold(f32::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn accepts_threshold_boundaries() {
        assert!(PipelineConfig::default()
            .with_threshold(0.0)
            .validate()
            .is_ok());
        assert!(PipelineConfig::default()
            .with_threshold(1.0)
            .validate()
            .is_ok());
    }

    #[test]
    fn rejects_zero_cadences() {
        assert!(PipelineConfig::default()
            .with_refresh_interval(0)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_batch_size(0)
            .validate()
            .is_err());
        assert!(PipelineConfig::default()
            .with_iteration_cap(0)
            .validate()
            .is_err());
    }
}
