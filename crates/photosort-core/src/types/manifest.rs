//! Per-project manifest.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The single manifest value persisted per project.
///
/// A corrupted manifest on load is treated as "no prior session".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Number of images embedded so far.
    pub processed_count: usize,

    /// Total images discovered by the scanner.
    pub total_images_found: usize,

    /// Paths the user excluded, including preemptive exclusions of images
    /// not yet embedded.
    pub excluded_images: Vec<String>,

    /// Unix epoch milliseconds of the last flush.
    pub last_updated: i64,
}

impl ProjectManifest {
    /// Create a manifest stamped with the current time.
    pub fn new(
        processed_count: usize,
        total_images_found: usize,
        excluded_images: Vec<String>,
    ) -> Self {
        Self {
            processed_count,
            total_images_found,
            excluded_images,
            last_updated: Utc::now().timestamp_millis(),
        }
    }
}
