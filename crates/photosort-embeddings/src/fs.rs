//! Filesystem image opener.

use std::path::PathBuf;

use async_trait::async_trait;

use photosort_core::{CoreError, CoreResult, DecodedImage, ImageOpener};

use crate::error::EmbeddingError;

/// Opens and decodes images from a project root on disk.
///
/// Decoding runs on the blocking pool so the orchestrating task stays
/// responsive.
pub struct FsImageOpener {
    root: PathBuf,
}

impl FsImageOpener {
    /// Create an opener rooted at the project folder.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageOpener for FsImageOpener {
    async fn open(&self, path: &str) -> CoreResult<DecodedImage> {
        let full = self.root.join(path);
        let path_owned = path.to_string();
        let decoded = tokio::task::spawn_blocking(move || {
            let img = image::open(&full).map_err(|e| EmbeddingError::DecodeFailed {
                path: path_owned.clone(),
                message: e.to_string(),
            })?;
            let rgb = img.to_rgb8();
            Ok::<_, EmbeddingError>(DecodedImage::new(
                rgb.width(),
                rgb.height(),
                rgb.into_raw(),
            ))
        })
        .await
        .map_err(|e| CoreError::Internal(format!("decode task panicked: {e}")))?
        .map_err(|e| CoreError::embedding(e.to_string()))?;
        Ok(decoded)
    }
}
