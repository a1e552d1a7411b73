//! Deterministic projection embedder.
//!
//! Embeds an image by projecting its downsampled pixel statistics through
//! a seeded random matrix. Not a semantic model: the same pixels always
//! produce the same vector, and visually identical images land close
//! together, which is exactly what tests and the CLI's mock mode need.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use photosort_core::DecodedImage;

use crate::error::EmbeddingResult;
use crate::model::ImageEmbedder;

/// Number of coarse input features extracted per image: a 4x4 grid of mean
/// RGB values.
const GRID: usize = 4;
const FEATURES: usize = GRID * GRID * 3;

/// Seeded random-projection embedder.
pub struct ProjectionEmbedder {
    dimension: usize,
    /// Row-major `dimension x FEATURES` projection matrix.
    projection: Vec<f32>,
}

impl ProjectionEmbedder {
    /// Create an embedder with the given output width and seed.
    pub fn new(dimension: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let projection = (0..dimension * FEATURES)
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        Self {
            dimension,
            projection,
        }
    }

    /// Mean RGB per cell of a GRID x GRID partition.
    fn features(image: &DecodedImage) -> [f32; FEATURES] {
        let mut sums = [0.0f64; FEATURES];
        let mut counts = [0u64; FEATURES / 3];

        let width = image.width.max(1) as usize;
        let height = image.height.max(1) as usize;
        for y in 0..height {
            for x in 0..width {
                let cell_x = x * GRID / width;
                let cell_y = y * GRID / height;
                let cell = cell_y * GRID + cell_x;
                let offset = (y * width + x) * 3;
                if offset + 2 < image.pixels.len() {
                    for c in 0..3 {
                        sums[cell * 3 + c] += image.pixels[offset + c] as f64;
                    }
                    counts[cell] += 1;
                }
            }
        }

        let mut features = [0.0f32; FEATURES];
        for cell in 0..FEATURES / 3 {
            if counts[cell] > 0 {
                for c in 0..3 {
                    features[cell * 3 + c] =
                        (sums[cell * 3 + c] / counts[cell] as f64 / 255.0) as f32;
                }
            }
        }
        features
    }
}

impl ImageEmbedder for ProjectionEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&mut self, batch: &[DecodedImage]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(batch
            .iter()
            .map(|image| {
                let features = Self::features(image);
                (0..self.dimension)
                    .map(|row| {
                        let base = row * FEATURES;
                        features
                            .iter()
                            .enumerate()
                            .map(|(i, f)| f * self.projection[base + i])
                            .sum()
                    })
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photosort_core::cosine_distance;

    fn solid(r: u8, g: u8, b: u8) -> DecodedImage {
        let pixels: Vec<u8> = (0..64).flat_map(|_| [r, g, b]).collect();
        DecodedImage::new(8, 8, pixels)
    }

    #[test]
    fn deterministic_for_identical_input() {
        let mut embedder = ProjectionEmbedder::new(32, 7);
        let a = embedder.embed_batch(&[solid(200, 10, 10)]).unwrap();
        let b = embedder.embed_batch(&[solid(200, 10, 10)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn output_width_matches_dimension() {
        let mut embedder = ProjectionEmbedder::new(64, 7);
        let out = embedder
            .embed_batch(&[solid(1, 2, 3), solid(4, 5, 6)])
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.len() == 64));
    }

    #[test]
    fn similar_images_are_closer_than_different_ones() {
        let mut embedder = ProjectionEmbedder::new(32, 7);
        let out = embedder
            .embed_batch(&[solid(250, 0, 0), solid(240, 10, 5), solid(0, 0, 250)])
            .unwrap();
        let near = cosine_distance(&out[0], &out[1]);
        let far = cosine_distance(&out[0], &out[2]);
        assert!(near < far, "near={near} far={far}");
    }
}
