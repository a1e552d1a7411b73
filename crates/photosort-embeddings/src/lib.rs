#![deny(deprecated)]

//! Photosort Embeddings
//!
//! The embedding model seam: an [`ImageEmbedder`] trait for vision models,
//! an inference worker that owns a model exclusively and serializes calls
//! into it, and a deterministic projection embedder used by tests and by
//! the CLI's mock mode.
//!
//! The worker boundary mirrors the clustering worker in photosort-core:
//! requests cross a bounded channel with a oneshot reply, the model never
//! needs to be thread-safe, and the handle implements the core's
//! [`BatchEmbedder`](photosort_core::BatchEmbedder) contract.

pub mod error;
pub mod fs;
pub mod model;
pub mod projection;
pub mod worker;

pub use error::{EmbeddingError, EmbeddingResult};
pub use fs::FsImageOpener;
pub use model::ImageEmbedder;
pub use projection::ProjectionEmbedder;
pub use worker::{spawn_inference_worker, EmbedderHandle};
