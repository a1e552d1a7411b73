//! Core data model.
//!
//! # Key Types
//!
//! - [`EmbeddingRecord`]: a path plus its fixed-width embedding vector
//! - [`Cluster`] / [`Representative`] / [`ClusterSet`]: the result of one
//!   clustering pass
//! - [`ProjectManifest`]: the single per-project manifest value persisted
//!   alongside the records
//! - [`DecodedImage`]: raw RGB pixels handed to the embedder

pub mod cluster;
pub mod image;
pub mod manifest;
pub mod record;

pub use cluster::{Cluster, ClusterSet, Representative};
pub use image::DecodedImage;
pub use manifest::ProjectManifest;
pub use record::EmbeddingRecord;
