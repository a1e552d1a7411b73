#![deny(deprecated)]

//! Photosort Storage Layer
//!
//! Durable persistence for embedding records and project manifests using
//! RocksDB as the underlying engine.
//!
//! # Architecture
//! - `rocksdb_store`: [`RocksDbProjectStore`], the production implementation
//!   of the core's `ProjectStore` trait
//! - `column_families`: column family definitions (`records`, `manifests`)
//! - `keys`: composite `"{project}|{path}"` key construction and parsing
//! - `serialization`: raw little-endian f32 vector bytes for records,
//!   bincode for manifests
//!
//! Record writes are batched atomically; loading a project is a by-prefix
//! scan. The manifest is a single value per project, and a corrupted
//! manifest reads as "no prior session".

pub mod column_families;
pub mod error;
pub mod keys;
pub mod rocksdb_store;
pub mod serialization;

pub use column_families::{cf_descriptors, CF_MANIFESTS, CF_RECORDS};
pub use error::{StorageError, StorageResult};
pub use keys::{parse_record_key, record_key, record_prefix};
pub use rocksdb_store::RocksDbProjectStore;
pub use serialization::{
    decode_manifest, decode_vector, encode_manifest, encode_vector, SerializationError,
};
