//! Binary serialization utilities.
//!
//! # Serialization Strategy
//! - **Embedding vectors**: raw little-endian f32 bytes, 4 bytes per
//!   component. The path lives in the key, so the value is just the vector.
//! - **Manifests**: bincode, a fixed-layout struct.

use thiserror::Error;

use photosort_core::ProjectManifest;

/// Errors during serialization and deserialization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SerializationError {
    /// Serialization failed.
    #[error("Serialization failed: {0}")]
    SerializeFailed(String),

    /// Deserialization failed.
    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    /// Vector byte length is not a multiple of 4.
    #[error("Invalid vector bytes: length {actual} is not a multiple of 4")]
    InvalidVectorSize {
        /// Byte count received
        actual: usize,
    },
}

/// Encode an embedding vector as raw little-endian f32 bytes. Infallible.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode raw little-endian f32 bytes into a vector.
///
/// # Errors
/// `SerializationError::InvalidVectorSize` when the byte count is not a
/// multiple of 4.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, SerializationError> {
    if bytes.len() % 4 != 0 {
        return Err(SerializationError::InvalidVectorSize {
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Encode a manifest with bincode.
pub fn encode_manifest(manifest: &ProjectManifest) -> Result<Vec<u8>, SerializationError> {
    bincode::serialize(manifest).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Decode a bincode manifest.
pub fn decode_manifest(bytes: &[u8]) -> Result<ProjectManifest, SerializationError> {
    bincode::deserialize(bytes).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_round_trip() {
        let vector = vec![0.5f32, -1.25, 3.75, f32::MIN_POSITIVE];
        let bytes = encode_vector(&vector);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_vector(&bytes).unwrap(), vector);
    }

    #[test]
    fn empty_vector_round_trip() {
        assert!(decode_vector(&encode_vector(&[])).unwrap().is_empty());
    }

    #[test]
    fn truncated_vector_bytes_rejected() {
        let err = decode_vector(&[0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            SerializationError::InvalidVectorSize { actual: 3 }
        ));
    }

    #[test]
    fn manifest_round_trip() {
        let manifest = ProjectManifest::new(12, 40, vec!["a.jpg".into(), "b.jpg".into()]);
        let bytes = encode_manifest(&manifest).unwrap();
        assert_eq!(decode_manifest(&bytes).unwrap(), manifest);
    }

    #[test]
    fn garbage_manifest_fails_to_decode() {
        assert!(decode_manifest(&[0xff, 0x13, 0x07]).is_err());
    }
}
