//! Error types for photosort-core.
//!
//! Defines the central [`CoreError`] type used throughout the crate, along
//! with the [`CoreResult<T>`] alias. Worker-side failures (embedding,
//! persistence) are carried as tagged message variants so the orchestrator can
//! decide recovery per operation.

use thiserror::Error;

/// Top-level error type for photosort-core operations.
///
/// # Examples
///
/// ```rust
/// use photosort_core::CoreError;
///
/// let error = CoreError::DimensionMismatch { expected: 512, actual: 768 };
/// assert!(error.to_string().contains("512"));
/// ```
#[derive(Debug, Error)]
pub enum CoreError {
    /// Freeze attempted on a cluster that does not have a full set of
    /// representatives.
    ///
    /// Recovered locally by rejecting the freeze; the prior presentation
    /// state is untouched.
    #[error(
        "Cannot freeze cluster {cluster_index}: has {representatives} representatives, needs {required}"
    )]
    InsufficientMembers {
        /// Index of the cluster the freeze targeted
        cluster_index: usize,
        /// Number of representatives the cluster currently has
        representatives: usize,
        /// Number of representatives the freeze contract requires
        required: usize,
    },

    /// Exclusion attempted on a path that is currently a representative of a
    /// frozen cluster.
    ///
    /// Recovered locally by rejecting the exclusion; unfreeze first.
    #[error("Cannot exclude '{path}': it is a representative of a frozen cluster")]
    FrozenRepresentative {
        /// The path the exclusion targeted
        path: String,
    },

    /// An embedding's dimension disagrees with the dimension fixed at first
    /// use for this project. Fatal for the session.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed by the first record
        expected: usize,
        /// Dimension of the offending record
        actual: usize,
    },

    /// A batch embedding call failed.
    ///
    /// The batch's paths are marked as processed to avoid infinite retry of a
    /// poisoned input; the pipeline continues.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// A persistence operation failed. Not fatal: the in-memory view stays
    /// intact and the next flush retries the full unpersisted snapshot.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An operation referenced a cluster index that does not exist in the
    /// current pass.
    #[error("No cluster at index {index}")]
    ClusterNotFound {
        /// The 1-based cluster index that was requested
        index: usize,
    },

    /// A pipeline channel closed unexpectedly (worker gone).
    #[error("Pipeline channel closed: {0}")]
    ChannelClosed(String),

    /// An unexpected internal error. These indicate bugs.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Construct a `ConfigError` from anything displayable.
    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::ConfigError(msg.into())
    }

    /// Construct a `Persistence` error from anything displayable.
    pub fn persistence(msg: impl Into<String>) -> Self {
        CoreError::Persistence(msg.into())
    }

    /// Construct an `Embedding` error from anything displayable.
    pub fn embedding(msg: impl Into<String>) -> Self {
        CoreError::Embedding(msg.into())
    }

    /// Whether the error is recoverable at the call site (the pipeline keeps
    /// running) as opposed to fatal for the session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CoreError::DimensionMismatch { .. }
                | CoreError::ChannelClosed(_)
                | CoreError::Internal(_)
        )
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = CoreError::InsufficientMembers {
            cluster_index: 3,
            representatives: 9,
            required: 16,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('9'));
        assert!(msg.contains("16"));
    }

    #[test]
    fn frozen_representative_names_path() {
        let err = CoreError::FrozenRepresentative {
            path: "img/p3.jpg".into(),
        };
        assert!(err.to_string().contains("img/p3.jpg"));
    }

    #[test]
    fn recoverability_split() {
        assert!(CoreError::embedding("gpu hiccup").is_recoverable());
        assert!(CoreError::persistence("disk full").is_recoverable());
        assert!(!CoreError::DimensionMismatch {
            expected: 512,
            actual: 256
        }
        .is_recoverable());
    }
}
