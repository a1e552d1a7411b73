//! The pipeline: producer, clustering worker, and coordinator.
//!
//! # Concurrency Contract
//!
//! The coordinator task owns the store and the freeze manager. The
//! clustering worker and the embedding producer communicate with it only
//! through messages; workers receive immutable inputs and return owned
//! outputs. Producer flushes are serialized: the n-th flush's record insert
//! happens-before the n-th re-cluster request. The clustering worker has no
//! cancellation path; freshness is recovered via the coordinator's
//! coalescing follow-up pass.

pub mod coordinator;
pub mod producer;
pub mod worker;

pub use coordinator::{Coordinator, CoordinatorHandle};
pub use producer::{Producer, ProducerGate, ProducerReport, ProducerState};
pub use worker::{spawn_cluster_worker, ClusterRequest, ClusterWorkerHandle};
