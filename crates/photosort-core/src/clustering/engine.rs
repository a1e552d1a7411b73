//! The public clustering entry point.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::PipelineConfig;
use crate::types::{Cluster, ClusterSet, EmbeddingRecord, Representative};

use super::kmeans::run_kmeans;
use super::representatives::select_representatives;

/// The clustering engine.
///
/// Stateless between passes apart from its RNG; warm-start centroids are
/// supplied per call by the coordinator. Runs on the clustering worker
/// task, never on the orchestrator.
///
/// # Example
///
/// ```
/// use photosort_core::{ClusterEngine, EmbeddingRecord};
///
/// let mut engine = ClusterEngine::with_seed(20, 16, 7);
/// let records = vec![
///     EmbeddingRecord::new("a", vec![1.0, 0.0]),
///     EmbeddingRecord::new("b", vec![0.0, 1.0]),
/// ];
/// let set = engine.update_clusters(&records, 2, 0.15, None);
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Debug)]
pub struct ClusterEngine {
    iteration_cap: usize,
    representatives_per_cluster: usize,
    rng: ChaCha8Rng,
}

impl ClusterEngine {
    /// Create an engine from the pipeline configuration. Draws a random
    /// seed when the config does not pin one.
    pub fn new(config: &PipelineConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| rand::thread_rng().next_u64());
        Self::with_seed(
            config.iteration_cap,
            config.representatives_per_cluster,
            seed,
        )
    }

    /// Create an engine with an explicit seed (reproducible passes).
    pub fn with_seed(iteration_cap: usize, representatives_per_cluster: usize, seed: u64) -> Self {
        Self {
            iteration_cap,
            representatives_per_cluster,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Run one clustering pass.
    ///
    /// `k` is clamped to the record count; an empty record slice yields an
    /// empty [`ClusterSet`] with no centroids. `previous_centroids` warm-
    /// starts the pass when its length equals the effective `k` (a `k`
    /// change invalidates the warm start by length mismatch). Never fails
    /// for valid numeric inputs.
    pub fn update_clusters(
        &mut self,
        records: &[EmbeddingRecord],
        k: usize,
        threshold: f32,
        previous_centroids: Option<&[Vec<f32>]>,
    ) -> ClusterSet {
        if records.is_empty() {
            return ClusterSet::empty();
        }
        let k = k.min(records.len()).max(1);

        let output = run_kmeans(
            records,
            k,
            self.iteration_cap,
            previous_centroids,
            &mut self.rng,
        );

        // Group members by assignment, preserving record order.
        let mut member_lists: Vec<Vec<EmbeddingRecord>> = vec![Vec::new(); k];
        for (record, &cluster) in records.iter().zip(output.assignments.iter()) {
            member_lists[cluster].push(record.clone());
        }

        // Build clusters tagged with their raw centroid index, then order
        // by descending member count and relabel 1..=K. The raw index is
        // the tie-break, keeping identical passes identical.
        let mut tagged: Vec<(usize, Vec<EmbeddingRecord>)> =
            member_lists.into_iter().enumerate().collect();
        tagged.sort_by(|(ia, a), (ib, b)| b.len().cmp(&a.len()).then(ia.cmp(ib)));

        let clusters: Vec<Cluster> = tagged
            .into_iter()
            .enumerate()
            .map(|(pos, (raw_index, members))| {
                let centroid = output.centroids[raw_index].clone();
                let representatives = select_representatives(
                    &members,
                    &centroid,
                    threshold,
                    self.representatives_per_cluster,
                )
                .into_iter()
                .map(Representative::of)
                .collect();
                Cluster::new(pos + 1, centroid, members, representatives)
            })
            .collect();

        tracing::info!(
            clusters = clusters.len(),
            records = records.len(),
            iterations = output.iterations,
            converged = output.converged,
            "clustering pass complete"
        );

        ClusterSet {
            clusters,
            centroids: output.centroids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_distance;

    fn rec(path: &str, v: &[f32]) -> EmbeddingRecord {
        EmbeddingRecord::new(path, v.to_vec())
    }

    /// Thirty records across three visually separated regions.
    fn three_region_records() -> Vec<EmbeddingRecord> {
        let mut records = Vec::new();
        for i in 0..10 {
            let jitter = 0.02 * i as f32;
            records.push(rec(&format!("red{i}"), &[1.0, jitter, 0.0]));
            records.push(rec(&format!("green{i}"), &[jitter, 1.0, 0.0]));
            records.push(rec(&format!("blue{i}"), &[0.0, jitter, 1.0]));
        }
        records
    }

    fn region_mean(records: &[EmbeddingRecord], prefix: &str) -> Vec<f32> {
        let group: Vec<&EmbeddingRecord> = records
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect();
        let dim = group[0].vector.len();
        let mut mean = vec![0.0f32; dim];
        for r in &group {
            for (m, v) in mean.iter_mut().zip(r.vector.iter()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= group.len() as f32);
        mean
    }

    #[test]
    fn cold_start_separates_three_regions() {
        let records = three_region_records();
        let mut engine = ClusterEngine::with_seed(20, 16, 1);
        let set = engine.update_clusters(&records, 3, 0.1, None);

        assert_eq!(set.len(), 3);
        for cluster in &set.clusters {
            assert_eq!(cluster.len(), 10);
        }

        // Each region's mean is within 0.05 cosine distance of a centroid.
        for prefix in ["red", "green", "blue"] {
            let mean = region_mean(&records, prefix);
            let nearest = set
                .clusters
                .iter()
                .map(|c| cosine_distance(&c.centroid, &mean))
                .fold(f32::MAX, f32::min);
            assert!(nearest < 0.05, "{prefix} mean off by {nearest}");
        }
    }

    #[test]
    fn warm_start_keeps_cluster_identity() {
        let mut records = three_region_records();
        let mut engine = ClusterEngine::with_seed(20, 16, 1);
        let first = engine.update_clusters(&records, 3, 0.1, None);

        // The centroid nearest the red region before the append.
        let red_mean = region_mean(&records, "red");
        let red_centroid_before = first
            .centroids
            .iter()
            .min_by(|a, b| {
                cosine_distance(a, &red_mean)
                    .partial_cmp(&cosine_distance(b, &red_mean))
                    .unwrap()
            })
            .unwrap()
            .clone();

        records.push(rec("red-new", &[1.0, 0.01, 0.0]));
        let second = engine.update_clusters(&records, 3, 0.1, Some(&first.centroids));

        let home = second
            .clusters
            .iter()
            .find(|c| c.contains_member("red-new"))
            .expect("new record must land in a cluster");
        assert!(
            cosine_distance(&home.centroid, &red_centroid_before) < 0.05,
            "the new record's cluster kept its centroid identity"
        );
        assert_eq!(home.len(), 11);
    }

    #[test]
    fn clusters_are_ordered_by_size_and_relabeled() {
        // 12 in one direction, 5 in another, 2 in a third.
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(rec(&format!("big{i}"), &[1.0, 0.001 * i as f32, 0.0]));
        }
        for i in 0..5 {
            records.push(rec(&format!("mid{i}"), &[0.0, 1.0, 0.001 * i as f32]));
        }
        for i in 0..2 {
            records.push(rec(&format!("small{i}"), &[0.001 * i as f32, 0.0, 1.0]));
        }

        let mut engine = ClusterEngine::with_seed(20, 16, 3);
        let set = engine.update_clusters(&records, 3, 0.1, None);

        let sizes: Vec<usize> = set.clusters.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![12, 5, 2]);
        let ids: Vec<usize> = set.clusters.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn raw_centroids_are_kept_for_warm_start() {
        let records = three_region_records();
        let mut engine = ClusterEngine::with_seed(20, 16, 1);
        let set = engine.update_clusters(&records, 3, 0.1, None);
        assert_eq!(set.centroids.len(), 3);
        // Sorted clusters and the raw table hold the same centroids,
        // possibly in different orders.
        for cluster in &set.clusters {
            assert!(set
                .centroids
                .iter()
                .any(|c| cosine_distance(c, &cluster.centroid) < 1e-6));
        }
    }

    #[test]
    fn empty_records_yield_empty_set() {
        let mut engine = ClusterEngine::with_seed(20, 16, 1);
        let set = engine.update_clusters(&[], 6, 0.15, None);
        assert!(set.is_empty());
        assert!(set.centroids.is_empty());
    }

    #[test]
    fn k_clamps_to_record_count() {
        let records = vec![rec("a", &[1.0, 0.0]), rec("b", &[0.0, 1.0])];
        let mut engine = ClusterEngine::with_seed(20, 16, 1);
        let set = engine.update_clusters(&records, 6, 0.15, None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_members(), 2);
    }

    #[test]
    fn members_partition_the_input() {
        let records = three_region_records();
        let mut engine = ClusterEngine::with_seed(20, 16, 9);
        let set = engine.update_clusters(&records, 3, 0.1, None);

        let mut seen = std::collections::HashSet::new();
        for cluster in &set.clusters {
            for member in &cluster.members {
                assert!(seen.insert(member.path.clone()), "duplicate member");
            }
        }
        assert_eq!(seen.len(), records.len());
    }

    #[test]
    fn representatives_are_members() {
        let records = three_region_records();
        let mut engine = ClusterEngine::with_seed(20, 16, 5);
        let set = engine.update_clusters(&records, 3, 0.1, None);
        for cluster in &set.clusters {
            for rep in &cluster.representatives {
                assert!(cluster.contains_member(rep.path()));
                assert!(!rep.is_replacement);
            }
        }
    }
}
