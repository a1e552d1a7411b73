//! K-Means initialization and Lloyd's iteration.
//!
//! Initialization is warm-start when a previous centroid table of matching
//! length is supplied, K-Means++ otherwise. Lloyd's iteration runs to
//! assignment fixpoint or the iteration cap, re-seeding any centroid that
//! loses all members from a uniformly random record so a warm start cannot
//! collapse K.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::similarity::{cosine_distance, cosine_distance_squared};
use crate::types::EmbeddingRecord;

/// Outcome of one K-Means run.
#[derive(Debug, Clone)]
pub struct KMeansOutput {
    /// Per-record centroid assignment, indices into `centroids`.
    pub assignments: Vec<usize>,
    /// Final centroids, in assignment order.
    pub centroids: Vec<Vec<f32>>,
    /// Assignment rounds executed.
    pub iterations: usize,
    /// Whether the assignment reached a fixpoint before the cap.
    pub converged: bool,
}

/// Run K-Means over `records`.
///
/// `previous` is copied as the starting centroids when its length equals
/// `k` (warm start); otherwise K-Means++ seeds from the records. Callers
/// must clamp `k` to `records.len()` beforehand and never pass an empty
/// record slice.
pub fn run_kmeans(
    records: &[EmbeddingRecord],
    k: usize,
    iteration_cap: usize,
    previous: Option<&[Vec<f32>]>,
    rng: &mut ChaCha8Rng,
) -> KMeansOutput {
    debug_assert!(!records.is_empty());
    debug_assert!(k >= 1 && k <= records.len());

    let mut centroids = match previous {
        Some(prev) if prev.len() == k => prev.to_vec(),
        _ => kmeans_plus_plus_init(records, k, rng),
    };

    let dim = records[0].dimension();
    let mut sums: Vec<Vec<f32>> = vec![vec![0.0; dim]; k];
    let mut counts: Vec<usize> = vec![0; k];

    let mut assignments = assign(records, &centroids);
    let mut iterations = 1;
    let mut converged = false;

    while iterations < iteration_cap {
        update_centroids(records, &assignments, &mut centroids, &mut sums, &mut counts);
        reseed_orphans(records, &counts, &mut centroids, rng);

        let next = assign(records, &centroids);
        iterations += 1;
        if next == assignments {
            converged = true;
            break;
        }
        assignments = next;
    }

    tracing::debug!(
        k,
        n = records.len(),
        iterations,
        converged,
        warm = previous.map(|p| p.len() == k).unwrap_or(false),
        "kmeans pass finished"
    );

    KMeansOutput {
        assignments,
        centroids,
        iterations,
        converged,
    }
}

/// Assign each record to its nearest centroid by cosine distance.
fn assign(records: &[EmbeddingRecord], centroids: &[Vec<f32>]) -> Vec<usize> {
    records
        .iter()
        .map(|record| {
            let mut best = 0;
            let mut best_dist = f32::MAX;
            for (j, centroid) in centroids.iter().enumerate() {
                let dist = cosine_distance(&record.vector, centroid);
                if dist < best_dist {
                    best_dist = dist;
                    best = j;
                }
            }
            best
        })
        .collect()
}

/// Replace each centroid with the per-dimension mean of its assigned
/// records. Sum/count buffers are reused across iterations; centroids with
/// no members are left untouched here (the orphan policy handles them).
fn update_centroids(
    records: &[EmbeddingRecord],
    assignments: &[usize],
    centroids: &mut [Vec<f32>],
    sums: &mut [Vec<f32>],
    counts: &mut [usize],
) {
    for sum in sums.iter_mut() {
        sum.iter_mut().for_each(|x| *x = 0.0);
    }
    counts.iter_mut().for_each(|c| *c = 0);

    for (record, &cluster) in records.iter().zip(assignments.iter()) {
        counts[cluster] += 1;
        for (acc, &v) in sums[cluster].iter_mut().zip(record.vector.iter()) {
            *acc += v;
        }
    }

    for ((centroid, sum), &count) in centroids.iter_mut().zip(sums.iter()).zip(counts.iter()) {
        if count > 0 {
            for (c, &s) in centroid.iter_mut().zip(sum.iter()) {
                *c = s / count as f32;
            }
        }
    }
}

/// Re-seed any centroid that lost all members from a uniformly random
/// record.
fn reseed_orphans(
    records: &[EmbeddingRecord],
    counts: &[usize],
    centroids: &mut [Vec<f32>],
    rng: &mut ChaCha8Rng,
) {
    for (j, &count) in counts.iter().enumerate() {
        if count == 0 {
            let pick = rng.gen_range(0..records.len());
            centroids[j] = records[pick].vector.clone();
            tracing::debug!(centroid = j, reseed_from = pick, "re-seeded orphan centroid");
        }
    }
}

/// K-Means++ seeding over cosine distance.
///
/// The first centroid is uniform over the records; each subsequent one is
/// drawn proportionally to the squared minimum cosine distance from the
/// centroids chosen so far. If the cumulative walk underflows (all weights
/// zero or numeric loss), the last index is picked.
pub fn kmeans_plus_plus_init(
    records: &[EmbeddingRecord],
    k: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<Vec<f32>> {
    let n = records.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    centroids.push(records[first].vector.clone());

    let mut min_dist_sq = vec![f32::MAX; n];

    for _ in 1..k {
        let last = centroids
            .last()
            .expect("at least one centroid after the uniform draw");
        for (i, record) in records.iter().enumerate() {
            let d = cosine_distance_squared(&record.vector, last);
            if d < min_dist_sq[i] {
                min_dist_sq[i] = d;
            }
        }

        let total: f32 = min_dist_sq.iter().sum();
        let target = rng.gen::<f32>() * total;

        let mut cumulative = 0.0f32;
        let mut chosen = n - 1;
        for (i, &w) in min_dist_sq.iter().enumerate() {
            cumulative += w;
            if target < cumulative {
                chosen = i;
                break;
            }
        }
        centroids.push(records[chosen].vector.clone());
    }

    centroids
}
