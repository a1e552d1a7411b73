//! Representative selection.
//!
//! Members are ranked by ascending cosine distance to the centroid, then
//! walked greedily: a candidate is accepted only if its cosine distance to
//! every already-accepted representative is at least the dedup threshold.
//! Strict centroid proximity alone yields visually redundant previews for
//! dense clusters; the threshold trades proximity for diversity.
//!
//! The same accepted-list walk is reused by the freeze manager, which feeds
//! it a concatenation of ranked groups instead of a single ranked list.

use crate::similarity::cosine_distance;
use crate::types::EmbeddingRecord;

/// A member with its distance to the cluster centroid.
#[derive(Debug, Clone)]
pub struct RankedMember<'a> {
    /// The member record.
    pub record: &'a EmbeddingRecord,
    /// Cosine distance to the centroid.
    pub distance: f32,
}

/// Rank members by ascending cosine distance to `centroid`.
///
/// Ties are broken by original member order, keeping the ranking
/// deterministic for identical input.
pub fn rank_by_centroid<'a>(
    members: &'a [EmbeddingRecord],
    centroid: &[f32],
) -> Vec<RankedMember<'a>> {
    let mut ranked: Vec<(usize, RankedMember<'a>)> = members
        .iter()
        .enumerate()
        .map(|(i, record)| {
            (
                i,
                RankedMember {
                    record,
                    distance: cosine_distance(&record.vector, centroid),
                },
            )
        })
        .collect();
    ranked.sort_by(|(ia, a), (ib, b)| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ia.cmp(ib))
    });
    ranked.into_iter().map(|(_, m)| m).collect()
}

/// Walk `candidates` in order, accepting each whose distance to every
/// already-accepted record is at least `threshold`, until `cap` accepted.
///
/// Returns indices into `candidates`. `accepted_seed` lets callers resume a
/// walk with prior acceptances (the freeze manager walks group by group).
pub fn greedy_dedup_walk(
    candidates: &[RankedMember<'_>],
    threshold: f32,
    cap: usize,
    accepted_seed: &[&EmbeddingRecord],
) -> Vec<usize> {
    let mut accepted: Vec<&EmbeddingRecord> = accepted_seed.to_vec();
    let mut picked = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        if accepted.len() >= cap {
            break;
        }
        let diverse = accepted
            .iter()
            .all(|rep| cosine_distance(&candidate.record.vector, &rep.vector) >= threshold);
        if diverse {
            accepted.push(candidate.record);
            picked.push(i);
        }
    }
    picked
}

/// Select up to `cap` representatives for a cluster.
///
/// Ranks by centroid proximity and applies the greedy dedup walk. When the
/// threshold filters the list below `cap` the result is shorter; when the
/// cluster has fewer than `cap` members every member that survives dedup is
/// returned.
pub fn select_representatives(
    members: &[EmbeddingRecord],
    centroid: &[f32],
    threshold: f32,
    cap: usize,
) -> Vec<EmbeddingRecord> {
    let ranked = rank_by_centroid(members, centroid);
    greedy_dedup_walk(&ranked, threshold, cap, &[])
        .into_iter()
        .map(|i| ranked[i].record.clone())
        .collect()
}
