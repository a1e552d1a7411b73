//! Freeze semantics.
//!
//! A freeze pins a cluster's representative identity so it survives
//! subsequent re-cluster passes. The manager tracks each frozen group
//! through positional drift (the cluster's index changes as sizes reorder)
//! and membership drift (originals migrate to other clusters), and
//! auto-unfreezes a group whose members can no longer be found together.
//!
//! # State
//!
//! Entries are keyed by the frozen group's *current* cluster index and
//! rekeyed on every [`FreezeManager::apply`]. `initial_index` is retained in
//! the entry for logging only.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::clustering::representatives::{greedy_dedup_walk, rank_by_centroid, RankedMember};
use crate::clustering::select_representatives;
use crate::config::PipelineConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{ClusterSet, EmbeddingRecord, Representative};

/// Tracking state for one frozen group.
#[derive(Debug, Clone)]
pub struct FrozenEntry {
    /// The representative paths at freeze time. Immutable for the lifetime
    /// of the entry.
    original_paths: BTreeSet<String>,

    /// The paths currently displayed as this group's representatives.
    /// Updated after every pass so matching tracks the drifting identity.
    preferred_paths: BTreeSet<String>,

    /// Cluster index at freeze time, for logging.
    initial_index: usize,
}

impl FrozenEntry {
    /// The representative paths captured at freeze time.
    pub fn original_paths(&self) -> &BTreeSet<String> {
        &self.original_paths
    }

    /// The currently displayed representative paths.
    pub fn preferred_paths(&self) -> &BTreeSet<String> {
        &self.preferred_paths
    }

    /// The cluster index this group was frozen at.
    pub fn initial_index(&self) -> usize {
        self.initial_index
    }
}

/// Ranked-group origin of a representative candidate during enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateGroup {
    /// A freeze-time original still present among members.
    Original,
    /// A previously substituted filler still present among members.
    Filler,
    /// Any other member; accepted ones are flagged as replacements.
    Other,
}

/// A candidate assignment of a frozen group to a cluster in a new pass.
#[derive(Debug, Clone, Copy)]
struct MatchCandidate {
    old_index: usize,
    new_index: usize,
    matched: usize,
}

/// Tracks frozen groups across re-cluster passes.
#[derive(Debug)]
pub struct FreezeManager {
    /// Current cluster index -> frozen group. BTreeMap keeps iteration
    /// deterministic for identical passes.
    entries: BTreeMap<usize, FrozenEntry>,

    /// Representatives a cluster must carry to be frozen, and that a frozen
    /// cluster keeps carrying while its entry survives.
    representatives_per_cluster: usize,
}

impl FreezeManager {
    /// Create a manager for the given representative count.
    pub fn new(representatives_per_cluster: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            representatives_per_cluster,
        }
    }

    /// Create a manager from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.representatives_per_cluster)
    }

    /// Number of frozen groups.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no groups are frozen.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the cluster at `index` is frozen.
    pub fn is_frozen(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// The entry for the cluster at `index`, if frozen.
    pub fn entry(&self, index: usize) -> Option<&FrozenEntry> {
        self.entries.get(&index)
    }

    /// Minimum member overlap for a frozen group to claim a new cluster.
    #[inline]
    fn min_match(&self) -> usize {
        self.representatives_per_cluster / 2
    }

    /// Every path currently serving as a frozen representative. The store
    /// uses this set to reject exclusions of frozen representatives.
    pub fn pinned_paths(&self) -> HashSet<String> {
        self.entries
            .values()
            .flat_map(|e| e.preferred_paths.iter().cloned())
            .collect()
    }

    /// Freeze the cluster at `index`.
    ///
    /// # Errors
    /// - `CoreError::ClusterNotFound` if no cluster has that index
    /// - `CoreError::InsufficientMembers` unless the cluster carries exactly
    ///   the required number of representatives
    pub fn freeze(&mut self, set: &mut ClusterSet, index: usize) -> CoreResult<()> {
        if self.entries.contains_key(&index) {
            tracing::debug!(index, "freeze requested on already-frozen cluster");
            return Ok(());
        }
        let required = self.representatives_per_cluster;
        let cluster = set
            .by_id_mut(index)
            .ok_or(CoreError::ClusterNotFound { index })?;
        if cluster.representatives.len() != required {
            return Err(CoreError::InsufficientMembers {
                cluster_index: index,
                representatives: cluster.representatives.len(),
                required,
            });
        }

        let paths: BTreeSet<String> = cluster
            .representatives
            .iter()
            .map(|r| r.record.path.clone())
            .collect();
        cluster.is_frozen = true;
        cluster.drift_count = 0;
        cluster.moved_from = None;

        tracing::info!(index, representatives = paths.len(), "cluster frozen");
        self.entries.insert(
            index,
            FrozenEntry {
                original_paths: paths.clone(),
                preferred_paths: paths,
                initial_index: index,
            },
        );
        Ok(())
    }

    /// Unfreeze the cluster at `index` and recompute its representatives
    /// from the current members, without re-running K-Means.
    ///
    /// A no-op when the cluster is not frozen.
    ///
    /// # Errors
    /// `CoreError::ClusterNotFound` if no cluster has that index.
    pub fn unfreeze(
        &mut self,
        set: &mut ClusterSet,
        index: usize,
        threshold: f32,
    ) -> CoreResult<()> {
        let cluster = set
            .by_id_mut(index)
            .ok_or(CoreError::ClusterNotFound { index })?;
        if self.entries.remove(&index).is_none() {
            return Ok(());
        }

        cluster.representatives = select_representatives(
            &cluster.members,
            &cluster.centroid,
            threshold,
            self.representatives_per_cluster,
        )
        .into_iter()
        .map(Representative::of)
        .collect();
        cluster.is_frozen = false;
        cluster.drift_count = 0;
        cluster.moved_from = None;

        tracing::info!(index, "cluster unfrozen");
        Ok(())
    }

    /// Apply the frozen groups to a freshly clustered pass.
    ///
    /// Identifies each group's best-matching cluster by preferred-path
    /// overlap, assigns greedily in descending match order (ties broken by
    /// ascending old then new index, so an identical pass assigns
    /// identically), enforces the frozen representative set on each claimed
    /// cluster, and rekeys the entry map to the new indices. Groups that
    /// find no acceptable cluster are auto-unfrozen.
    pub fn apply(&mut self, mut set: ClusterSet, threshold: f32) -> ClusterSet {
        if self.entries.is_empty() {
            return set;
        }

        let candidates = self.match_candidates(&set);
        let accepted = greedy_assign(candidates);

        let entries = std::mem::take(&mut self.entries);
        let mut assigned: BTreeMap<usize, usize> = BTreeMap::new();
        for c in &accepted {
            assigned.insert(c.old_index, c.new_index);
        }

        for (old_index, mut entry) in entries {
            let Some(&new_index) = assigned.get(&old_index) else {
                tracing::info!(
                    old_index,
                    initial_index = entry.initial_index,
                    "frozen group lost its members; auto-unfrozen"
                );
                continue;
            };

            let cluster = set
                .by_id_mut(new_index)
                .expect("accepted candidate indexes an existing cluster");

            if cluster.members.len() < self.representatives_per_cluster {
                tracing::info!(
                    old_index,
                    new_index,
                    members = cluster.members.len(),
                    "frozen group's cluster shrank below the representative count; auto-unfrozen"
                );
                continue;
            }

            let representatives = enforce_representatives(
                &cluster.members,
                &cluster.centroid,
                &entry.original_paths,
                &entry.preferred_paths,
                threshold,
                self.representatives_per_cluster,
            );

            let originals_present = cluster
                .members
                .iter()
                .filter(|m| entry.original_paths.contains(&m.path))
                .count();

            cluster.is_frozen = true;
            cluster.drift_count = entry.original_paths.len() - originals_present;
            cluster.moved_from = (new_index != old_index).then_some(old_index);

            entry.preferred_paths = representatives
                .iter()
                .map(|r| r.record.path.clone())
                .collect();
            cluster.representatives = representatives;

            tracing::debug!(
                old_index,
                new_index,
                drift = cluster.drift_count,
                "frozen group carried into new pass"
            );
            self.entries.insert(new_index, entry);
        }

        set
    }

    /// Enumerate `(old, new, match)` candidates with enough overlap.
    fn match_candidates(&self, set: &ClusterSet) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();
        for (&old_index, entry) in &self.entries {
            for cluster in &set.clusters {
                let matched = cluster
                    .members
                    .iter()
                    .filter(|m| entry.preferred_paths.contains(&m.path))
                    .count();
                if matched >= self.min_match() {
                    candidates.push(MatchCandidate {
                        old_index,
                        new_index: cluster.id,
                        matched,
                    });
                }
            }
        }
        candidates
    }
}

/// Greedy bipartite assignment over match candidates.
///
/// Walks candidates in descending match order (ties: ascending old index,
/// then ascending new index) and accepts a pair only when neither side has
/// been claimed.
fn greedy_assign(mut candidates: Vec<MatchCandidate>) -> Vec<MatchCandidate> {
    candidates.sort_by(|a, b| {
        b.matched
            .cmp(&a.matched)
            .then(a.old_index.cmp(&b.old_index))
            .then(a.new_index.cmp(&b.new_index))
    });

    let mut claimed_old = HashSet::new();
    let mut claimed_new = HashSet::new();
    let mut accepted = Vec::new();
    for c in candidates {
        if claimed_old.contains(&c.old_index) || claimed_new.contains(&c.new_index) {
            continue;
        }
        claimed_old.insert(c.old_index);
        claimed_new.insert(c.new_index);
        accepted.push(c);
    }
    accepted
}

/// Build a frozen cluster's representative set.
///
/// Members are split into three groups (originals present, previous fillers
/// present, everything else), each ranked by centroid proximity.
/// The groups are walked in order through a single dedup filter (the
/// threshold applies across all accepted representatives together), and any
/// remaining slots are backfilled from the skipped candidates in the same
/// order so a surviving frozen cluster always shows a full set.
/// Representatives drawn from the "others" group are flagged as
/// replacements.
fn enforce_representatives(
    members: &[EmbeddingRecord],
    centroid: &[f32],
    original_paths: &BTreeSet<String>,
    preferred_paths: &BTreeSet<String>,
    threshold: f32,
    cap: usize,
) -> Vec<Representative> {
    let mut originals = Vec::new();
    let mut fillers = Vec::new();
    let mut others = Vec::new();
    for member in members {
        if original_paths.contains(&member.path) {
            originals.push(member.clone());
        } else if preferred_paths.contains(&member.path) {
            fillers.push(member.clone());
        } else {
            others.push(member.clone());
        }
    }

    // Concatenated candidate walk: each group ranked by centroid proximity,
    // group origin carried alongside.
    let mut candidates: Vec<(RankedMember<'_>, CandidateGroup)> = Vec::new();
    for (group, list) in [
        (CandidateGroup::Original, &originals),
        (CandidateGroup::Filler, &fillers),
        (CandidateGroup::Other, &others),
    ] {
        for ranked in rank_by_centroid(list, centroid) {
            candidates.push((ranked, group));
        }
    }

    let ranked_only: Vec<RankedMember<'_>> =
        candidates.iter().map(|(m, _)| m.clone()).collect();
    let picked = greedy_dedup_walk(&ranked_only, threshold, cap, &[]);

    let mut chosen: Vec<usize> = picked;
    if chosen.len() < cap {
        // Backfill skipped candidates in rank order until the set is full.
        let taken: HashSet<usize> = chosen.iter().copied().collect();
        for i in 0..candidates.len() {
            if chosen.len() >= cap {
                break;
            }
            if !taken.contains(&i) {
                chosen.push(i);
            }
        }
    }

    chosen
        .into_iter()
        .map(|i| {
            let (member, group) = &candidates[i];
            match group {
                CandidateGroup::Other => Representative::replacement(member.record.clone()),
                _ => Representative::of(member.record.clone()),
            }
        })
        .collect()
}
