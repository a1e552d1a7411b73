//! The embedding store.
//!
//! Authoritative mapping from path to [`EmbeddingRecord`] plus the exclusion
//! set. Owned by the coordinator; workers never see it. Iteration order is
//! insertion order, which is stable within a pass.
//!
//! The store also carries the pinned set: paths currently serving as
//! representatives of frozen clusters. Excluding a pinned path is rejected
//! with `FrozenRepresentative`; the coordinator re-syncs the pinned set
//! after every freeze transition.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{CoreError, CoreResult};
use crate::types::{EmbeddingRecord, ProjectManifest};

/// In-memory embedding store with exclusion state.
#[derive(Debug, Default)]
pub struct EmbeddingStore {
    /// Records in insertion order.
    records: Vec<EmbeddingRecord>,

    /// Path -> index into `records`.
    index: HashMap<String, usize>,

    /// Excluded paths. May include paths not (yet) present in the mapping:
    /// the user can preemptively exclude images before they are embedded.
    excluded: BTreeSet<String>,

    /// Paths currently serving as representatives of frozen clusters.
    pinned: HashSet<String>,

    /// Embedding dimension, fixed by the first record.
    dimension: Option<usize>,
}

impl EmbeddingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records and an optional manifest.
    ///
    /// # Errors
    /// `CoreError::DimensionMismatch` if the loaded records disagree on
    /// dimension. Fatal for the session.
    pub fn load_from(
        records: Vec<EmbeddingRecord>,
        manifest: Option<&ProjectManifest>,
    ) -> CoreResult<Self> {
        let mut store = Self::new();
        store.put_many(records)?;
        if let Some(manifest) = manifest {
            for path in &manifest.excluded_images {
                store.excluded.insert(path.clone());
            }
        }
        Ok(store)
    }

    /// The dimension fixed by the first record, if any.
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of stored records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a record for `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Insert or replace records by path.
    ///
    /// # Errors
    /// `CoreError::DimensionMismatch` if any record's width disagrees with
    /// the dimension fixed by the first record ever inserted.
    pub fn put_many(&mut self, records: Vec<EmbeddingRecord>) -> CoreResult<()> {
        for record in records {
            let dim = record.dimension();
            match self.dimension {
                None => self.dimension = Some(dim),
                Some(expected) if expected != dim => {
                    return Err(CoreError::DimensionMismatch {
                        expected,
                        actual: dim,
                    });
                }
                Some(_) => {}
            }
            match self.index.get(&record.path) {
                Some(&i) => self.records[i] = record,
                None => {
                    self.index.insert(record.path.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }
        Ok(())
    }

    /// All records in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &EmbeddingRecord> {
        self.records.iter()
    }

    /// Snapshot of the non-excluded records, the input to clustering.
    ///
    /// Returns owned clones so a pass in flight sees a consistent view
    /// regardless of later mutation.
    pub fn valid(&self) -> Vec<EmbeddingRecord> {
        self.records
            .iter()
            .filter(|r| !self.excluded.contains(&r.path))
            .cloned()
            .collect()
    }

    /// Paths of every stored record.
    pub fn processed_paths(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    /// Paths a resumed session must not hand back to the producer: every
    /// path with a stored record plus every excluded path, including
    /// poisoned inputs the producer recorded as exclusions. Together these
    /// reconstruct exactly what the prior session already dealt with.
    pub fn resume_skip_paths(&self) -> HashSet<String> {
        let mut skip = self.processed_paths();
        skip.extend(self.excluded.iter().cloned());
        skip
    }

    /// Exclude a path. Idempotent: excluding an excluded path is a no-op
    /// returning `false`; a new exclusion returns `true`.
    ///
    /// # Errors
    /// `CoreError::FrozenRepresentative` if the path is currently a
    /// representative of a frozen cluster. The store is unchanged.
    pub fn exclude(&mut self, path: &str) -> CoreResult<bool> {
        if self.pinned.contains(path) {
            return Err(CoreError::FrozenRepresentative {
                path: path.to_string(),
            });
        }
        let inserted = self.excluded.insert(path.to_string());
        if inserted {
            tracing::debug!(path, "excluded image");
        }
        Ok(inserted)
    }

    /// Restore a previously excluded path. Idempotent; returns whether the
    /// path was excluded.
    pub fn restore(&mut self, path: &str) -> bool {
        let removed = self.excluded.remove(path);
        if removed {
            tracing::debug!(path, "restored image");
        }
        removed
    }

    /// Whether a path is excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.contains(path)
    }

    /// The exclusion set, sorted.
    pub fn excluded_paths(&self) -> Vec<String> {
        self.excluded.iter().cloned().collect()
    }

    /// Replace the pinned set with the current frozen-representative paths.
    pub fn set_pinned(&mut self, pinned: HashSet<String>) {
        self.pinned = pinned;
    }

    /// Build the manifest describing the current state.
    pub fn manifest(&self, total_images_found: usize) -> ProjectManifest {
        ProjectManifest::new(self.len(), total_images_found, self.excluded_paths())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(path: &str, v: &[f32]) -> EmbeddingRecord {
        EmbeddingRecord::new(path, v.to_vec())
    }

    fn seeded_store() -> EmbeddingStore {
        let mut store = EmbeddingStore::new();
        store
            .put_many(vec![
                rec("a.jpg", &[1.0, 0.0]),
                rec("b.jpg", &[0.0, 1.0]),
                rec("c.jpg", &[0.5, 0.5]),
            ])
            .unwrap();
        store
    }

    #[test]
    fn put_many_replaces_by_path() {
        let mut store = seeded_store();
        store.put_many(vec![rec("a.jpg", &[0.9, 0.1])]).unwrap();
        assert_eq!(store.len(), 3);
        let a = store.all().find(|r| r.path == "a.jpg").unwrap();
        assert_eq!(a.vector, vec![0.9, 0.1]);
    }

    #[test]
    fn dimension_fixed_by_first_record() {
        let mut store = seeded_store();
        assert_eq!(store.dimension(), Some(2));
        let err = store.put_many(vec![rec("d.jpg", &[1.0, 2.0, 3.0])]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn valid_filters_excluded() {
        let mut store = seeded_store();
        store.exclude("b.jpg").unwrap();
        let valid = store.valid();
        assert_eq!(valid.len(), 2);
        assert!(valid.iter().all(|r| r.path != "b.jpg"));
    }

    #[test]
    fn exclude_then_restore_round_trips_valid_set() {
        let mut store = seeded_store();
        let before = store.valid();
        store.exclude("b.jpg").unwrap();
        store.restore("b.jpg");
        assert_eq!(store.valid(), before);
    }

    #[test]
    fn exclude_and_restore_are_idempotent() {
        let mut store = seeded_store();
        assert!(store.exclude("b.jpg").unwrap());
        assert!(!store.exclude("b.jpg").unwrap());
        assert!(store.restore("b.jpg"));
        assert!(!store.restore("b.jpg"));
    }

    #[test]
    fn preemptive_exclusion_of_unknown_path() {
        let mut store = seeded_store();
        assert!(store.exclude("not-yet-embedded.jpg").unwrap());
        assert!(store.is_excluded("not-yet-embedded.jpg"));
        // The valid set is unaffected until such a record arrives.
        assert_eq!(store.valid().len(), 3);
    }

    #[test]
    fn pinned_path_rejects_exclusion() {
        let mut store = seeded_store();
        store.set_pinned(["b.jpg".to_string()].into_iter().collect());
        let err = store.exclude("b.jpg").unwrap_err();
        assert!(matches!(err, CoreError::FrozenRepresentative { .. }));
        assert!(!store.is_excluded("b.jpg"));

        // After unpinning, the same exclusion succeeds.
        store.set_pinned(HashSet::new());
        assert!(store.exclude("b.jpg").unwrap());
    }

    #[test]
    fn resume_skip_paths_cover_records_and_exclusions() {
        let mut store = seeded_store();
        // A poisoned input: excluded without ever producing a record.
        store.exclude("broken.jpg").unwrap();
        let skip = store.resume_skip_paths();
        assert!(skip.contains("a.jpg"));
        assert!(skip.contains("broken.jpg"));
        assert_eq!(skip.len(), 4);
    }

    #[test]
    fn load_from_restores_exclusions() {
        let store = seeded_store();
        let manifest = ProjectManifest::new(3, 5, vec!["c.jpg".into(), "ghost.jpg".into()]);
        let restored = EmbeddingStore::load_from(store.valid(), Some(&manifest)).unwrap();
        assert!(restored.is_excluded("c.jpg"));
        assert!(restored.is_excluded("ghost.jpg"));
        assert_eq!(restored.valid().len(), 2);
    }

    #[test]
    fn manifest_reflects_state() {
        let mut store = seeded_store();
        store.exclude("a.jpg").unwrap();
        let manifest = store.manifest(10);
        assert_eq!(manifest.processed_count, 3);
        assert_eq!(manifest.total_images_found, 10);
        assert_eq!(manifest.excluded_images, vec!["a.jpg".to_string()]);
    }
}
