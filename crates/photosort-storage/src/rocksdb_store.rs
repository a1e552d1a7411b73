//! RocksDB implementation of the core's `ProjectStore`.
//!
//! Record puts go through a `WriteBatch` so a flush lands atomically with
//! respect to concurrent readers. Loading a project is a prefix scan over
//! the records column family; the manifest is a single point read.

use std::path::Path;

use rocksdb::{ColumnFamily, Direction, IteratorMode, WriteBatch, DB};

use photosort_core::{CoreError, CoreResult, EmbeddingRecord, ProjectManifest, ProjectStore};

use crate::column_families::{cf_descriptors, CF_MANIFESTS, CF_RECORDS};
use crate::error::{StorageError, StorageResult};
use crate::keys::{parse_record_key, record_key, record_prefix};
use crate::serialization::{decode_manifest, decode_vector, encode_manifest, encode_vector};

/// RocksDB-backed durable record store.
///
/// # Thread Safety
/// RocksDB's `DB` is internally thread-safe for concurrent reads and
/// writes; share via `Arc<RocksDbProjectStore>`.
pub struct RocksDbProjectStore {
    db: DB,
}

impl RocksDbProjectStore {
    /// Open (creating if missing) the database at `path` with both column
    /// families.
    ///
    /// # Errors
    /// `StorageError::OpenFailed` when RocksDB cannot open the directory.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors()).map_err(|e| {
            StorageError::OpenFailed {
                path: path.as_ref().display().to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::debug!(path = %path.as_ref().display(), "opened project store");
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> StorageResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound {
                name: name.to_string(),
            })
    }

    fn put_records_inner(
        &self,
        project: &str,
        records: &[EmbeddingRecord],
    ) -> StorageResult<()> {
        let cf = self.cf(CF_RECORDS)?;
        let mut batch = WriteBatch::default();
        for record in records {
            batch.put_cf(cf, record_key(project, &record.path), encode_vector(&record.vector));
        }
        self.db
            .write(batch)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        tracing::debug!(project, records = records.len(), "persisted records");
        Ok(())
    }

    fn records_inner(&self, project: &str) -> StorageResult<Vec<EmbeddingRecord>> {
        let cf = self.cf(CF_RECORDS)?;
        let prefix = record_prefix(project);
        let mut records = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let Some((_, path)) = parse_record_key(&key) else {
                continue;
            };
            let vector = decode_vector(&value)?;
            records.push(EmbeddingRecord::new(path, vector));
        }
        Ok(records)
    }

    fn put_manifest_inner(
        &self,
        project: &str,
        manifest: &ProjectManifest,
    ) -> StorageResult<()> {
        let cf = self.cf(CF_MANIFESTS)?;
        let bytes = encode_manifest(manifest)?;
        self.db
            .put_cf(cf, project.as_bytes(), bytes)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))
    }

    fn manifest_inner(&self, project: &str) -> StorageResult<Option<ProjectManifest>> {
        let cf = self.cf(CF_MANIFESTS)?;
        let bytes = self
            .db
            .get_cf(cf, project.as_bytes())
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
        match bytes {
            None => Ok(None),
            Some(bytes) => match decode_manifest(&bytes) {
                Ok(manifest) => Ok(Some(manifest)),
                Err(e) => {
                    // Treated as no prior session rather than an error.
                    tracing::warn!(project, error = %e, "corrupted manifest ignored");
                    Ok(None)
                }
            },
        }
    }
}

impl ProjectStore for RocksDbProjectStore {
    fn put_records(&self, project: &str, records: &[EmbeddingRecord]) -> CoreResult<()> {
        self.put_records_inner(project, records)
            .map_err(|e| CoreError::persistence(e.to_string()))
    }

    fn records_for_project(&self, project: &str) -> CoreResult<Vec<EmbeddingRecord>> {
        self.records_inner(project)
            .map_err(|e| CoreError::persistence(e.to_string()))
    }

    fn put_manifest(&self, project: &str, manifest: &ProjectManifest) -> CoreResult<()> {
        self.put_manifest_inner(project, manifest)
            .map_err(|e| CoreError::persistence(e.to_string()))
    }

    fn get_manifest(&self, project: &str) -> CoreResult<Option<ProjectManifest>> {
        self.manifest_inner(project)
            .map_err(|e| CoreError::persistence(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(path: &str, v: &[f32]) -> EmbeddingRecord {
        EmbeddingRecord::new(path, v.to_vec())
    }

    fn open_store(dir: &TempDir) -> RocksDbProjectStore {
        RocksDbProjectStore::open(dir.path()).expect("open failed")
    }

    #[test]
    fn records_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let records = vec![
            rec("a.jpg", &[1.0, 2.0, 3.0]),
            rec("sub/b.jpg", &[-0.5, 0.25, 0.0]),
        ];
        store.put_records("proj", &records).unwrap();

        let mut loaded = store.records_for_project("proj").unwrap();
        loaded.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(loaded, records);
    }

    #[test]
    fn put_replaces_by_path() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.put_records("proj", &[rec("a.jpg", &[1.0])]).unwrap();
        store.put_records("proj", &[rec("a.jpg", &[2.0])]).unwrap();

        let loaded = store.records_for_project("proj").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].vector, vec![2.0]);
    }

    #[test]
    fn projects_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.put_records("alpha", &[rec("a.jpg", &[1.0])]).unwrap();
        store.put_records("alphabet", &[rec("b.jpg", &[2.0])]).unwrap();

        let alpha = store.records_for_project("alpha").unwrap();
        assert_eq!(alpha.len(), 1);
        assert_eq!(alpha[0].path, "a.jpg");

        let alphabet = store.records_for_project("alphabet").unwrap();
        assert_eq!(alphabet.len(), 1);
        assert_eq!(alphabet[0].path, "b.jpg");
    }

    #[test]
    fn empty_project_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.records_for_project("ghost").unwrap().is_empty());
    }

    #[test]
    fn manifest_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(store.get_manifest("proj").unwrap().is_none());
        let manifest = ProjectManifest::new(7, 20, vec!["x.jpg".into()]);
        store.put_manifest("proj", &manifest).unwrap();
        assert_eq!(store.get_manifest("proj").unwrap(), Some(manifest));
    }

    #[test]
    fn corrupted_manifest_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let cf = store.cf(CF_MANIFESTS).unwrap();
        store.db.put_cf(cf, b"proj", b"not a manifest").unwrap();
        assert!(store.get_manifest("proj").unwrap().is_none());
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir);
            store.put_records("proj", &[rec("a.jpg", &[1.0, 2.0])]).unwrap();
            store
                .put_manifest("proj", &ProjectManifest::new(1, 1, vec![]))
                .unwrap();
        }
        let store = open_store(&dir);
        assert_eq!(store.records_for_project("proj").unwrap().len(), 1);
        assert!(store.get_manifest("proj").unwrap().is_some());
    }
}
