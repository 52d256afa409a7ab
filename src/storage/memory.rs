//! In-memory record store.
//!
//! Useful for tests and for short-lived indexes that are rebuilt from the
//! canonical content store on startup. Nothing survives a drop.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::record::{IndexedRecord, ScoredRecord, UpsertOutcome};
use super::{validate_query, validate_record, Ranker, RecordStore};
use crate::error::{IndexError, Result, StorageError};
use crate::search::MetadataFilter;
use crate::types::{CancellationToken, CompositeKey};

/// Record store backed by a `HashMap` behind an `RwLock`.
///
/// Every operation holds the lock for its whole duration, so writes are
/// atomic per call and readers see whole records only.
#[derive(Debug)]
pub struct MemoryStore {
    dimension: usize,
    records: RwLock<HashMap<CompositeKey, IndexedRecord>>,
}

impl MemoryStore {
    /// Creates an empty store for embeddings of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<CompositeKey, IndexedRecord>>> {
        self.records
            .read()
            .map_err(|e| IndexError::query(StorageError::Poisoned(e.to_string())))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<CompositeKey, IndexedRecord>>> {
        self.records
            .write()
            .map_err(|e| IndexError::write(StorageError::Poisoned(e.to_string())))
    }
}

impl RecordStore for MemoryStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, record: &IndexedRecord) -> Result<UpsertOutcome> {
        validate_record(record, self.dimension)?;

        let mut records = self.write()?;
        let replaced = match records.get(&record.key) {
            Some(current) if record.version < current.version => {
                debug!(
                    key = %record.key,
                    current_version = current.version,
                    "Stale upsert ignored"
                );
                return Ok(UpsertOutcome::Stale {
                    current_version: current.version,
                });
            }
            Some(_) => true,
            None => false,
        };

        records.insert(record.key.clone(), record.clone());
        Ok(UpsertOutcome::Written { replaced })
    }

    fn delete(&self, key: &CompositeKey) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn delete_by_entity(&self, entity_id: &str) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, record| record.entity_id != entity_id);
        Ok(before - records.len())
    }

    fn get(&self, key: &CompositeKey) -> Result<Option<IndexedRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }

    fn nearest_neighbors(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRecord>> {
        validate_query(query, self.dimension, top_k)?;
        cancel.check()?;

        let records = self.read()?;
        let mut ranker = Ranker::new(query, filter, top_k, cancel);
        for record in records.values() {
            if ranker.admit(record)? {
                ranker.push(record.clone())?;
            }
        }
        drop(records);

        ranker.finish()
    }
}
