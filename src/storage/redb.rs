//! redb record store implementation.
//!
//! This module provides the persistent backend using
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store.
//!
//! # Features
//!
//! - ACID transactions with MVCC
//! - Single-writer, multiple-reader concurrency
//! - Automatic crash recovery
//! - Zero external dependencies (pure Rust)
//!
//! Every upsert and delete is one write transaction spanning the record,
//! embedding, and secondary index tables, so readers never observe a
//! half-written record.

use std::path::{Path, PathBuf};

use ::redb::{
    Database, ReadOnlyTable, ReadableMultimapTable, ReadableTable, ReadableTableMetadata,
    WriteTransaction,
};
use tracing::{debug, info, instrument, warn};

use super::record::{IndexedRecord, ScoredRecord, UpsertOutcome};
use super::schema::{
    decode_embedding, encode_embedding, StoreMetadata, EMBEDDINGS_TABLE, METADATA_TABLE,
    RECORDS_BY_ENTITY_TABLE, RECORDS_BY_ORGANIZATION_TABLE, RECORDS_TABLE, SCHEMA_VERSION,
};
use super::{validate_query, validate_record, Ranker, RecordStore};
use crate::config::{Config, EmbeddingDimension};
use crate::error::{IndexError, Result, StorageError, ValidationError};
use crate::search::MetadataFilter;
use crate::types::{CancellationToken, CompositeKey};

/// Metadata key in the metadata table.
const METADATA_KEY: &str = "store_metadata";

/// redb-backed record store.
///
/// Holds the redb database handle and cached store metadata.
///
/// # Thread Safety
///
/// `RedbStore` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers.
#[derive(Debug)]
pub struct RedbStore {
    /// The redb database handle.
    db: Database,

    /// Cached store metadata.
    metadata: StoreMetadata,

    /// Path to the database file.
    path: PathBuf,
}

impl RedbStore {
    /// Opens or creates a store at the given path.
    ///
    /// If the file doesn't exist, it is created and initialized with the
    /// configured embedding dimension. If it exists, the stored schema
    /// version and dimension are checked against the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is corrupted or not a store
    /// - The file is locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match (for existing stores)
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use lessonindex::{Config, storage::RedbStore};
    ///
    /// let store = RedbStore::open("./content.idx", &Config::default())?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref();
        let db_exists = path.exists();

        debug!(db_exists = db_exists, "Opening record store");

        let db = Self::create_database(path)?;

        if db_exists {
            Self::open_existing(db, path.to_path_buf(), config)
        } else {
            Self::initialize_new(db, path.to_path_buf(), config)
        }
    }

    /// Creates or opens the redb database file.
    fn create_database(path: &Path) -> Result<Database> {
        // redb doesn't expose a typed error variant for lock conflicts,
        // so we detect them via the error message.
        let db = Database::builder().create(path).map_err(|e| {
            if e.to_string().contains("locked") {
                IndexError::write(StorageError::DatabaseLocked)
            } else {
                IndexError::write(StorageError::Redb(e.to_string()))
            }
        })?;

        debug!("Database file opened successfully");
        Ok(db)
    }

    /// Initializes a new store with tables and metadata.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn initialize_new(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Initializing new record store");

        let metadata = StoreMetadata::new(config.embedding_dimension);

        let write_txn = db.begin_write().map_err(IndexError::write)?;
        {
            let mut meta_table = write_txn
                .open_table(METADATA_TABLE)
                .map_err(IndexError::write)?;
            let metadata_bytes = bincode::serialize(&metadata).map_err(IndexError::write)?;
            meta_table
                .insert(METADATA_KEY, metadata_bytes.as_slice())
                .map_err(IndexError::write)?;

            write_txn
                .open_table(RECORDS_TABLE)
                .map_err(IndexError::write)?;
            write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(IndexError::write)?;
            write_txn
                .open_multimap_table(RECORDS_BY_ENTITY_TABLE)
                .map_err(IndexError::write)?;
            write_txn
                .open_multimap_table(RECORDS_BY_ORGANIZATION_TABLE)
                .map_err(IndexError::write)?;
        }
        write_txn.commit().map_err(IndexError::write)?;

        info!(
            schema_version = SCHEMA_VERSION,
            dimension = config.embedding_dimension.size(),
            "Record store initialized"
        );

        Ok(Self { db, metadata, path })
    }

    /// Opens and validates an existing store.
    #[instrument(skip(db, config), fields(path = %path.display()))]
    fn open_existing(db: Database, path: PathBuf, config: &Config) -> Result<Self> {
        info!("Opening existing record store");

        let read_txn = db.begin_read().map_err(IndexError::query)?;

        let metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                IndexError::query(StorageError::corrupted(format!(
                    "Cannot open metadata table: {}",
                    e
                )))
            })?;

            let metadata_bytes = meta_table
                .get(METADATA_KEY)
                .map_err(IndexError::query)?
                .ok_or_else(|| {
                    IndexError::query(StorageError::corrupted("Missing store metadata"))
                })?;

            bincode::deserialize::<StoreMetadata>(metadata_bytes.value()).map_err(|e| {
                IndexError::query(StorageError::corrupted(format!(
                    "Invalid metadata format: {}",
                    e
                )))
            })?
        };

        drop(read_txn);

        if !metadata.is_compatible() {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(IndexError::query(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }));
        }

        if metadata.embedding_dimension != config.embedding_dimension {
            warn!(
                expected = config.embedding_dimension.size(),
                found = metadata.embedding_dimension.size(),
                "Embedding dimension mismatch"
            );
            return Err(IndexError::Validation(ValidationError::DimensionMismatch {
                expected: config.embedding_dimension.size(),
                got: metadata.embedding_dimension.size(),
            }));
        }

        let mut metadata = metadata;
        metadata.touch();

        let write_txn = db.begin_write().map_err(IndexError::write)?;
        {
            let mut meta_table = write_txn
                .open_table(METADATA_TABLE)
                .map_err(IndexError::write)?;
            let metadata_bytes = bincode::serialize(&metadata).map_err(IndexError::write)?;
            meta_table
                .insert(METADATA_KEY, metadata_bytes.as_slice())
                .map_err(IndexError::write)?;
        }
        write_txn.commit().map_err(IndexError::write)?;

        info!(
            schema_version = metadata.schema_version,
            dimension = metadata.embedding_dimension.size(),
            "Record store opened successfully"
        );

        Ok(Self { db, metadata, path })
    }

    /// Returns the cached store metadata.
    #[inline]
    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Returns the embedding dimension configured for this store.
    #[inline]
    pub fn embedding_dimension(&self) -> EmbeddingDimension {
        self.metadata.embedding_dimension
    }

    /// Returns the underlying redb database.
    #[cfg(test)]
    pub(crate) fn database(&self) -> &Database {
        &self.db
    }

    /// Writes `record` inside `txn`, unless a newer version is stored.
    fn upsert_in(
        txn: &WriteTransaction,
        record: &IndexedRecord,
        record_bytes: &[u8],
        embedding_bytes: &[u8],
    ) -> std::result::Result<UpsertOutcome, StorageError> {
        let key = record.key.as_str();

        let previous: Option<IndexedRecord> = {
            let records = txn.open_table(RECORDS_TABLE)?;
            let bytes = records.get(key)?.map(|guard| guard.value().to_vec());
            match bytes {
                Some(bytes) => Some(bincode::deserialize(&bytes)?),
                None => None,
            }
        };

        if let Some(prev) = &previous {
            if record.version < prev.version {
                return Ok(UpsertOutcome::Stale {
                    current_version: prev.version,
                });
            }
        }

        {
            let mut records = txn.open_table(RECORDS_TABLE)?;
            records.insert(key, record_bytes)?;
        }
        {
            let mut embeddings = txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.insert(key, embedding_bytes)?;
        }
        {
            let mut by_entity = txn.open_multimap_table(RECORDS_BY_ENTITY_TABLE)?;
            by_entity.insert(record.entity_id.as_str(), key)?;
        }
        {
            let mut by_org = txn.open_multimap_table(RECORDS_BY_ORGANIZATION_TABLE)?;
            let previous_org = previous.as_ref().and_then(|p| p.organization_id());
            if let Some(old) = previous_org {
                if Some(old) != record.organization_id() {
                    by_org.remove(old, key)?;
                }
            }
            if let Some(org) = record.organization_id() {
                by_org.insert(org, key)?;
            }
        }

        Ok(UpsertOutcome::Written {
            replaced: previous.is_some(),
        })
    }

    /// Removes the record at `key` and its index entries inside `txn`.
    fn remove_in(txn: &WriteTransaction, key: &str) -> std::result::Result<bool, StorageError> {
        let removed = {
            let mut records = txn.open_table(RECORDS_TABLE)?;
            let removed = records.remove(key)?.map(|guard| guard.value().to_vec());
            removed
        };

        let Some(bytes) = removed else {
            return Ok(false);
        };
        let previous: IndexedRecord = bincode::deserialize(&bytes)?;

        {
            let mut embeddings = txn.open_table(EMBEDDINGS_TABLE)?;
            embeddings.remove(key)?;
        }
        {
            let mut by_entity = txn.open_multimap_table(RECORDS_BY_ENTITY_TABLE)?;
            by_entity.remove(previous.entity_id.as_str(), key)?;
        }
        if let Some(org) = previous.organization_id() {
            let mut by_org = txn.open_multimap_table(RECORDS_BY_ORGANIZATION_TABLE)?;
            by_org.remove(org, key)?;
        }

        Ok(true)
    }

    /// Removes every record for `entity_id` inside `txn`.
    fn remove_entity_in(
        txn: &WriteTransaction,
        entity_id: &str,
    ) -> std::result::Result<usize, StorageError> {
        let keys: Vec<String> = {
            let by_entity = txn.open_multimap_table(RECORDS_BY_ENTITY_TABLE)?;
            let mut keys = Vec::new();
            for entry in by_entity.get(entity_id)? {
                keys.push(entry?.value().to_string());
            }
            keys
        };

        let mut removed = 0;
        for key in &keys {
            if Self::remove_in(txn, key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Loads the embedding for an admitted candidate and hands it to the ranker.
    fn offer(
        ranker: &mut Ranker<'_>,
        embeddings: &ReadOnlyTable<&'static str, &'static [u8]>,
        mut record: IndexedRecord,
    ) -> Result<()> {
        if !ranker.admit(&record)? {
            return Ok(());
        }

        let bytes = embeddings
            .get(record.key.as_str())
            .map_err(IndexError::query)?
            .ok_or_else(|| {
                IndexError::query(StorageError::corrupted(format!(
                    "Missing embedding for {}",
                    record.key
                )))
            })?;
        record.embedding = decode_embedding(bytes.value()).map_err(IndexError::query)?;
        drop(bytes);

        ranker.push(record)
    }
}

impl RecordStore for RedbStore {
    fn dimension(&self) -> usize {
        self.metadata.embedding_dimension.size()
    }

    #[instrument(skip(self, record), fields(key = %record.key, version = record.version))]
    fn upsert(&self, record: &IndexedRecord) -> Result<UpsertOutcome> {
        validate_record(record, self.dimension())?;

        let record_bytes = bincode::serialize(record).map_err(IndexError::write)?;
        let embedding_bytes = encode_embedding(&record.embedding);

        let write_txn = self.db.begin_write().map_err(IndexError::write)?;
        let outcome = Self::upsert_in(&write_txn, record, &record_bytes, &embedding_bytes)
            .map_err(IndexError::write)?;

        match outcome {
            UpsertOutcome::Stale { current_version } => {
                write_txn.abort().map_err(IndexError::write)?;
                debug!(current_version, "Stale upsert ignored");
            }
            UpsertOutcome::Written { replaced } => {
                write_txn.commit().map_err(IndexError::write)?;
                debug!(replaced, "Record upserted");
            }
        }

        Ok(outcome)
    }

    #[instrument(skip(self), fields(key = %key))]
    fn delete(&self, key: &CompositeKey) -> Result<bool> {
        let write_txn = self.db.begin_write().map_err(IndexError::write)?;
        let existed = Self::remove_in(&write_txn, key.as_str()).map_err(IndexError::write)?;
        write_txn.commit().map_err(IndexError::write)?;

        if existed {
            debug!("Record deleted");
        }
        Ok(existed)
    }

    #[instrument(skip(self))]
    fn delete_by_entity(&self, entity_id: &str) -> Result<usize> {
        let write_txn = self.db.begin_write().map_err(IndexError::write)?;
        let removed = Self::remove_entity_in(&write_txn, entity_id).map_err(IndexError::write)?;
        write_txn.commit().map_err(IndexError::write)?;

        if removed > 0 {
            debug!(removed, "Entity records deleted");
        }
        Ok(removed)
    }

    fn get(&self, key: &CompositeKey) -> Result<Option<IndexedRecord>> {
        let read_txn = self.db.begin_read().map_err(IndexError::query)?;
        let records = read_txn
            .open_table(RECORDS_TABLE)
            .map_err(IndexError::query)?;
        let embeddings = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(IndexError::query)?;

        let Some(bytes) = records.get(key.as_str()).map_err(IndexError::query)? else {
            return Ok(None);
        };
        let mut record: IndexedRecord =
            bincode::deserialize(bytes.value()).map_err(IndexError::query)?;

        if let Some(embedding) = embeddings.get(key.as_str()).map_err(IndexError::query)? {
            record.embedding = decode_embedding(embedding.value()).map_err(IndexError::query)?;
        }

        Ok(Some(record))
    }

    fn count(&self) -> Result<u64> {
        let read_txn = self.db.begin_read().map_err(IndexError::query)?;
        let records = read_txn
            .open_table(RECORDS_TABLE)
            .map_err(IndexError::query)?;
        records.len().map_err(IndexError::query)
    }

    #[instrument(skip(self, query, filter, cancel), fields(top_k = top_k))]
    fn nearest_neighbors(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRecord>> {
        validate_query(query, self.dimension(), top_k)?;
        cancel.check()?;

        let read_txn = self.db.begin_read().map_err(IndexError::query)?;
        let records = read_txn
            .open_table(RECORDS_TABLE)
            .map_err(IndexError::query)?;
        let embeddings = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(IndexError::query)?;

        let mut ranker = Ranker::new(query, filter, top_k, cancel);

        match filter.organization_id() {
            Some(org) => {
                let by_org = read_txn
                    .open_multimap_table(RECORDS_BY_ORGANIZATION_TABLE)
                    .map_err(IndexError::query)?;
                for entry in by_org.get(org).map_err(IndexError::query)? {
                    let guard = entry.map_err(IndexError::query)?;
                    let key = guard.value();
                    let bytes = records
                        .get(key)
                        .map_err(IndexError::query)?
                        .ok_or_else(|| {
                            IndexError::query(StorageError::corrupted(format!(
                                "Organization index points at missing record {}",
                                key
                            )))
                        })?;
                    let record: IndexedRecord =
                        bincode::deserialize(bytes.value()).map_err(IndexError::query)?;
                    Self::offer(&mut ranker, &embeddings, record)?;
                }
            }
            None => {
                for entry in records.iter().map_err(IndexError::query)? {
                    let (_, value) = entry.map_err(IndexError::query)?;
                    let record: IndexedRecord =
                        bincode::deserialize(value.value()).map_err(IndexError::query)?;
                    Self::offer(&mut ranker, &embeddings, record)?;
                }
            }
        }

        let results = ranker.finish()?;
        debug!(results = results.len(), "Nearest neighbors computed");
        Ok(results)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

// RedbStore is auto Send + Sync: Database, StoreMetadata, and PathBuf
// are all Send + Sync.
