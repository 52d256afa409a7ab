//! Vector record store abstractions.
//!
//! This module provides a trait-based abstraction over the record store,
//! allowing different backends to be used (redb for production, in-memory
//! for tests and ephemeral indexes).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          IndexManager            RetrievalService            │
//! │                 │                       │                    │
//! │                 ▼                       ▼                    │
//! │              ┌─────────────────────────────┐                 │
//! │              │        RecordStore          │  ← Trait        │
//! │              └─────────────────────────────┘                 │
//! │                    ▲                 ▲                       │
//! │                    │                 │                       │
//! │            ┌───────┴─────┐   ┌───────┴──────┐                │
//! │            │  RedbStore  │   │ MemoryStore  │                │
//! │            └─────────────┘   └──────────────┘                │
//! │               (persistent)      (ephemeral)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both backends share validation and ranking (see [`Ranker`]) so results are
//! identical for identical contents.

pub mod memory;
pub mod record;
pub mod redb;
pub mod schema;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;
pub use record::{IndexedRecord, ScoredRecord, UpsertOutcome};
pub use schema::{StoreMetadata, SCHEMA_VERSION};

use std::path::Path;

use crate::error::{IndexError, Result, StorageError, ValidationError};
use crate::search::MetadataFilter;
use crate::types::{CancellationToken, CompositeKey};
use crate::vector::{select_top_k, similarity_score};

/// Candidates visited between cancellation checks during a scan.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Vector record store trait.
///
/// Every method is atomic with respect to itself: a concurrent reader sees
/// a record either entirely before or entirely after a write. There are no
/// cross-call transactions.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the index shares one store between
/// the writer and reader paths behind an `Arc`.
pub trait RecordStore: Send + Sync {
    /// Embedding dimension every record and query must have.
    fn dimension(&self) -> usize;

    /// Inserts or fully replaces the record at `record.key`.
    ///
    /// Compare-and-set on version: if the stored record has a higher
    /// version, nothing is written and [`UpsertOutcome::Stale`] is returned.
    /// Upserting the same record twice leaves the same end state.
    ///
    /// # Errors
    ///
    /// - `ValidationError::DimensionMismatch` if the embedding length differs
    ///   from [`dimension`](Self::dimension)
    /// - `IndexError::StoreWrite` if the backend fails
    fn upsert(&self, record: &IndexedRecord) -> Result<UpsertOutcome>;

    /// Removes the record at `key`.
    ///
    /// Returns `true` if a record was removed, `false` if none existed.
    /// A missing key is not an error.
    fn delete(&self, key: &CompositeKey) -> Result<bool>;

    /// Removes every record for `entity_id`, whatever its entity type.
    ///
    /// Returns the number of records removed.
    fn delete_by_entity(&self, entity_id: &str) -> Result<usize>;

    /// Fetches one record, including its embedding.
    fn get(&self, key: &CompositeKey) -> Result<Option<IndexedRecord>>;

    /// Number of live records.
    fn count(&self) -> Result<u64>;

    /// Scores every record passing `filter` against `query` and returns the
    /// best `top_k`, highest score first.
    ///
    /// Ties are broken by most recently indexed first. The filter is applied
    /// before scoring, never after.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if `top_k == 0` or the query dimension is wrong
    /// - `IndexError::Cancelled` if `cancel` fires during the scan
    /// - `IndexError::StoreQuery` if the backend fails
    fn nearest_neighbors(
        &self,
        query: &[f32],
        filter: &MetadataFilter,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRecord>>;

    /// Path of the backing file, if any.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Checks a record before it is written.
pub(crate) fn validate_record(record: &IndexedRecord, dimension: usize) -> Result<()> {
    if record.entity_id.trim().is_empty() {
        return Err(ValidationError::required_field("entity_id").into());
    }
    if record.embedding.len() != dimension {
        return Err(ValidationError::dimension_mismatch(dimension, record.embedding.len()).into());
    }
    Ok(())
}

/// Checks a nearest-neighbor query before any scan.
pub(crate) fn validate_query(query: &[f32], dimension: usize, top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(ValidationError::invalid_field("top_k", "must be greater than 0").into());
    }
    if query.len() != dimension {
        return Err(ValidationError::dimension_mismatch(dimension, query.len()).into());
    }
    Ok(())
}

/// Streaming top-k collector shared by the store backends.
///
/// Callers first [`admit`](Self::admit) a record (filter + cancellation), then
/// load its embedding and [`push`](Self::push) it. The candidate buffer is
/// pruned back to `top_k` whenever it grows past a bound, so memory stays
/// proportional to `top_k` rather than to the number of candidates.
pub(crate) struct Ranker<'a> {
    query: &'a [f32],
    filter: &'a MetadataFilter,
    cancel: &'a CancellationToken,
    top_k: usize,
    prune_at: usize,
    visited: usize,
    candidates: Vec<ScoredRecord>,
}

impl<'a> Ranker<'a> {
    pub(crate) fn new(
        query: &'a [f32],
        filter: &'a MetadataFilter,
        top_k: usize,
        cancel: &'a CancellationToken,
    ) -> Self {
        let prune_at = top_k.saturating_mul(4).saturating_add(1024);
        Self {
            query,
            filter,
            cancel,
            top_k,
            prune_at,
            visited: 0,
            candidates: Vec::new(),
        }
    }

    /// Returns whether the record is in scope. Checks for cancellation
    /// every [`CANCEL_CHECK_INTERVAL`] records.
    pub(crate) fn admit(&mut self, record: &IndexedRecord) -> Result<bool> {
        self.visited += 1;
        if self.visited % CANCEL_CHECK_INTERVAL == 0 {
            self.cancel.check()?;
        }
        Ok(self.filter.matches(record))
    }

    /// Scores an admitted record whose embedding has been loaded.
    pub(crate) fn push(&mut self, record: IndexedRecord) -> Result<()> {
        if record.embedding.len() != self.query.len() {
            return Err(IndexError::query(StorageError::corrupted(format!(
                "stored embedding for {} has {} dimensions, expected {}",
                record.key,
                record.embedding.len(),
                self.query.len()
            ))));
        }

        let score = similarity_score(self.query, &record.embedding);
        self.candidates.push(ScoredRecord { record, score });

        if self.candidates.len() >= self.prune_at {
            let candidates = std::mem::take(&mut self.candidates);
            self.candidates = select_top_k(candidates, self.top_k);
        }
        Ok(())
    }

    /// Final cancellation check, then the ranked top-k.
    pub(crate) fn finish(self) -> Result<Vec<ScoredRecord>> {
        self.cancel.check()?;
        Ok(select_top_k(self.candidates, self.top_k))
    }
}

/// Opens the persistent store at the given path.
///
/// Convenience wrapper around [`RedbStore::open`].
pub fn open_store(
    path: impl AsRef<Path>,
    config: &crate::config::Config,
) -> Result<Box<dyn RecordStore>> {
    let store = RedbStore::open(path, config)?;
    Ok(Box::new(store))
}
