//! Index lifecycle: create, update, delete.
//!
//! [`IndexManager`] keeps the vector store in step with the canonical
//! content store. Each entity moves through:
//!
//! ```text
//!            index                update               delete
//! Unindexed ───────▶ Indexed ──────────────▶ Indexed ─────────▶ Unindexed
//!                       ▲   (new vector,       │
//!                       └── same key) ─────────┘
//! ```
//!
//! # Write Ordering
//!
//! Every call is stamped with a version when it enters the manager, before
//! the (slow) embedding call. The store applies an upsert only if its version
//! is not lower than the stored one, so when two edits to the same entity
//! race, the edit that entered last wins even if its embedding finishes
//! first.
//!
//! An update computes the new vector first and then replaces the record in a
//! single upsert. A failed embed leaves the previous record searchable.

mod types;
mod validation;

pub use types::{IndexOutcome, IndexRequest};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::embedding::{check_provider_output, EmbeddingService};
use crate::error::Result;
use crate::storage::{IndexedRecord, RecordStore, UpsertOutcome};
use crate::types::{CancellationToken, CompositeKey, EntityType};
use validation::{truncate_display, validate_entity_id, validate_request};

/// Monotonic source of write versions.
///
/// Versions are wall-clock microseconds, bumped by one when the clock has
/// not advanced (or went backwards) since the last stamp.
#[derive(Debug, Default)]
pub(crate) struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Smallest version [`VersionClock`] can produce after 2001-09-09 UTC
/// (10^15 microseconds since the epoch).
const CLOCK_VERSION_FLOOR: u64 = 1_000_000_000_000_000;

/// Whether a rejected version looks like a revision counter losing to a
/// clock-stamped version, rather than a genuinely older edit.
fn is_counter_below_clock(version: u64, current_version: u64) -> bool {
    version < CLOCK_VERSION_FLOOR && current_version >= CLOCK_VERSION_FLOOR
}

/// Orchestrates embedding and storage for content mutations.
///
/// Cheap to clone; clones share the embedder, store, and version clock.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use lessonindex::embedding::HashingEmbedding;
/// use lessonindex::indexer::{IndexManager, IndexRequest};
/// use lessonindex::storage::MemoryStore;
/// use lessonindex::Config;
///
/// let config = Config::default();
/// let manager = IndexManager::new(
///     Arc::new(HashingEmbedding::new(config.dimension())),
///     Arc::new(MemoryStore::new(config.dimension())),
///     &config,
/// );
///
/// let outcome = manager
///     .index(IndexRequest::lesson("L1", "Cells divide by mitosis").organization("org-1"))
///     .unwrap();
/// assert!(outcome.is_written());
/// assert_eq!(manager.delete("L1", None).unwrap(), 1);
/// ```
#[derive(Clone)]
pub struct IndexManager {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn RecordStore>,
    clock: Arc<VersionClock>,
    max_display_chars: usize,
}

impl IndexManager {
    /// Creates a manager over a shared embedder and store.
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn RecordStore>,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            store,
            clock: Arc::new(VersionClock::new()),
            max_display_chars: config.max_display_chars,
        }
    }

    /// Indexes an entity for the first time (or re-indexes it).
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a blank id or content, or a missing
    ///   `organizationId`
    /// - `IndexError::Embedding` if the provider fails; nothing is written
    /// - `IndexError::StoreWrite` if the store fails
    pub fn index(&self, request: IndexRequest) -> Result<IndexOutcome> {
        self.index_with_cancel(request, &CancellationToken::new())
    }

    /// [`index`](Self::index) with cooperative cancellation.
    pub fn index_with_cancel(
        &self,
        request: IndexRequest,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        self.write(request, cancel, "index")
    }

    /// Replaces the indexed form of an entity after its content changed.
    ///
    /// The new vector is computed before anything is touched; the swap is a
    /// single atomic upsert. If the entity was never indexed, it is indexed.
    ///
    /// # Errors
    ///
    /// Same as [`index`](Self::index). On any error the previous record is
    /// left unchanged.
    pub fn update(&self, request: IndexRequest) -> Result<IndexOutcome> {
        self.update_with_cancel(request, &CancellationToken::new())
    }

    /// [`update`](Self::update) with cooperative cancellation.
    pub fn update_with_cancel(
        &self,
        request: IndexRequest,
        cancel: &CancellationToken,
    ) -> Result<IndexOutcome> {
        self.write(request, cancel, "update")
    }

    /// Removes an entity from the index.
    ///
    /// With `entity_type`, removes that one composite key. Without, removes
    /// every record carrying `entity_id`. Returns how many records were
    /// removed; deleting something that is not indexed returns `Ok(0)`.
    ///
    /// Deletion does not leave a tombstone: an index call for the same
    /// entity that is still in flight can re-create the record.
    #[instrument(skip(self))]
    pub fn delete(&self, entity_id: &str, entity_type: Option<EntityType>) -> Result<usize> {
        validate_entity_id(entity_id)?;

        let removed = match entity_type {
            Some(ty) => usize::from(self.store.delete(&CompositeKey::new(ty, entity_id))?),
            None => self.store.delete_by_entity(entity_id)?,
        };

        debug!(removed, "Entity removed from index");
        Ok(removed)
    }

    /// Fetches the indexed record for an entity, if any.
    pub fn get(&self, entity_type: EntityType, entity_id: &str) -> Result<Option<IndexedRecord>> {
        self.store.get(&CompositeKey::new(entity_type, entity_id))
    }

    #[instrument(
        skip(self, request, cancel),
        fields(entity_type = %request.entity_type, entity_id = %request.entity_id)
    )]
    fn write(
        &self,
        request: IndexRequest,
        cancel: &CancellationToken,
        operation: &'static str,
    ) -> Result<IndexOutcome> {
        let explicit_version = request.version.is_some();
        let version = request.version.unwrap_or_else(|| self.clock.next());

        validate_request(&request)?;
        cancel.check()?;

        let embedding = self.embedder.embed(&request.content)?;
        check_provider_output(&embedding, self.store.dimension())?;

        cancel.check()?;

        let display_content = truncate_display(&request.content, self.max_display_chars);
        let record = IndexedRecord::new(
            request.entity_type,
            request.entity_id,
            embedding,
            display_content,
            request.metadata,
            version,
        );

        let outcome = match self.store.upsert(&record)? {
            UpsertOutcome::Written { replaced } => {
                debug!(operation, version, replaced, "Record indexed");
                IndexOutcome::Written {
                    key: record.key,
                    version,
                    replaced,
                }
            }
            UpsertOutcome::Stale { current_version } => {
                if explicit_version && is_counter_below_clock(version, current_version) {
                    warn!(
                        operation,
                        version,
                        current_version,
                        "Caller-supplied version is below a clock-stamped one; \
                         supply microsecond timestamps, not revision counters"
                    );
                } else {
                    warn!(
                        operation,
                        version, current_version, "Stale write rejected; a newer edit is indexed"
                    );
                }
                IndexOutcome::Stale {
                    key: record.key,
                    version,
                    current_version,
                }
            }
        };

        Ok(outcome)
    }
}

impl std::fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("dimension", &self.store.dimension())
            .field("max_display_chars", &self.max_display_chars)
            .finish_non_exhaustive()
    }
}
