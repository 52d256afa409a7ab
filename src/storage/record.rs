//! Record types stored in and returned by a [`RecordStore`](super::RecordStore).

use serde::{Deserialize, Serialize};

use crate::types::{CompositeKey, Embedding, EntityType, Metadata, Timestamp, ORGANIZATION_ID};

/// One indexed entity: identity, vector, display excerpt, scoping metadata.
///
/// # Serialization Note
///
/// The `embedding` field is marked `#[serde(skip)]` because embeddings are
/// stored in a separate `EMBEDDINGS_TABLE` as raw f32 bytes. The storage
/// layer reconstitutes the full struct by joining both tables on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    /// `<type>:<entity id>`; primary key in the store.
    pub key: CompositeKey,

    /// Kind of source entity.
    pub entity_type: EntityType,

    /// Id of the source entity in the canonical content store.
    pub entity_id: String,

    /// Embedding vector. Length equals the store dimension.
    #[serde(skip)]
    pub embedding: Embedding,

    /// Truncated copy of the source text for result previews.
    pub display_content: String,

    /// Scoping and descriptive metadata.
    pub metadata: Metadata,

    /// When this record was last written.
    pub indexed_at: Timestamp,

    /// Monotonic write version; older versions never replace newer ones.
    pub version: u64,
}

impl IndexedRecord {
    /// Builds a record stamped with the current time.
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        embedding: Embedding,
        display_content: String,
        metadata: Metadata,
        version: u64,
    ) -> Self {
        let entity_id = entity_id.into();
        Self {
            key: CompositeKey::new(entity_type, &entity_id),
            entity_type,
            entity_id,
            embedding,
            display_content,
            metadata,
            indexed_at: Timestamp::now(),
            version,
        }
    }

    /// The tenant this record belongs to, if tagged.
    pub fn organization_id(&self) -> Option<&str> {
        self.metadata.get(ORGANIZATION_ID).map(String::as_str)
    }
}

/// A record paired with its similarity to a query vector.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredRecord {
    /// The matching record, including its embedding.
    pub record: IndexedRecord,

    /// Similarity in `[0, 1]`.
    pub score: f32,
}

/// What an upsert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The record was written.
    Written {
        /// Whether a previous record for the key was replaced.
        replaced: bool,
    },

    /// The stored record has a newer version; nothing was written.
    Stale {
        /// Version currently stored for the key.
        current_version: u64,
    },
}

impl UpsertOutcome {
    /// Returns true if the write was applied.
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    /// Returns true if the write was rejected as stale.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}
