//! Database schema definitions and versioning.
//!
//! This module defines the table structure for the redb record store.
//! All table definitions are compile-time constants to ensure consistency.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the metadata table. When opening an
//! existing store, we check the version and fail if it doesn't match.
//!
//! # Table Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ METADATA_TABLE                                               │
//! │   Key: &str                                                  │
//! │   Value: &[u8] (bincode)                                     │
//! │   Entries: "store_metadata" -> StoreMetadata                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RECORDS_TABLE                                                │
//! │   Key: &str (composite key, e.g. "lesson:42")                │
//! │   Value: &[u8] (bincode IndexedRecord, without embedding)    │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ EMBEDDINGS_TABLE                                             │
//! │   Key: &str (composite key)                                  │
//! │   Value: &[u8] (dimension * 4 bytes, little-endian f32)      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │ RECORDS_BY_ENTITY_TABLE (multimap)                           │
//! │   entity id -> composite key                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │ RECORDS_BY_ORGANIZATION_TABLE (multimap)                     │
//! │   organizationId -> composite key                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use redb::{MultimapTableDefinition, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::error::StorageError;
use crate::types::Timestamp;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The store will refuse to open if versions don't match.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Table Definitions
// ============================================================================

/// Metadata table for store-level information.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Indexed records keyed by composite key.
///
/// Value: bincode-serialized `IndexedRecord` (embedding skipped).
pub const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Embeddings table.
///
/// Stored separately from records so filter checks never touch vector bytes.
pub const EMBEDDINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");

/// Index: composite keys by entity id, for delete-by-entity.
pub const RECORDS_BY_ENTITY_TABLE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("records_by_entity");

/// Index: composite keys by organization id, for tenant-scoped candidate
/// selection.
pub const RECORDS_BY_ORGANIZATION_TABLE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("records_by_organization");

// ============================================================================
// Store Metadata
// ============================================================================

/// Store metadata kept in the metadata table under `"store_metadata"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Schema version for compatibility checking.
    pub schema_version: u32,

    /// Embedding dimension configured for this store.
    ///
    /// Once set, this cannot be changed without rebuilding the index.
    pub embedding_dimension: EmbeddingDimension,

    /// Timestamp when the store was created.
    pub created_at: Timestamp,

    /// Last time the store was opened (updated on each open).
    pub last_opened_at: Timestamp,
}

impl StoreMetadata {
    /// Creates new metadata for a fresh store.
    pub fn new(embedding_dimension: EmbeddingDimension) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    /// Updates the last_opened_at timestamp.
    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    /// Checks if this metadata is compatible with the current schema.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// Embedding Encoding
// ============================================================================

/// Encodes an embedding as little-endian f32 bytes.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes little-endian f32 bytes into an embedding.
///
/// # Errors
///
/// Returns `StorageError::Corrupted` if the byte length is not a multiple of 4.
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>, StorageError> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::corrupted(format!(
            "embedding byte length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }

    #[test]
    fn test_store_metadata_new() {
        let meta = StoreMetadata::new(EmbeddingDimension::D384);
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.embedding_dimension, EmbeddingDimension::D384);
        assert!(meta.is_compatible());
    }

    #[test]
    fn test_store_metadata_touch() {
        let mut meta = StoreMetadata::new(EmbeddingDimension::D384);
        let original = meta.last_opened_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        meta.touch();
        assert!(meta.last_opened_at > original);
    }

    #[test]
    fn test_store_metadata_serialization() {
        let meta = StoreMetadata::new(EmbeddingDimension::D768);
        let bytes = bincode::serialize(&meta).unwrap();
        let restored: StoreMetadata = bincode::deserialize(&bytes).unwrap();
        assert_eq!(meta.schema_version, restored.schema_version);
        assert_eq!(meta.embedding_dimension, restored.embedding_dimension);
    }

    #[test]
    fn test_embedding_encoding() {
        let embedding = vec![0.5, -1.25, 3.0e-7, f32::MAX];
        let bytes = encode_embedding(&embedding);
        assert_eq!(bytes.len(), 16);
        assert_eq!(decode_embedding(&bytes).unwrap(), embedding);
    }

    #[test]
    fn test_decode_rejects_truncated_bytes() {
        let err = decode_embedding(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }
}
