//! # lessonindex
//!
//! Semantic content index for an education platform: turns lesson and
//! resource text into embeddings, persists them with tenant-scoping
//! metadata, and answers nearest-neighbor queries so that AI content
//! generation can ground itself in an organization's own material.
//!
//! ## Quick Start
//!
//! ```rust
//! use lessonindex::{Config, ContentIndex, IndexRequest, SearchScope};
//!
//! let index = ContentIndex::open_in_memory(Config::default())?;
//!
//! index.index(
//!     IndexRequest::lesson("L1", "Photosynthesis converts light into chemical energy")
//!         .organization("org-1")
//!         .course("c-1"),
//! )?;
//! index.index(
//!     IndexRequest::lesson("L2", "Mitochondria produce ATP through respiration")
//!         .organization("org-1")
//!         .course("c-2"),
//! )?;
//!
//! let scope = SearchScope::organization("org-1")?;
//! let results = index.search("how do plants make energy from light", &scope, 2)?;
//! assert_eq!(results[0].entity_id, "L1");
//! # Ok::<(), lessonindex::IndexError>(())
//! ```
//!
//! ## Key Concepts
//!
//! ### Composite key
//!
//! Every indexed entity is stored under `<type>:<id>` (e.g. `lesson:42`).
//! There is at most one record per key; re-indexing replaces it whole.
//!
//! ### Scope
//!
//! A [`SearchScope`] is always bound to one organization. Course, entity
//! type, and other exact-match metadata constraints narrow it further. The
//! filter is applied before ranking, so out-of-scope records never displace
//! in-scope ones.
//!
//! ### Versions
//!
//! Writes carry a monotonic version stamped when the call enters the index.
//! The store rejects an upsert older than what it holds, so racing edits to
//! the same entity settle on the latest one.
//!
//! ### Embedding Providers
//!
//! - **Hashing** (default): deterministic local feature hashing, no network
//! - **Http**: OpenAI-compatible endpoint (requires `http-embeddings` feature)
//! - **External**: any [`EmbeddingService`](embedding::EmbeddingService) passed
//!   to [`ContentIndex::open_with_embedder`]
//!
//! ## Features
//!
//! - `http-embeddings` - Enable the OpenAI-compatible HTTP embedding client
//!
//! ## Thread Safety
//!
//! `ContentIndex` is `Send + Sync` and can be shared across threads using `Arc`.
//! The redb store uses MVCC for concurrent reads with exclusive write locking.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod db;
mod error;
mod hooks;
mod provider;
mod types;

pub mod embedding;
pub mod storage;

// Domain modules
pub mod indexer;
pub mod retrieval;
pub mod search;

/// Similarity scoring and top-k ranking.
pub mod vector;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main index interface
pub use db::ContentIndex;

// Configuration
pub use config::{
    Config, EmbeddingDimension, EmbeddingProvider, DEFAULT_MAX_DISPLAY_CHARS, DEFAULT_TOP_K,
};

// Error handling
pub use error::{IndexError, Result, StorageError, ValidationError};

// Core types
pub use types::{
    CancellationToken, CompositeKey, Embedding, EntityType, Metadata, Timestamp, COURSE_ID,
    ORGANIZATION_ID,
};

// Domain types
pub use hooks::{ContentHooks, HookReport};
pub use indexer::{IndexManager, IndexOutcome, IndexRequest};
pub use provider::GroundingProvider;
pub use retrieval::{RetrievalService, SearchResult};

// Search
pub use search::{MetadataFilter, SearchScope};

// Storage (for advanced users)
pub use storage::{IndexedRecord, RecordStore, StoreMetadata};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common usage.
///
/// ```rust
/// use lessonindex::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Config, EmbeddingDimension};
    pub use crate::db::ContentIndex;
    pub use crate::error::{IndexError, Result};
    pub use crate::indexer::{IndexOutcome, IndexRequest};
    pub use crate::retrieval::SearchResult;
    pub use crate::search::SearchScope;
    pub use crate::types::{EntityType, Timestamp};
}
