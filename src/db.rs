//! ContentIndex main struct and lifecycle operations.
//!
//! The [`ContentIndex`] struct is the primary interface for the semantic
//! content index. It provides methods for:
//!
//! - Opening and closing the index
//! - Indexing, updating, and removing lessons and resources
//! - Tenant-scoped similarity search
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lessonindex::{ContentIndex, Config, IndexRequest, SearchScope};
//!
//! // Open or create an index
//! let index = ContentIndex::open("./content.idx", Config::default())?;
//!
//! // Index a lesson after it is saved
//! index.index(
//!     IndexRequest::lesson("L1", "Photosynthesis converts light into chemical energy")
//!         .organization("org-1")
//!         .course("c-1"),
//! )?;
//!
//! // Ground a generation request in the organization's material
//! let scope = SearchScope::organization("org-1")?;
//! let results = index.search("how do plants make energy from light", &scope, 5)?;
//!
//! // Close when done
//! index.close()?;
//! ```
//!
//! # Thread Safety
//!
//! `ContentIndex` is `Send + Sync` and can be shared across threads using
//! `Arc`. The redb store uses MVCC for concurrent reads with exclusive write
//! locking.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::Config;
use crate::embedding::{create_embedding_service, EmbeddingService};
use crate::error::{IndexError, Result};
use crate::hooks::ContentHooks;
use crate::indexer::{IndexManager, IndexOutcome, IndexRequest};
use crate::retrieval::{RetrievalService, SearchResult};
use crate::search::SearchScope;
use crate::storage::{MemoryStore, RecordStore, RedbStore};
use crate::types::EntityType;

/// The content index handle.
///
/// Create an instance with [`ContentIndex::open()`] and close it with
/// [`ContentIndex::close()`].
///
/// # Ownership
///
/// `ContentIndex` owns one embedding service and one record store, shared
/// by its [`IndexManager`] and [`RetrievalService`]. Clones of those
/// services (and [`ContentHooks`]) keep the store alive after `close()`
/// until they are dropped too.
pub struct ContentIndex {
    /// Record store (redb or in-memory).
    store: Arc<dyn RecordStore>,

    /// Embedding service shared by indexing and retrieval.
    embedder: Arc<dyn EmbeddingService>,

    indexer: IndexManager,

    retrieval: RetrievalService,

    /// Configuration used to open this index.
    config: Config,
}

impl std::fmt::Debug for ContentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentIndex")
            .field("config", &self.config)
            .field("path", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl ContentIndex {
    /// Opens or creates a content index at the specified path.
    ///
    /// The embedding service is built from `config.embedding_provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration is invalid (see [`Config::validate`])
    /// - The provider cannot be built (feature missing, `External` provider)
    /// - The store file is corrupted or locked by another process
    /// - Schema version doesn't match
    /// - Embedding dimension doesn't match the existing store
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate().map_err(IndexError::from)?;
        let embedder = create_embedding_service(&config)?;
        Self::open_with_embedder(path, config, embedder)
    }

    /// Opens or creates an index that uses a caller-supplied embedding
    /// service.
    ///
    /// # Errors
    ///
    /// In addition to the [`open`](Self::open) errors, returns
    /// `IndexError::Config` if the service's dimension differs from
    /// `config.embedding_dimension`.
    #[instrument(skip(config, embedder), fields(path = %path.as_ref().display()))]
    pub fn open_with_embedder(
        path: impl AsRef<Path>,
        config: Config,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        config.validate().map_err(IndexError::from)?;
        Self::check_embedder(&config, embedder.as_ref())?;

        info!("Opening content index");

        let store = RedbStore::open(path, &config)?;
        let index = Self::from_parts(config, Arc::new(store), embedder);

        info!(
            dimension = index.config.dimension(),
            provider = ?index.config.embedding_provider,
            "Content index opened successfully"
        );
        Ok(index)
    }

    /// Creates an ephemeral index backed by [`MemoryStore`].
    ///
    /// # Errors
    ///
    /// Same configuration errors as [`open`](Self::open).
    pub fn open_in_memory(config: Config) -> Result<Self> {
        config.validate().map_err(IndexError::from)?;
        let embedder = create_embedding_service(&config)?;
        Self::open_in_memory_with_embedder(config, embedder)
    }

    /// Creates an ephemeral index with a caller-supplied embedding service.
    pub fn open_in_memory_with_embedder(
        config: Config,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self> {
        config.validate().map_err(IndexError::from)?;
        Self::check_embedder(&config, embedder.as_ref())?;

        let store = MemoryStore::new(config.dimension());
        Ok(Self::from_parts(config, Arc::new(store), embedder))
    }

    fn check_embedder(config: &Config, embedder: &dyn EmbeddingService) -> Result<()> {
        if embedder.dimension() != config.dimension() {
            return Err(IndexError::config(format!(
                "embedding service produces {} dimensions but the index is configured for {}",
                embedder.dimension(),
                config.dimension()
            )));
        }
        Ok(())
    }

    fn from_parts(
        config: Config,
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        let indexer = IndexManager::new(Arc::clone(&embedder), Arc::clone(&store), &config);
        let retrieval = RetrievalService::new(Arc::clone(&embedder), Arc::clone(&store), &config);
        Self {
            store,
            embedder,
            indexer,
            retrieval,
            config,
        }
    }

    /// Closes the index.
    ///
    /// Consumes the handle. redb commits are durable when they return, so
    /// there is nothing left to flush; this exists to make the end of the
    /// index's lifetime explicit.
    ///
    /// # Errors
    ///
    /// Currently always returns `Ok(())`.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing content index");
        drop(self);
        info!("Content index closed successfully");
        Ok(())
    }

    /// Returns the configuration used to open this index.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the embedding dimension configured for this index.
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Path of the backing file, or `None` for an in-memory index.
    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }

    /// Number of indexed records.
    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// The index lifecycle manager.
    #[inline]
    pub fn indexer(&self) -> &IndexManager {
        &self.indexer
    }

    /// The search service.
    #[inline]
    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    /// Best-effort hooks for content-mutation handlers.
    pub fn hooks(&self) -> ContentHooks {
        ContentHooks::new(self.indexer.clone(), self.retrieval.clone())
    }

    /// The embedding service.
    #[inline]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingService> {
        &self.embedder
    }

    // =========================================================================
    // Convenience delegates
    // =========================================================================

    /// See [`IndexManager::index`].
    pub fn index(&self, request: IndexRequest) -> Result<IndexOutcome> {
        self.indexer.index(request)
    }

    /// See [`IndexManager::update`].
    pub fn update(&self, request: IndexRequest) -> Result<IndexOutcome> {
        self.indexer.update(request)
    }

    /// See [`IndexManager::delete`].
    pub fn delete(&self, entity_id: &str, entity_type: Option<EntityType>) -> Result<usize> {
        self.indexer.delete(entity_id, entity_type)
    }

    /// See [`RetrievalService::search`].
    pub fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.retrieval.search(query, scope, top_k)
    }

    /// See [`RetrievalService::search_default`].
    pub fn search_default(&self, query: &str, scope: &SearchScope) -> Result<Vec<SearchResult>> {
        self.retrieval.search_default(query, scope)
    }
}

// ContentIndex is auto Send + Sync: the store and embedder are
// Arc<dyn Trait + Send + Sync> and Config is plain data.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingDimension, EmbeddingProvider};
    use crate::embedding::HashingEmbedding;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let index = ContentIndex::open(&path, Config::default()).unwrap();

        assert!(path.exists());
        assert_eq!(index.embedding_dimension(), 384);
        assert_eq!(index.path().unwrap(), path);

        index.close().unwrap();
    }

    #[test]
    fn test_open_existing_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        let index = ContentIndex::open(&path, Config::default()).unwrap();
        index.close().unwrap();

        let index = ContentIndex::open(&path, Config::default()).unwrap();
        assert_eq!(index.embedding_dimension(), 384);
        index.close().unwrap();
    }

    #[test]
    fn test_config_validation() {
        let dir = tempdir().unwrap();
        let invalid_config = Config {
            max_display_chars: 0,
            ..Default::default()
        };

        let result = ContentIndex::open(dir.path().join("test.idx"), invalid_config);
        assert!(result.unwrap_err().is_validation());
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        ContentIndex::open(&path, Config::default())
            .unwrap()
            .close()
            .unwrap();

        let result = ContentIndex::open(
            &path,
            Config {
                embedding_dimension: EmbeddingDimension::D768,
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_external_provider_requires_embedder() {
        let config = Config {
            embedding_provider: EmbeddingProvider::External,
            ..Default::default()
        };
        assert!(ContentIndex::open_in_memory(config.clone()).is_err());

        let index =
            ContentIndex::open_in_memory_with_embedder(config, Arc::new(HashingEmbedding::new(384)))
                .unwrap();
        assert!(index.path().is_none());
    }

    #[test]
    fn test_embedder_dimension_must_match_config() {
        let result = ContentIndex::open_in_memory_with_embedder(
            Config::default(),
            Arc::new(HashingEmbedding::new(128)),
        );
        assert!(matches!(result.unwrap_err(), IndexError::Config { .. }));
    }

    #[test]
    fn test_convenience_delegates() {
        let index = ContentIndex::open_in_memory(Config::default()).unwrap();
        index
            .index(IndexRequest::lesson("L1", "cells divide").organization("org-1"))
            .unwrap();
        assert_eq!(index.count().unwrap(), 1);

        let scope = SearchScope::organization("org-1").unwrap();
        assert_eq!(index.search_default("cells", &scope).unwrap().len(), 1);
        assert_eq!(index.delete("L1", None).unwrap(), 1);
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_content_index_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ContentIndex>();
    }
}
