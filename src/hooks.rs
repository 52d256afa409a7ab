//! Best-effort indexing hooks for content-mutation handlers.
//!
//! Saving a lesson must not fail because the index is unavailable. The
//! handlers that own those saves call [`ContentHooks`] after their own
//! write commits; every indexing error is logged and reported back as a
//! [`HookReport`], never returned as an `Err` and never panicking.
//!
//! Generation consumers use [`ContentHooks::grounding_context`], which
//! degrades to "no grounding" instead of failing the generation request.

use tracing::{debug, warn};

use crate::error::Result;
use crate::indexer::{IndexManager, IndexOutcome, IndexRequest};
use crate::retrieval::{RetrievalService, SearchResult};
use crate::search::SearchScope;
use crate::types::EntityType;

/// What a hook did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookReport {
    /// The index now reflects the mutation.
    Applied,

    /// Nothing needed doing (stale edit, or nothing indexed to delete).
    Skipped {
        /// Why nothing was written.
        reason: String,
    },

    /// Indexing failed; the error was logged.
    Failed {
        /// Rendered error.
        error: String,
    },
}

impl HookReport {
    /// Returns true if the index was changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Returns true if the hook failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Error-isolating wrapper around [`IndexManager`] and [`RetrievalService`].
///
/// # Example
///
/// ```rust
/// use lessonindex::{Config, ContentIndex, IndexRequest};
///
/// let index = ContentIndex::open_in_memory(Config::default())?;
/// let hooks = index.hooks();
///
/// // Missing organizationId: logged, reported, not propagated
/// let report = hooks.on_create(IndexRequest::lesson("L1", "text"));
/// assert!(report.is_failed());
/// # Ok::<(), lessonindex::IndexError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ContentHooks {
    indexer: IndexManager,
    retrieval: RetrievalService,
}

impl ContentHooks {
    /// Creates hooks over the given services.
    pub fn new(indexer: IndexManager, retrieval: RetrievalService) -> Self {
        Self { indexer, retrieval }
    }

    /// Call after a lesson or resource is created.
    pub fn on_create(&self, request: IndexRequest) -> HookReport {
        let (ty, id) = (request.entity_type, request.entity_id.clone());
        Self::report_write("create", ty, &id, self.indexer.index(request))
    }

    /// Call after a lesson or resource is edited.
    pub fn on_update(&self, request: IndexRequest) -> HookReport {
        let (ty, id) = (request.entity_type, request.entity_id.clone());
        Self::report_write("update", ty, &id, self.indexer.update(request))
    }

    /// Call after a lesson or resource is deleted.
    pub fn on_delete(&self, entity_id: &str, entity_type: Option<EntityType>) -> HookReport {
        match self.indexer.delete(entity_id, entity_type) {
            Ok(0) => HookReport::Skipped {
                reason: "not indexed".into(),
            },
            Ok(_) => HookReport::Applied,
            Err(e) => {
                warn!(
                    operation = "delete",
                    entity_type = ?entity_type,
                    entity_id,
                    error = %e,
                    "Index hook failed"
                );
                HookReport::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Search for grounding material, returning nothing on failure.
    pub fn grounding_context(
        &self,
        query: &str,
        scope: &SearchScope,
        top_k: usize,
    ) -> Vec<SearchResult> {
        match self.retrieval.search(query, scope, top_k) {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    organization_id = scope.organization_id(),
                    error = %e,
                    "Grounding search failed; continuing without context"
                );
                Vec::new()
            }
        }
    }

    fn report_write(
        operation: &'static str,
        entity_type: EntityType,
        entity_id: &str,
        result: Result<IndexOutcome>,
    ) -> HookReport {
        match result {
            Ok(IndexOutcome::Written { .. }) => HookReport::Applied,
            Ok(IndexOutcome::Stale {
                version,
                current_version,
                ..
            }) => {
                debug!(
                    operation,
                    %entity_type,
                    entity_id,
                    version,
                    current_version,
                    "Hook skipped stale edit"
                );
                HookReport::Skipped {
                    reason: format!(
                        "version {} is older than indexed version {}",
                        version, current_version
                    ),
                }
            }
            Err(e) => {
                warn!(operation, %entity_type, entity_id, error = %e, "Index hook failed");
                HookReport::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbeddingDimension};
    use crate::embedding::{EmbeddingService, HashingEmbedding};
    use crate::error::IndexError;
    use crate::storage::{MemoryStore, RecordStore};
    use crate::types::Embedding;
    use std::sync::Arc;

    struct DownEmbedding;

    impl EmbeddingService for DownEmbedding {
        fn embed(&self, _text: &str) -> Result<Embedding> {
            Err(IndexError::embedding("connection refused"))
        }

        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>> {
            Err(IndexError::embedding("connection refused"))
        }

        fn dimension(&self) -> usize {
            32
        }
    }

    fn hooks_with(embedder: Arc<dyn EmbeddingService>) -> ContentHooks {
        let config = Config::with_hashing_embeddings(EmbeddingDimension::Custom(32));
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new(32));
        ContentHooks::new(
            IndexManager::new(embedder.clone(), store.clone(), &config),
            RetrievalService::new(embedder, store, &config),
        )
    }

    #[test]
    fn test_create_update_delete_reports() {
        let hooks = hooks_with(Arc::new(HashingEmbedding::new(32)));

        assert!(hooks
            .on_create(IndexRequest::lesson("L1", "cells").organization("org-1"))
            .is_applied());
        assert!(hooks
            .on_update(IndexRequest::lesson("L1", "cells divide").organization("org-1"))
            .is_applied());
        assert!(hooks.on_delete("L1", Some(EntityType::Lesson)).is_applied());
        assert!(matches!(
            hooks.on_delete("L1", Some(EntityType::Lesson)),
            HookReport::Skipped { .. }
        ));
    }

    #[test]
    fn test_stale_update_is_skipped() {
        let hooks = hooks_with(Arc::new(HashingEmbedding::new(32)));
        hooks.on_create(
            IndexRequest::lesson("L1", "new")
                .organization("org-1")
                .with_version(10),
        );
        let report = hooks.on_update(
            IndexRequest::lesson("L1", "old")
                .organization("org-1")
                .with_version(9),
        );
        assert!(matches!(report, HookReport::Skipped { .. }));
    }

    #[test]
    fn test_provider_failure_is_contained() {
        let hooks = hooks_with(Arc::new(DownEmbedding));
        let report = hooks.on_create(IndexRequest::lesson("L1", "cells").organization("org-1"));
        match report {
            HookReport::Failed { error } => assert!(error.contains("connection refused")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_grounding_context_degrades_to_empty() {
        let hooks = hooks_with(Arc::new(DownEmbedding));
        let scope = SearchScope::organization("org-1").unwrap();
        assert!(hooks.grounding_context("energy", &scope, 3).is_empty());
    }
}
