//! Async access for tokio-based services.
//!
//! The index itself is synchronous: embedding calls block and redb is a
//! blocking store. [`GroundingProvider`] moves each call onto tokio's
//! blocking pool, bounds it by `Config::request_timeout`, and wires a
//! [`CancellationToken`] to the caller's future so that dropping the future
//! (or hitting the deadline) stops the work at its next checkpoint.
//!
//! A call that is past its last checkpoint when cancelled still completes
//! its write; it is never left half-applied.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::db::ContentIndex;
use crate::error::{IndexError, Result};
use crate::indexer::{IndexOutcome, IndexRequest};
use crate::retrieval::SearchResult;
use crate::search::SearchScope;
use crate::types::{CancellationToken, EntityType};

/// Async interface to the content index.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use lessonindex::{Config, ContentIndex, GroundingProvider, SearchScope};
///
/// let index = Arc::new(ContentIndex::open("./content.idx", Config::default())?);
/// let scope = SearchScope::organization("org-1")?;
/// let results = index.search("plant energy".into(), scope, 5).await?;
/// ```
#[async_trait]
pub trait GroundingProvider: Send + Sync {
    /// Async [`IndexManager::index`](crate::indexer::IndexManager::index).
    async fn index(&self, request: IndexRequest) -> Result<IndexOutcome>;

    /// Async [`IndexManager::update`](crate::indexer::IndexManager::update).
    async fn update(&self, request: IndexRequest) -> Result<IndexOutcome>;

    /// Async [`IndexManager::delete`](crate::indexer::IndexManager::delete).
    async fn delete(&self, entity_id: String, entity_type: Option<EntityType>) -> Result<usize>;

    /// Async [`RetrievalService::search`](crate::retrieval::RetrievalService::search).
    async fn search(
        &self,
        query: String,
        scope: SearchScope,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}

/// Cancels its token when dropped.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Runs `f` on the blocking pool under the configured deadline.
async fn run_blocking<T, F>(index: &Arc<ContentIndex>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&ContentIndex, &CancellationToken) -> Result<T> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let _guard = CancelOnDrop(cancel.clone());

    let deadline = index.config().request_timeout;
    let index = Arc::clone(index);
    let token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || f(&*index, &token));

    let joined = match deadline {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                warn!(timeout_ms = limit.as_millis() as u64, "Index request timed out");
                return Err(IndexError::Cancelled);
            }
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(IndexError::Cancelled),
    }
}

#[async_trait]
impl GroundingProvider for Arc<ContentIndex> {
    async fn index(&self, request: IndexRequest) -> Result<IndexOutcome> {
        run_blocking(self, move |index, cancel| {
            index.indexer().index_with_cancel(request, cancel)
        })
        .await
    }

    async fn update(&self, request: IndexRequest) -> Result<IndexOutcome> {
        run_blocking(self, move |index, cancel| {
            index.indexer().update_with_cancel(request, cancel)
        })
        .await
    }

    async fn delete(&self, entity_id: String, entity_type: Option<EntityType>) -> Result<usize> {
        run_blocking(self, move |index, cancel| {
            cancel.check()?;
            index.indexer().delete(&entity_id, entity_type)
        })
        .await
    }

    async fn search(
        &self,
        query: String,
        scope: SearchScope,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        run_blocking(self, move |index, cancel| {
            index
                .retrieval()
                .search_with_cancel(&query, &scope, top_k, cancel)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EmbeddingDimension};

    fn index() -> Arc<ContentIndex> {
        let config = Config::with_hashing_embeddings(EmbeddingDimension::Custom(64));
        Arc::new(ContentIndex::open_in_memory(config).unwrap())
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let index = index();
        let outcome = GroundingProvider::index(
            &index,
            IndexRequest::lesson("L1", "Photosynthesis converts light").organization("org-1"),
        )
        .await
        .unwrap();
        assert!(outcome.is_written());

        let scope = SearchScope::organization("org-1").unwrap();
        let results = GroundingProvider::search(&index, "photosynthesis light".into(), scope, 3)
            .await
            .unwrap();
        assert_eq!(results[0].entity_id, "L1");

        let removed = GroundingProvider::delete(&index, "L1".into(), None)
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_async_errors_propagate() {
        let index = index();
        let err = GroundingProvider::update(&index, IndexRequest::lesson("L1", "no org"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_cancel_on_drop() {
        let token = CancellationToken::new();
        drop(CancelOnDrop(token.clone()));
        assert!(token.is_cancelled());
    }
}
