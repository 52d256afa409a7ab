//! Scoped similarity search.
//!
//! [`RetrievalService`] turns a natural-language query into a ranked list of
//! indexed lessons and resources belonging to one organization.
//!
//! ```text
//! search(query, scope, top_k)
//!     ├── validate query / top_k
//!     ├── embedder.embed(query)
//!     └── store.nearest_neighbors(vector, scope.to_filter(), top_k)
//!             └── pre-filter → cosine score → top_k
//! ```

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::embedding::{check_provider_output, EmbeddingService};
use crate::error::{Result, ValidationError};
use crate::search::SearchScope;
use crate::storage::{RecordStore, ScoredRecord};
use crate::types::{CancellationToken, EntityType, Metadata};

/// One ranked hit. Not persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    /// Id of the source entity.
    pub entity_id: String,

    /// Kind of source entity.
    pub entity_type: EntityType,

    /// Cosine similarity mapped to `[0, 1]`; higher is more relevant.
    pub score: f32,

    /// Stored display excerpt.
    pub display_content: String,

    /// Stored metadata.
    pub metadata: Metadata,
}

impl From<ScoredRecord> for SearchResult {
    fn from(scored: ScoredRecord) -> Self {
        let ScoredRecord { record, score } = scored;
        Self {
            entity_id: record.entity_id,
            entity_type: record.entity_type,
            score,
            display_content: record.display_content,
            metadata: record.metadata,
        }
    }
}

/// Answers similarity queries against the shared store.
///
/// Cheap to clone; clones share the embedder and store.
#[derive(Clone)]
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn RecordStore>,
    default_top_k: usize,
}

impl RetrievalService {
    /// Creates a service over a shared embedder and store.
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn RecordStore>,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            store,
            default_top_k: config.default_top_k,
        }
    }

    /// Returns up to `top_k` results in `scope`, best first.
    ///
    /// An empty result is a valid answer. Ties in score are broken by most
    /// recently indexed first.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if `query` is blank or `top_k == 0`
    /// - `IndexError::Embedding` if the query cannot be embedded
    /// - `IndexError::StoreQuery` if the store fails
    ///
    /// # Example
    ///
    /// ```rust
    /// use lessonindex::{Config, ContentIndex, IndexRequest, SearchScope};
    ///
    /// let index = ContentIndex::open_in_memory(Config::default())?;
    /// index.index(
    ///     IndexRequest::lesson("L1", "Photosynthesis converts light into chemical energy")
    ///         .organization("org-1"),
    /// )?;
    ///
    /// let scope = SearchScope::organization("org-1")?;
    /// let results = index.search("photosynthesis and light", &scope, 3)?;
    /// assert_eq!(results[0].entity_id, "L1");
    /// # Ok::<(), lessonindex::IndexError>(())
    /// ```
    pub fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.search_with_cancel(query, scope, top_k, &CancellationToken::new())
    }

    /// [`search`](Self::search) with the configured default result count.
    pub fn search_default(&self, query: &str, scope: &SearchScope) -> Result<Vec<SearchResult>> {
        self.search(query, scope, self.default_top_k)
    }

    /// [`search`](Self::search) with cooperative cancellation.
    #[instrument(
        skip(self, query, scope, cancel),
        fields(organization_id = %scope.organization_id())
    )]
    pub fn search_with_cancel(
        &self,
        query: &str,
        scope: &SearchScope,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ValidationError::required_field("query").into());
        }
        if top_k == 0 {
            return Err(ValidationError::invalid_field("top_k", "must be greater than 0").into());
        }
        cancel.check()?;

        let vector = self.embedder.embed(query)?;
        check_provider_output(&vector, self.store.dimension())?;

        let neighbors = self
            .store
            .nearest_neighbors(&vector, &scope.to_filter(), top_k, cancel)?;

        let results: Vec<SearchResult> = neighbors.into_iter().map(SearchResult::from).collect();
        debug!(results = results.len(), "Search complete");
        Ok(results)
    }

    /// Result count used by [`search_default`](Self::search_default).
    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }
}

impl std::fmt::Debug for RetrievalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalService")
            .field("dimension", &self.store.dimension())
            .field("default_top_k", &self.default_top_k)
            .finish_non_exhaustive()
    }
}
