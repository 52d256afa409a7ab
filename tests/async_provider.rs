//! Integration tests for the async GroundingProvider surface.
//!
//! Runs on the multi-thread tokio runtime so that blocking work and
//! deadlines interact the way they do inside a web service.

use std::sync::Arc;
use std::time::Duration;

use lessonindex::embedding::{EmbeddingService, HashingEmbedding};
use lessonindex::{
    Config, ContentIndex, Embedding, EmbeddingDimension, EmbeddingProvider, GroundingProvider,
    IndexRequest, Result, SearchScope,
};

const DIM: usize = 64;

/// Hashing embedder that sleeps before answering, like a slow provider.
struct SlowEmbedding {
    inner: HashingEmbedding,
    delay: Duration,
}

impl EmbeddingService for SlowEmbedding {
    fn embed(&self, text: &str) -> Result<Embedding> {
        std::thread::sleep(self.delay);
        self.inner.embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

fn slow_index(delay: Duration, request_timeout: Option<Duration>) -> Arc<ContentIndex> {
    let config = Config {
        embedding_provider: EmbeddingProvider::External,
        embedding_dimension: EmbeddingDimension::Custom(DIM),
        request_timeout,
        ..Default::default()
    };
    let embedder = SlowEmbedding {
        inner: HashingEmbedding::new(DIM),
        delay,
    };
    Arc::new(ContentIndex::open_in_memory_with_embedder(config, Arc::new(embedder)).unwrap())
}

fn scope() -> SearchScope {
    SearchScope::organization("org-1").unwrap()
}

// ============================================================================
// Round trip
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_async_index_search_delete() {
    let index = slow_index(Duration::ZERO, None);

    let outcome = GroundingProvider::index(
        &index,
        IndexRequest::lesson("L1", "Photosynthesis converts light into chemical energy")
            .organization("org-1"),
    )
    .await
    .unwrap();
    assert!(outcome.is_written());

    let results = GroundingProvider::search(&index, "photosynthesis light".into(), scope(), 5)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entity_id, "L1");

    let removed = GroundingProvider::delete(&index, "L1".into(), None)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(index.count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_async_writes() {
    let index = slow_index(Duration::from_millis(5), None);

    let mut handles = Vec::new();
    for i in 0..16 {
        let index = Arc::clone(&index);
        handles.push(tokio::spawn(async move {
            GroundingProvider::index(
                &index,
                IndexRequest::lesson(format!("L{}", i), format!("lesson about topic {}", i))
                    .organization("org-1"),
            )
            .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_written());
    }

    assert_eq!(index.count().unwrap(), 16);
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_cancels_and_writes_nothing() {
    let index = slow_index(Duration::from_millis(300), Some(Duration::from_millis(20)));

    let err = GroundingProvider::index(
        &index,
        IndexRequest::lesson("L1", "slow provider").organization("org-1"),
    )
    .await
    .unwrap_err();
    assert!(err.is_cancelled());

    // Let the blocking task reach its post-embed checkpoint.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(index.count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_timeout_is_cancelled() {
    let index = slow_index(Duration::from_millis(300), Some(Duration::from_millis(20)));

    let err = GroundingProvider::search(&index, "anything".into(), scope(), 3)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_future_cancels_write() {
    let index = slow_index(Duration::from_millis(200), None);

    let pending = GroundingProvider::index(
        &index,
        IndexRequest::lesson("L1", "abandoned request").organization("org-1"),
    );
    // Poll briefly so the blocking task starts, then drop the future.
    let _ = tokio::time::timeout(Duration::from_millis(20), pending).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(index.count().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation_errors_surface_unchanged() {
    let index = slow_index(Duration::ZERO, None);

    let err = GroundingProvider::search(&index, "   ".into(), scope(), 3)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
