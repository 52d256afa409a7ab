//! Embedding service abstractions.
//!
//! This module provides the trait and implementations for embedding generation.
//! Embeddings are dense vector representations of text used for semantic search.
//!
//! # Providers
//!
//! - [`HashingEmbedding`] - Deterministic local feature hashing (default)
//! - `HttpEmbedding` - OpenAI-compatible endpoint (requires `http-embeddings` feature)
//! - Any caller type implementing [`EmbeddingService`], injected through
//!   `ContentIndex::open_with_embedder`
//!
//! # Example
//!
//! ```rust
//! use lessonindex::embedding::{EmbeddingService, HashingEmbedding};
//!
//! let service = HashingEmbedding::new(384);
//! let vector = service.embed("Photosynthesis converts light").unwrap();
//! assert_eq!(vector.len(), 384);
//!
//! // Blank input is rejected before any provider work
//! assert!(service.embed("   ").is_err());
//! ```

pub mod hashing;
#[cfg(feature = "http-embeddings")]
pub mod http;

pub use hashing::HashingEmbedding;
#[cfg(feature = "http-embeddings")]
pub use http::HttpEmbedding;

use std::sync::Arc;

use crate::config::{Config, EmbeddingProvider};
use crate::error::{IndexError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of text.
///
/// This trait defines the contract for any embedding provider. Implementations
/// must be thread-safe (`Send + Sync`); the index shares one service between
/// the indexing and retrieval paths.
///
/// Services hold no per-call state, do not cache, and do not retry. Callers
/// that want retries wrap the service.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use lessonindex::embedding::{ensure_embeddable, EmbeddingService};
/// use lessonindex::{Embedding, Result};
///
/// struct MyEmbeddingService {
///     client: MyApiClient,
///     dimension: usize,
/// }
///
/// impl EmbeddingService for MyEmbeddingService {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         ensure_embeddable(text)?;
///         Ok(self.client.get_embedding(text)?)
///     }
///
///     fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
///         texts.iter().map(|t| self.embed(t)).collect()
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Returns
    ///
    /// A vector of f32 values with length equal to `dimension()`.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if `text` is empty or whitespace-only
    /// - `IndexError::Embedding` if the provider fails or returns an
    ///   unusable vector
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generates embeddings for multiple texts in a batch.
    ///
    /// # Returns
    ///
    /// A vector of embeddings in the same order as the input texts.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any text fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> usize;
}

impl<T: EmbeddingService + ?Sized> EmbeddingService for Arc<T> {
    fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Rejects text that has nothing to embed.
///
/// Providers call this before doing any work so that blank input is always a
/// validation error rather than a provider error.
pub fn ensure_embeddable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ValidationError::required_field("text").into());
    }
    Ok(())
}

/// Checks a provider's output against its declared dimension and rejects
/// non-finite values.
///
/// A wrong-length or NaN-bearing response is the provider's fault, so it is
/// reported as `IndexError::Embedding` rather than as a validation error.
pub(crate) fn check_provider_output(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(IndexError::embedding(format!(
            "provider returned {} dimensions, expected {}",
            embedding.len(),
            expected
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(IndexError::embedding("provider returned a non-finite value"));
    }
    Ok(())
}

/// Creates an embedding service based on the configuration.
///
/// # Errors
///
/// Returns an error if:
/// - The HTTP provider is requested but the `http-embeddings` feature is off
/// - The provider is `External` (the caller must pass its own service to
///   `ContentIndex::open_with_embedder`)
pub fn create_embedding_service(config: &Config) -> Result<Arc<dyn EmbeddingService>> {
    match &config.embedding_provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedding::new(config.dimension()))),

        #[cfg(feature = "http-embeddings")]
        EmbeddingProvider::Http {
            endpoint,
            model,
            api_key,
        } => {
            let service = HttpEmbedding::new(
                endpoint.clone(),
                model.clone(),
                config.dimension(),
                config.embedding_timeout,
            )
            .with_api_key(api_key.clone());
            Ok(Arc::new(service))
        }

        #[cfg(not(feature = "http-embeddings"))]
        EmbeddingProvider::Http { .. } => Err(IndexError::config(
            "HTTP embeddings require the 'http-embeddings' feature",
        )),

        EmbeddingProvider::External => Err(IndexError::config(
            "External embedding provider: pass the service to ContentIndex::open_with_embedder",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingDimension;

    #[test]
    fn test_ensure_embeddable() {
        assert!(ensure_embeddable("lesson").is_ok());
        assert!(ensure_embeddable("").unwrap_err().is_validation());
        assert!(ensure_embeddable(" \n\t").unwrap_err().is_validation());
    }

    #[test]
    fn test_check_provider_output() {
        assert!(check_provider_output(&[0.1, 0.2], 2).is_ok());
        assert!(check_provider_output(&[0.1], 2).unwrap_err().is_embedding());
        assert!(check_provider_output(&[f32::NAN, 0.2], 2)
            .unwrap_err()
            .is_embedding());
    }

    #[test]
    fn test_create_embedding_service_hashing() {
        let config = Config::with_hashing_embeddings(EmbeddingDimension::D768);
        let service = create_embedding_service(&config).unwrap();
        assert_eq!(service.dimension(), 768);
    }

    #[test]
    fn test_create_embedding_service_external_is_config_error() {
        let config = Config {
            embedding_provider: EmbeddingProvider::External,
            ..Default::default()
        };
        let err = create_embedding_service(&config).err().unwrap();
        assert!(matches!(err, IndexError::Config { .. }));
    }

    #[cfg(not(feature = "http-embeddings"))]
    #[test]
    fn test_create_embedding_service_http_without_feature() {
        let config = Config::with_http_embeddings(
            "http://localhost/v1/embeddings",
            "m",
            EmbeddingDimension::D384,
        );
        assert!(create_embedding_service(&config).is_err());
    }

    #[test]
    fn test_arc_service_delegates() {
        let service: Arc<dyn EmbeddingService> = Arc::new(HashingEmbedding::new(16));
        let wrapped = Arc::new(service);
        assert_eq!(wrapped.dimension(), 16);
        assert_eq!(wrapped.embed("energy").unwrap().len(), 16);
    }

    #[test]
    fn test_embedding_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EmbeddingService>();
        assert_send_sync::<HashingEmbedding>();
    }
}
