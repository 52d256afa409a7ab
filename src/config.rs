//! Configuration types for the content index.
//!
//! The [`Config`] struct controls index behavior including:
//! - Embedding provider (local hashing, HTTP endpoint, or external)
//! - Embedding dimension (384, 768, 1536, or custom)
//! - Display excerpt length and default result count
//! - Timeouts for the embedding call and async requests
//!
//! # Example
//! ```rust
//! use lessonindex::{Config, EmbeddingDimension};
//!
//! // Use defaults (hashing provider, 384 dimensions)
//! let config = Config::default();
//!
//! // Customize
//! let config = Config {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     max_display_chars: 500,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default number of search results when the caller does not choose.
pub const DEFAULT_TOP_K: usize = 5;

/// Default length of the stored display excerpt, in characters.
pub const DEFAULT_MAX_DISPLAY_CHARS: usize = 1000;

/// Content index configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use lessonindex::Config;
///
/// let config = Config {
///     default_top_k: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// How embeddings are generated.
    pub embedding_provider: EmbeddingProvider,

    /// Embedding vector dimension (must match provider output).
    pub embedding_dimension: EmbeddingDimension,

    /// Maximum number of characters kept as the record's display excerpt.
    pub max_display_chars: usize,

    /// Result count used by `search_default`.
    pub default_top_k: usize,

    /// Upper bound on a single embedding provider call.
    ///
    /// Applied by network-backed providers. Default: 10 seconds.
    pub embedding_timeout: Duration,

    /// Upper bound on a whole async request (embed + store).
    ///
    /// `None` disables the deadline. Default: 30 seconds.
    pub request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Hashing is the safe default - no network dependency required
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_dimension: EmbeddingDimension::D384,
            max_display_chars: DEFAULT_MAX_DISPLAY_CHARS,
            default_top_k: DEFAULT_TOP_K,
            embedding_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config for the local hashing embedder with the given dimension.
    pub fn with_hashing_embeddings(dimension: EmbeddingDimension) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Creates a Config for an OpenAI-compatible embedding endpoint.
    ///
    /// Requires the `http-embeddings` feature at open time.
    ///
    /// # Example
    /// ```rust
    /// use lessonindex::{Config, EmbeddingDimension};
    ///
    /// let config = Config::with_http_embeddings(
    ///     "https://api.openai.com/v1/embeddings",
    ///     "text-embedding-3-small",
    ///     EmbeddingDimension::D1536,
    /// );
    /// ```
    pub fn with_http_embeddings(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimension: EmbeddingDimension,
    ) -> Self {
        Self {
            embedding_provider: EmbeddingProvider::Http {
                endpoint: endpoint.into(),
                model: model.into(),
                api_key: None,
            },
            embedding_dimension: dimension,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `ContentIndex::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if:
    /// - `max_display_chars` or `default_top_k` is 0
    /// - Custom dimension is 0 or > 4096
    /// - `embedding_timeout` is zero
    /// - the HTTP provider has an empty endpoint or model
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_display_chars == 0 {
            return Err(ValidationError::invalid_field(
                "max_display_chars",
                "must be greater than 0",
            ));
        }

        if self.default_top_k == 0 {
            return Err(ValidationError::invalid_field(
                "default_top_k",
                "must be greater than 0",
            ));
        }

        if self.embedding_timeout.is_zero() {
            return Err(ValidationError::invalid_field(
                "embedding_timeout",
                "must be greater than 0",
            ));
        }

        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > 4096 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must not exceed 4096",
                ));
            }
        }

        if let EmbeddingProvider::Http {
            endpoint, model, ..
        } = &self.embedding_provider
        {
            if endpoint.trim().is_empty() {
                return Err(ValidationError::required_field("endpoint"));
            }
            if model.trim().is_empty() {
                return Err(ValidationError::required_field("model"));
            }
        }

        Ok(())
    }

    /// Returns the embedding dimension as a numeric value.
    pub fn dimension(&self) -> usize {
        self.embedding_dimension.size()
    }
}

/// Embedding provider configuration.
#[derive(Clone)]
pub enum EmbeddingProvider {
    /// Deterministic local feature-hashing embedder.
    ///
    /// No model and no network. Suitable for development, tests, and
    /// deployments without access to an embedding API.
    Hashing,

    /// OpenAI-compatible HTTP embedding endpoint.
    ///
    /// Requires the `http-embeddings` feature.
    Http {
        /// Full URL of the embeddings endpoint.
        endpoint: String,
        /// Model name sent with each request.
        model: String,
        /// Bearer token, if the endpoint requires one.
        api_key: Option<String>,
    },

    /// The caller injects its own [`EmbeddingService`](crate::embedding::EmbeddingService)
    /// via `ContentIndex::open_with_embedder`.
    External,
}

impl EmbeddingProvider {
    /// Returns true if this is the hashing provider.
    pub fn is_hashing(&self) -> bool {
        matches!(self, Self::Hashing)
    }

    /// Returns true if this is the HTTP provider.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Returns true if the embedder is injected by the caller.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::External)
    }
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashing => f.write_str("Hashing"),
            Self::Http {
                endpoint,
                model,
                api_key,
            } => f
                .debug_struct("Http")
                .field("endpoint", endpoint)
                .field("model", model)
                .field("api_key", &api_key.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::External => f.write_str("External"),
        }
    }
}

/// Embedding vector dimensions.
///
/// Standard dimensions are provided for common models. Use `Custom` for
/// other embedding services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (all-MiniLM-L6-v2).
    #[default]
    D384,

    /// 768 dimensions (bge-base-en-v1.5, BERT-base).
    D768,

    /// 1536 dimensions (OpenAI text-embedding-3-small, ada-002).
    D1536,

    /// Custom dimension for other embedding models.
    ///
    /// Must be between 1 and 4096.
    Custom(usize),
}

impl EmbeddingDimension {
    /// Returns the numeric size of this dimension.
    ///
    /// # Example
    /// ```rust
    /// use lessonindex::EmbeddingDimension;
    ///
    /// assert_eq!(EmbeddingDimension::D384.size(), 384);
    /// assert_eq!(EmbeddingDimension::D1536.size(), 1536);
    /// assert_eq!(EmbeddingDimension::Custom(64).size(), 64);
    /// ```
    #[inline]
    pub const fn size(&self) -> usize {
        match self {
            Self::D384 => 384,
            Self::D768 => 768,
            Self::D1536 => 1536,
            Self::Custom(n) => *n,
        }
    }
}
