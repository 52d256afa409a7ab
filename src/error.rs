//! Error types for the content index.
//!
//! The index uses a hierarchical error system:
//! - `IndexError` is the top-level error returned by all public APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//!
//! Storage failures are split by direction: anything raised while writing
//! (upsert, delete) surfaces as [`IndexError::StoreWrite`], anything raised
//! while reading (nearest-neighbor query, get, count) as
//! [`IndexError::StoreQuery`]. Callers that only want to know "was this my
//! fault" can use [`IndexError::is_validation`].
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use lessonindex::{ContentIndex, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let index = ContentIndex::open("./content.idx", Config::default())?;
//!     // ... operations that may fail ...
//!     index.close()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for content index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Top-level error enum for all content index operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Caller supplied invalid input (empty content, zero `top_k`, ...).
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The embedding provider failed or returned an unusable vector.
    #[error("Embedding provider error: {0}")]
    Embedding(String),

    /// The vector store failed while writing.
    #[error("Vector store write failed: {0}")]
    StoreWrite(StorageError),

    /// The vector store failed while reading.
    #[error("Vector store query failed: {0}")]
    StoreQuery(StorageError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// The operation was cancelled or ran past its deadline.
    #[error("Operation cancelled")]
    Cancelled,
}

impl IndexError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an embedding provider error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Wraps a storage error raised on the write path.
    pub fn write(err: impl Into<StorageError>) -> Self {
        Self::StoreWrite(err.into())
    }

    /// Wraps a storage error raised on the read path.
    pub fn query(err: impl Into<StorageError>) -> Self {
        Self::StoreQuery(err.into())
    }

    /// Returns true if this is an input validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an embedding provider error.
    pub fn is_embedding(&self) -> bool {
        matches!(self, Self::Embedding(_))
    }

    /// Returns true if this is a store write error.
    pub fn is_store_write(&self) -> bool {
        matches!(self, Self::StoreWrite(_))
    }

    /// Returns true if this is a store query error.
    pub fn is_store_query(&self) -> bool {
        matches!(self, Self::StoreQuery(_))
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database is locked by another process.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error from the redb storage engine.
    #[error("Storage engine error: {0}")]
    Redb(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// A lock guarding in-memory state was poisoned by a panicking thread.
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a redb error with the given message.
    pub fn redb(msg: impl Into<String>) -> Self {
        Self::Redb(msg.into())
    }
}

// Conversions from redb error types
impl From<redb::Error> for StorageError {
    fn from(err: redb::Error) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::DatabaseError> for StorageError {
    fn from(err: redb::DatabaseError) -> Self {
        StorageError::Redb(err.to_string())
    }
}

impl From<redb::TransactionError> for StorageError {
    fn from(err: redb::TransactionError) -> Self {
        StorageError::Transaction(err.to_string())
    }
}

impl From<redb::CommitError> for StorageError {
    fn from(err: redb::CommitError) -> Self {
        StorageError::Transaction(format!("Commit failed: {}", err))
    }
}

impl From<redb::TableError> for StorageError {
    fn from(err: redb::TableError) -> Self {
        StorageError::Redb(format!("Table error: {}", err))
    }
}

impl From<redb::StorageError> for StorageError {
    fn from(err: redb::StorageError) -> Self {
        StorageError::Redb(format!("Storage error: {}", err))
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the store's configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from store configuration.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }
}
