//! Core type definitions: entity identity, timestamps, metadata, cancellation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, ValidationError};

/// Embedding vector type.
pub type Embedding = Vec<f32>;

/// Open key→value metadata attached to an indexed record.
///
/// Ordered so that serialized rows and debug output are stable.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key carrying the tenant (organization) scope.
pub const ORGANIZATION_ID: &str = "organizationId";

/// Metadata key carrying the optional course scope.
pub const COURSE_ID: &str = "courseId";

/// Kind of source entity being indexed.
///
/// The type determines which scoping fields are meaningful and forms the
/// first half of the [`CompositeKey`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// A lesson inside a course.
    Lesson,
    /// A standalone learning resource (document, link, upload).
    Resource,
}

impl EntityType {
    /// Stable lowercase name used in composite keys.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Resource => "resource",
        }
    }

    /// All entity types, in key order.
    pub const ALL: [EntityType; 2] = [EntityType::Lesson, EntityType::Resource];
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(Self::Lesson),
            "resource" => Ok(Self::Resource),
            other => Err(ValidationError::invalid_field(
                "entity_type",
                format!("unknown entity type '{}'", other),
            )),
        }
    }
}

/// Unique identity of a record in the vector store: `<type>:<entity id>`.
///
/// At most one live record exists per key. The entity id may itself contain
/// `:`; only the first separator is structural.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Builds the key for an entity.
    pub fn new(entity_type: EntityType, entity_id: &str) -> Self {
        Self(format!("{}:{}", entity_type.as_str(), entity_id))
    }

    /// Returns the key as stored.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key back into its entity type and id.
    pub fn parts(&self) -> Result<(EntityType, &str), ValidationError> {
        let (ty, id) = self.0.split_once(':').ok_or_else(|| {
            ValidationError::invalid_field("key", format!("malformed composite key '{}'", self.0))
        })?;
        Ok((ty.parse()?, id))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CompositeKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = Self(s.to_string());
        key.parts()?;
        Ok(key)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    ///
    /// If the system clock is before the Unix epoch, returns epoch rather
    /// than panicking.
    #[inline]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Creates a timestamp from Unix milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[inline]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cooperative cancellation flag shared between a caller and an operation.
///
/// Cloning shares the flag. Operations check it at step boundaries (before
/// embedding, before writing) and periodically while scanning candidates.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(IndexError::Cancelled)` if cancelled.
    #[inline]
    pub fn check(&self) -> Result<(), IndexError> {
        if self.is_cancelled() {
            Err(IndexError::Cancelled)
        } else {
            Ok(())
        }
    }
}
