//! Request and outcome types for the index lifecycle.

use crate::types::{CompositeKey, EntityType, Metadata, COURSE_ID, ORGANIZATION_ID};

/// Input for creating or updating the indexed form of one entity.
///
/// Built with the chaining helpers:
///
/// ```rust
/// use lessonindex::indexer::IndexRequest;
///
/// let request = IndexRequest::lesson("L1", "Photosynthesis converts light into chemical energy")
///     .organization("org-1")
///     .course("c-1")
///     .with_metadata("title", "Photosynthesis");
/// assert_eq!(request.key().as_str(), "lesson:L1");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRequest {
    /// Kind of source entity.
    pub entity_type: EntityType,

    /// Id of the source entity in the canonical content store.
    pub entity_id: String,

    /// Full text to embed. Only a prefix is kept for display.
    pub content: String,

    /// Scoping and descriptive metadata. Must carry `organizationId`.
    pub metadata: Metadata,

    /// Write version. When `None`, the index stamps one from its clock.
    ///
    /// See [`with_version`](Self::with_version) for the required units.
    pub version: Option<u64>,
}

impl IndexRequest {
    /// Creates a request with empty metadata.
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            version: None,
        }
    }

    /// Creates a request for a lesson.
    pub fn lesson(entity_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(EntityType::Lesson, entity_id, content)
    }

    /// Creates a request for a resource.
    pub fn resource(entity_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(EntityType::Resource, entity_id, content)
    }

    /// Sets the owning organization.
    pub fn organization(self, organization_id: impl Into<String>) -> Self {
        self.with_metadata(ORGANIZATION_ID, organization_id)
    }

    /// Sets the course.
    pub fn course(self, course_id: impl Into<String>) -> Self {
        self.with_metadata(COURSE_ID, course_id)
    }

    /// Adds a metadata entry, replacing any previous value for the key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets an explicit write version.
    ///
    /// # Units
    ///
    /// The version must be a Unix timestamp in **microseconds** (such as the
    /// source row's `updated_at`), never a revision counter. Calls without a
    /// version are stamped from the same microsecond clock, so a small counter
    /// like `1, 2, 3` is older than any clock-stamped write and is rejected as
    /// [`IndexOutcome::Stale`] until the record is deleted.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Composite key the request writes to.
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.entity_type, &self.entity_id)
    }
}

/// Result of an index or update call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The record was written.
    Written {
        /// Key written.
        key: CompositeKey,
        /// Version stamped on the record.
        version: u64,
        /// Whether an existing record was replaced.
        replaced: bool,
    },

    /// A newer edit is already indexed; nothing was written.
    Stale {
        /// Key targeted.
        key: CompositeKey,
        /// Version this call carried.
        version: u64,
        /// Version currently indexed.
        current_version: u64,
    },
}

impl IndexOutcome {
    /// Returns true if the record was written.
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    /// Returns true if the write lost to a newer edit.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    /// Key targeted by the call.
    pub fn key(&self) -> &CompositeKey {
        match self {
            Self::Written { key, .. } | Self::Stale { key, .. } => key,
        }
    }

    /// Version carried by the call.
    pub fn version(&self) -> u64 {
        match self {
            Self::Written { version, .. } | Self::Stale { version, .. } => *version,
        }
    }
}
