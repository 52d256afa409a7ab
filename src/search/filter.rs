//! Scope filtering for similarity queries.
//!
//! Two layers:
//!
//! - [`MetadataFilter`] is what the store understands: an exact-match
//!   conjunction over metadata keys plus an optional entity type. It is
//!   applied as a **pre-filter**, before scoring, so a small `top_k` can never
//!   be filled by out-of-scope records.
//! - [`SearchScope`] is what retrieval callers build. It cannot exist without
//!   an organization id, which closes the cross-tenant leak a forgotten
//!   filter would otherwise open.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::storage::IndexedRecord;
use crate::types::{EntityType, COURSE_ID, ORGANIZATION_ID};

/// Exact-match filter over record metadata.
///
/// An empty filter matches every record. Each constraint must equal the
/// record's value for that key; a record missing the key does not match.
///
/// # Example
///
/// ```rust
/// use lessonindex::{EntityType, MetadataFilter};
///
/// let filter = MetadataFilter::new()
///     .with("organizationId", "org-1")
///     .with("courseId", "c-1")
///     .with_entity_type(EntityType::Lesson);
/// assert_eq!(filter.get("organizationId"), Some("org-1"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    equals: BTreeMap<String, String>,
    entity_type: Option<EntityType>,
}

impl MetadataFilter {
    /// Creates a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match constraint on a metadata key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    /// Restricts results to one entity type.
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Returns the required value for a metadata key, if constrained.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.equals.get(key).map(String::as_str)
    }

    /// Returns the required organization id, if constrained.
    ///
    /// Stores use this to read candidates from their by-organization index.
    pub fn organization_id(&self) -> Option<&str> {
        self.get(ORGANIZATION_ID)
    }

    /// Returns the entity type constraint.
    pub fn entity_type(&self) -> Option<EntityType> {
        self.entity_type
    }

    /// Returns true if the filter has no constraints.
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty() && self.entity_type.is_none()
    }

    /// Returns `true` if the record satisfies every constraint.
    pub fn matches(&self, record: &IndexedRecord) -> bool {
        if let Some(ty) = self.entity_type {
            if record.entity_type != ty {
                return false;
            }
        }

        self.equals
            .iter()
            .all(|(key, want)| record.metadata.get(key) == Some(want))
    }
}

/// Tenant-scoped search scope.
///
/// Always carries an organization id; optionally narrows to a course,
/// an entity type, and any other exact-match metadata.
///
/// ```rust
/// use lessonindex::{EntityType, SearchScope};
///
/// let scope = SearchScope::organization("org-1")?
///     .course("c-1")?
///     .entity_type(EntityType::Lesson);
/// assert_eq!(scope.organization_id(), "org-1");
/// # Ok::<(), lessonindex::ValidationError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchScope {
    organization_id: String,
    course_id: Option<String>,
    entity_type: Option<EntityType>,
    extra: BTreeMap<String, String>,
}

impl SearchScope {
    /// Creates a scope for one organization.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::RequiredField` if the id is empty or blank.
    pub fn organization(organization_id: impl Into<String>) -> Result<Self, ValidationError> {
        let organization_id = organization_id.into();
        if organization_id.trim().is_empty() {
            return Err(ValidationError::required_field(ORGANIZATION_ID));
        }
        Ok(Self {
            organization_id,
            course_id: None,
            entity_type: None,
            extra: BTreeMap::new(),
        })
    }

    /// Narrows the scope to one course.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::RequiredField` if the id is empty or blank.
    pub fn course(mut self, course_id: impl Into<String>) -> Result<Self, ValidationError> {
        let course_id = course_id.into();
        if course_id.trim().is_empty() {
            return Err(ValidationError::required_field(COURSE_ID));
        }
        self.course_id = Some(course_id);
        Ok(self)
    }

    /// Narrows the scope to one entity type.
    pub fn entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    /// Adds another exact-match metadata constraint.
    ///
    /// Constraints on `organizationId` or `courseId` are ignored here; use
    /// the dedicated constructors so the tenant cannot be swapped out.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key != ORGANIZATION_ID && key != COURSE_ID {
            self.extra.insert(key, value.into());
        }
        self
    }

    /// The tenant this scope is bound to.
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    /// The course constraint, if any.
    pub fn course_id(&self) -> Option<&str> {
        self.course_id.as_deref()
    }

    /// Lowers the scope into the store-level filter.
    pub fn to_filter(&self) -> MetadataFilter {
        let mut filter = MetadataFilter::new().with(ORGANIZATION_ID, self.organization_id.clone());
        if let Some(course) = &self.course_id {
            filter = filter.with(COURSE_ID, course.clone());
        }
        for (key, value) in &self.extra {
            filter = filter.with(key.clone(), value.clone());
        }
        if let Some(ty) = self.entity_type {
            filter = filter.with_entity_type(ty);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    /// Helper to create a minimal test record.
    fn test_record(org: &str, course: Option<&str>, ty: EntityType) -> IndexedRecord {
        let mut metadata = Metadata::new();
        metadata.insert(ORGANIZATION_ID.into(), org.into());
        if let Some(c) = course {
            metadata.insert(COURSE_ID.into(), c.into());
        }
        metadata.insert("title".into(), "Intro".into());
        IndexedRecord::new(ty, "e1", vec![0.1; 4], "content".into(), metadata, 1)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = MetadataFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&test_record("org-1", None, EntityType::Lesson)));
    }

    #[test]
    fn test_organization_filter() {
        let filter = MetadataFilter::new().with(ORGANIZATION_ID, "org-1");
        assert!(filter.matches(&test_record("org-1", None, EntityType::Lesson)));
        assert!(!filter.matches(&test_record("org-2", None, EntityType::Lesson)));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        let filter = MetadataFilter::new().with(COURSE_ID, "c-1");
        assert!(!filter.matches(&test_record("org-1", None, EntityType::Lesson)));
    }

    #[test]
    fn test_entity_type_filter() {
        let filter = MetadataFilter::new().with_entity_type(EntityType::Resource);
        assert!(!filter.matches(&test_record("org-1", None, EntityType::Lesson)));
        assert!(filter.matches(&test_record("org-1", None, EntityType::Resource)));
    }

    #[test]
    fn test_combined_filters() {
        let filter = MetadataFilter::new()
            .with(ORGANIZATION_ID, "org-1")
            .with(COURSE_ID, "c-1")
            .with("title", "Intro")
            .with_entity_type(EntityType::Lesson);

        assert!(filter.matches(&test_record("org-1", Some("c-1"), EntityType::Lesson)));
        assert!(!filter.matches(&test_record("org-1", Some("c-2"), EntityType::Lesson)));
    }

    #[test]
    fn test_scope_requires_organization() {
        assert!(SearchScope::organization("").is_err());
        assert!(SearchScope::organization("   ").is_err());
        assert!(SearchScope::organization("org-1").is_ok());
    }

    #[test]
    fn test_scope_rejects_blank_course() {
        let scope = SearchScope::organization("org-1").unwrap();
        assert!(scope.clone().course("").is_err());
        assert!(scope.clone().course(" \t").is_err());
        assert_eq!(scope.course("c-1").unwrap().course_id(), Some("c-1"));
    }

    #[test]
    fn test_scope_lowers_to_filter() {
        let scope = SearchScope::organization("org-1")
            .unwrap()
            .course("c-1")
            .unwrap()
            .entity_type(EntityType::Lesson)
            .with("type", "video");
        let filter = scope.to_filter();

        assert_eq!(filter.organization_id(), Some("org-1"));
        assert_eq!(filter.get(COURSE_ID), Some("c-1"));
        assert_eq!(filter.get("type"), Some("video"));
        assert_eq!(filter.entity_type(), Some(EntityType::Lesson));
    }

    #[test]
    fn test_scope_cannot_override_tenant() {
        let scope = SearchScope::organization("org-1")
            .unwrap()
            .with(ORGANIZATION_ID, "org-2");
        assert_eq!(scope.to_filter().organization_id(), Some("org-1"));
    }
}
