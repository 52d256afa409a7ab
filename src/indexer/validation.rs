//! Input validation for index requests.
//!
//! ```text
//! IndexManager::index() / update()
//!     ├── validate_request()        ← identity, content, tenant
//!     ├── embedder.embed()          ← only reached if valid
//!     └── store.upsert()
//! ```

use crate::error::ValidationError;
use crate::indexer::types::IndexRequest;
use crate::types::ORGANIZATION_ID;

/// Validates an [`IndexRequest`] before any embedding work.
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `entity_id` | Non-blank |
/// | `content` | Non-blank |
/// | `metadata.organizationId` | Present and non-blank |
pub(crate) fn validate_request(request: &IndexRequest) -> Result<(), ValidationError> {
    if request.entity_id.trim().is_empty() {
        return Err(ValidationError::required_field("entity_id"));
    }

    if request.content.trim().is_empty() {
        return Err(ValidationError::required_field("content"));
    }

    match request.metadata.get(ORGANIZATION_ID) {
        Some(org) if !org.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::required_field(ORGANIZATION_ID)),
    }
}

/// Validates an entity id passed to delete.
pub(crate) fn validate_entity_id(entity_id: &str) -> Result<(), ValidationError> {
    if entity_id.trim().is_empty() {
        return Err(ValidationError::required_field("entity_id"));
    }
    Ok(())
}

/// Returns at most `max_chars` leading characters of `content`.
///
/// Cuts on a `char` boundary, never inside a UTF-8 sequence.
pub(crate) fn truncate_display(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => content[..end].to_string(),
        None => content.to_string(),
    }
}
