//! Search scoping for similarity queries.
//!
//! This module provides the store-level metadata filter and the
//! tenant-bound search scope that retrieval callers construct.

mod filter;

pub use filter::{MetadataFilter, SearchScope};
