//! Capabilities the resolution layer consumes from the surrounding platform.
//!
//! Backends implement these traits per entity kind. The in-memory backend in
//! [`crate::storage::memory`] is the reference implementation.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntityKind};
use crate::error::StorageError;

/// A persisted entity, as returned by a backing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity id.
    pub id: EntityId,
    /// Owning tenant.
    pub tenant_id: EntityId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Name, or title for title-indexed kinds.
    pub name: String,
    /// Kind-specific type label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl EntityRecord {
    /// Creates a new record with a fresh id.
    #[must_use]
    pub fn new(
        tenant_id: EntityId,
        kind: EntityKind,
        name: impl Into<String>,
        subtype: Option<String>,
    ) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id,
            kind,
            name: name.into(),
            subtype,
            created_at: Utc::now(),
        }
    }
}

/// Lookup (and optionally creation) of entities by tenant and name.
///
/// # Safety Considerations
/// - Implementations are called concurrently from executor threads.
/// - `find_by_tenant_and_name` and `create` are not transactional with each other.
pub trait NamedEntityService: Send + Sync {
    /// Find an entity by exact name within a tenant.
    fn find_by_tenant_and_name(
        &self,
        tenant_id: EntityId,
        name: &str,
    ) -> Result<Option<EntityRecord>, StorageError>;

    /// Create a new entity under the tenant and return it with its assigned id.
    ///
    /// The default rejects creation; kinds without a creatable
    /// representation leave it that way.
    fn create(
        &self,
        tenant_id: EntityId,
        name: &str,
        subtype: Option<&str>,
    ) -> Result<EntityRecord, StorageError> {
        let _ = (tenant_id, subtype);
        Err(StorageError::Unsupported(format!("create '{name}'")))
    }
}

/// A page request for text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Maximum entries per page.
    pub limit: usize,
    /// Zero-based page index.
    pub page: usize,
    /// Text-search filter applied by the backend.
    pub text_search: String,
}

impl PageLink {
    /// First page of a search.
    #[must_use]
    pub fn first(limit: usize, text_search: impl Into<String>) -> Self {
        Self {
            limit,
            page: 0,
            text_search: text_search.into(),
        }
    }

    /// The page after this one.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            limit: self.limit,
            page: self.page + 1,
            text_search: self.text_search.clone(),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Whether another page follows.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// A page that is the last one.
    #[must_use]
    pub fn last(data: Vec<T>) -> Self {
        Self {
            data,
            has_next: false,
        }
    }
}

/// Paged title search, for kinds indexed by title rather than name.
///
/// The text filter is fuzzy (the backend decides how); callers must compare
/// titles themselves for an exact match.
pub trait TitleSearchService: Send + Sync {
    /// Fetch one page of entities whose title matches the page's text filter.
    fn search_by_tenant_and_title_page(
        &self,
        tenant_id: EntityId,
        page: &PageLink,
    ) -> Result<Page<EntityRecord>, StorageError>;
}

/// Everything the standard resolution strategies need from the platform.
///
/// Each field is the capability for one kind; the tenant id is the current
/// tenant on whose behalf lookups and creations are made.
#[derive(Clone)]
pub struct EntityServices {
    /// Current tenant.
    pub tenant_id: EntityId,
    /// Device lookup and creation.
    pub devices: Arc<dyn NamedEntityService>,
    /// Asset lookup and creation.
    pub assets: Arc<dyn NamedEntityService>,
    /// Customer lookup and creation.
    pub customers: Arc<dyn NamedEntityService>,
    /// Entity view lookup.
    pub entity_views: Arc<dyn NamedEntityService>,
    /// Dashboard title search.
    pub dashboards: Arc<dyn TitleSearchService>,
}

impl fmt::Debug for EntityServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityServices")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}
