//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the entity
//! service traits. It is intended for embedded usage, tests, and as a
//! reference implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::entity::{EntityId, EntityKind};
use crate::error::StorageError;
use crate::storage::traits::{
    EntityRecord, EntityServices, NamedEntityService, Page, PageLink, TitleSearchService,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

#[derive(Debug, Default)]
struct ServiceState {
    by_id: HashMap<EntityId, EntityRecord>,
    by_name: HashMap<(EntityId, String), EntityId>,
    insertion_order: Vec<EntityId>,
    failure: Option<StorageError>,
}

impl ServiceState {
    fn check_failure(&self) -> Result<(), StorageError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn insert(&mut self, record: EntityRecord) -> Result<(), StorageError> {
        if self.by_id.contains_key(&record.id) {
            return Err(StorageError::DuplicateName(record.id.to_string()));
        }
        self.by_name
            .entry((record.tenant_id, record.name.clone()))
            .or_insert(record.id);
        self.insertion_order.push(record.id);
        self.by_id.insert(record.id, record);
        Ok(())
    }
}

/// Thread-safe in-memory entity service for one kind.
///
/// Name lookups are exact. Title search filters by a case-insensitive prefix
/// and pages through matches in insertion order. Call counters let tests
/// observe how often the backend was hit.
#[derive(Debug)]
pub struct InMemoryEntityService {
    kind: EntityKind,
    creatable: bool,
    state: RwLock<ServiceState>,
    lookups: AtomicUsize,
    creates: AtomicUsize,
    searches: AtomicUsize,
}

impl InMemoryEntityService {
    /// Create an empty service for `kind` that supports `create`.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            creatable: true,
            state: RwLock::new(ServiceState::default()),
            lookups: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            searches: AtomicUsize::new(0),
        }
    }

    /// Create an empty service that rejects `create`.
    #[must_use]
    pub fn read_only(kind: EntityKind) -> Self {
        Self {
            creatable: false,
            ..Self::new(kind)
        }
    }

    /// Kind of entities held by this service.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Seed an entity directly, bypassing `create`.
    ///
    /// Unlike `create`, duplicate names are accepted; name lookups keep
    /// returning the first one inserted.
    pub fn insert(&self, record: EntityRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("service.insert"))?;
        state.insert(record)
    }

    /// Seed an entity by name and return its id.
    pub fn seed(&self, tenant_id: EntityId, name: &str) -> Result<EntityId, StorageError> {
        let record = EntityRecord::new(tenant_id, self.kind, name, None);
        let id = record.id;
        self.insert(record)?;
        Ok(id)
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn set_failure(&self, err: Option<StorageError>) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("service.set_failure"))?;
        state.failure = err;
        Ok(())
    }

    /// Look up a stored record by id.
    pub fn get(&self, id: EntityId) -> Result<Option<EntityRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("service.get"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("service.len"))?;
        Ok(state.by_id.len())
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Number of `find_by_tenant_and_name` calls so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of successful `create` calls so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of title search pages served so far.
    #[must_use]
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl NamedEntityService for InMemoryEntityService {
    fn find_by_tenant_and_name(
        &self,
        tenant_id: EntityId,
        name: &str,
    ) -> Result<Option<EntityRecord>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().map_err(|_| lock_err("service.find_by_name"))?;
        state.check_failure()?;
        Ok(state
            .by_name
            .get(&(tenant_id, name.to_string()))
            .and_then(|id| state.by_id.get(id))
            .cloned())
    }

    fn create(
        &self,
        tenant_id: EntityId,
        name: &str,
        subtype: Option<&str>,
    ) -> Result<EntityRecord, StorageError> {
        if !self.creatable {
            return Err(StorageError::Unsupported(format!(
                "{} entities cannot be created",
                self.kind
            )));
        }
        let mut state = self.state.write().map_err(|_| lock_err("service.create"))?;
        state.check_failure()?;
        if state.by_name.contains_key(&(tenant_id, name.to_string())) {
            return Err(StorageError::DuplicateName(name.to_string()));
        }
        let record = EntityRecord::new(tenant_id, self.kind, name, subtype.map(str::to_string));
        state.insert(record.clone())?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}

impl TitleSearchService for InMemoryEntityService {
    fn search_by_tenant_and_title_page(
        &self,
        tenant_id: EntityId,
        page: &PageLink,
    ) -> Result<Page<EntityRecord>, StorageError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().map_err(|_| lock_err("service.search"))?;
        state.check_failure()?;

        let needle = normalize_key(&page.text_search);
        let limit = page.limit.max(1);
        let mut matches = state
            .insertion_order
            .iter()
            .filter_map(|id| state.by_id.get(id))
            .filter(|r| r.tenant_id == tenant_id && normalize_key(&r.name).starts_with(&needle))
            .skip(page.page.saturating_mul(limit));

        let data: Vec<EntityRecord> = matches.by_ref().take(limit).cloned().collect();
        let has_next = matches.next().is_some();
        Ok(Page { data, has_next })
    }
}

/// Convenience bundle of in-memory services, one per standard kind.
#[derive(Debug, Clone)]
pub struct InMemoryServices {
    /// Current tenant.
    pub tenant_id: EntityId,
    /// Device service.
    pub devices: Arc<InMemoryEntityService>,
    /// Asset service.
    pub assets: Arc<InMemoryEntityService>,
    /// Customer service.
    pub customers: Arc<InMemoryEntityService>,
    /// Entity view service (not creatable).
    pub entity_views: Arc<InMemoryEntityService>,
    /// Dashboard service (title search).
    pub dashboards: Arc<InMemoryEntityService>,
}

impl Default for InMemoryServices {
    fn default() -> Self {
        Self::new(EntityId::new())
    }
}

impl InMemoryServices {
    /// Create a new bundle for the given tenant.
    #[must_use]
    pub fn new(tenant_id: EntityId) -> Self {
        Self {
            tenant_id,
            devices: Arc::new(InMemoryEntityService::new(EntityKind::Device)),
            assets: Arc::new(InMemoryEntityService::new(EntityKind::Asset)),
            customers: Arc::new(InMemoryEntityService::new(EntityKind::Customer)),
            entity_views: Arc::new(InMemoryEntityService::read_only(EntityKind::EntityView)),
            dashboards: Arc::new(InMemoryEntityService::read_only(EntityKind::Dashboard)),
        }
    }

    /// The capability bundle consumed by the resolution strategies.
    #[must_use]
    pub fn services(&self) -> EntityServices {
        EntityServices {
            tenant_id: self.tenant_id,
            devices: Arc::clone(&self.devices) as Arc<dyn NamedEntityService>,
            assets: Arc::clone(&self.assets) as Arc<dyn NamedEntityService>,
            customers: Arc::clone(&self.customers) as Arc<dyn NamedEntityService>,
            entity_views: Arc::clone(&self.entity_views) as Arc<dyn NamedEntityService>,
            dashboards: Arc::clone(&self.dashboards) as Arc<dyn TitleSearchService>,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_scoped_by_tenant() {
        let service = InMemoryEntityService::new(EntityKind::Device);
        let tenant_a = EntityId::new();
        let tenant_b = EntityId::new();
        let id = service.seed(tenant_a, "sensor").unwrap();

        let found = service.find_by_tenant_and_name(tenant_a, "sensor").unwrap();
        assert_eq!(found.map(|r| r.id), Some(id));
        assert!(service.find_by_tenant_and_name(tenant_b, "sensor").unwrap().is_none());
        assert_eq!(service.lookup_count(), 2);
    }

    #[test]
    fn test_create_assigns_id_and_subtype() {
        let service = InMemoryEntityService::new(EntityKind::Asset);
        let tenant = EntityId::new();
        let record = service.create(tenant, "pump", Some("water")).unwrap();
        assert_eq!(record.kind, EntityKind::Asset);
        assert_eq!(record.subtype.as_deref(), Some("water"));
        assert_eq!(service.get(record.id).unwrap(), Some(record.clone()));
        assert_eq!(service.create_count(), 1);

        let err = service.create(tenant, "pump", None).unwrap_err();
        assert_eq!(err, StorageError::DuplicateName("pump".to_string()));
        assert_eq!(service.create_count(), 1);
    }

    #[test]
    fn test_read_only_rejects_create() {
        let service = InMemoryEntityService::read_only(EntityKind::EntityView);
        let err = service.create(EntityId::new(), "v", None).unwrap_err();
        assert!(matches!(err, StorageError::Unsupported(_)));
        assert!(service.is_empty().unwrap());
    }

    #[test]
    fn test_injected_failure() {
        let service = InMemoryEntityService::new(EntityKind::Device);
        service
            .set_failure(Some(StorageError::Unavailable("down".to_string())))
            .unwrap();
        let err = service.find_by_tenant_and_name(EntityId::new(), "x").unwrap_err();
        assert_eq!(err, StorageError::Unavailable("down".to_string()));

        service.set_failure(None).unwrap();
        assert!(service.find_by_tenant_and_name(EntityId::new(), "x").unwrap().is_none());
    }

    #[test]
    fn test_title_search_pages_prefix_matches() {
        let service = InMemoryEntityService::read_only(EntityKind::Dashboard);
        let tenant = EntityId::new();
        for i in 0..5 {
            service.seed(tenant, &format!("Main {i}")).unwrap();
        }
        service.seed(tenant, "Other").unwrap();

        let first = service
            .search_by_tenant_and_title_page(tenant, &PageLink::first(2, "main"))
            .unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_next);

        let third = service
            .search_by_tenant_and_title_page(tenant, &PageLink::first(2, "main").next_page().next_page())
            .unwrap();
        assert_eq!(third.data.len(), 1);
        assert!(!third.has_next);
        assert_eq!(third.data[0].name, "Main 4");
        assert_eq!(service.search_count(), 2);
    }
}
