//! Per-kind resolution strategies.
//!
//! A [`ResolutionStrategy`] turns a descriptor into a handle, creating the
//! entity when asked to and when the kind allows it. Strategies are
//! registered once in a [`StrategyRegistry`], keyed by kind; a kind with no
//! registered strategy resolves to an absent handle without any backing call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::entity::{EntityDescriptor, EntityHandle, EntityId, EntityKind};
use crate::error::{ResolutionError, StorageError};
use crate::storage::{EntityServices, NamedEntityService, PageLink, TitleSearchService};

/// Page size used when scanning title search results.
pub const TITLE_SEARCH_PAGE_SIZE: usize = 200;

/// Lookup-or-create logic for one entity kind.
///
/// Implementations run on an executor thread and may block on I/O. A backing
/// failure is returned as an error; "not found" is an absent handle.
pub trait ResolutionStrategy: Send + Sync {
    /// Resolve `descriptor`, creating the entity if `create_if_missing` is set
    /// and the strategy supports creation.
    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        create_if_missing: bool,
    ) -> Result<EntityHandle, ResolutionError>;
}

fn storage_err(descriptor: &EntityDescriptor, source: StorageError) -> ResolutionError {
    ResolutionError::Storage {
        kind: descriptor.kind,
        name: descriptor.name.clone(),
        source,
    }
}

/// Look up by (tenant, name), optionally creating on miss.
///
/// Used for devices, assets and customers (creatable) and entity views
/// (lookup only).
pub struct NamedLookupStrategy {
    tenant_id: EntityId,
    service: Arc<dyn NamedEntityService>,
    creatable: bool,
    keep_subtype: bool,
}

impl NamedLookupStrategy {
    /// A strategy that creates missing entities when asked to.
    #[must_use]
    pub fn creatable(tenant_id: EntityId, service: Arc<dyn NamedEntityService>) -> Self {
        Self {
            tenant_id,
            service,
            creatable: true,
            keep_subtype: true,
        }
    }

    /// A strategy that never creates.
    #[must_use]
    pub fn lookup_only(tenant_id: EntityId, service: Arc<dyn NamedEntityService>) -> Self {
        Self {
            tenant_id,
            service,
            creatable: false,
            keep_subtype: true,
        }
    }

    /// Do not pass the subtype on create (customers have none).
    #[must_use]
    pub fn without_subtype(mut self) -> Self {
        self.keep_subtype = false;
        self
    }
}

impl ResolutionStrategy for NamedLookupStrategy {
    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        create_if_missing: bool,
    ) -> Result<EntityHandle, ResolutionError> {
        let existing = self
            .service
            .find_by_tenant_and_name(self.tenant_id, &descriptor.name)
            .map_err(|e| storage_err(descriptor, e))?;
        if let Some(record) = existing {
            return Ok(EntityHandle::found(descriptor.kind, record.id));
        }
        if !(create_if_missing && self.creatable) {
            return Ok(EntityHandle::absent(descriptor.kind));
        }

        let subtype = if self.keep_subtype {
            descriptor.subtype.as_deref()
        } else {
            None
        };
        let created = self
            .service
            .create(self.tenant_id, &descriptor.name, subtype)
            .map_err(|e| storage_err(descriptor, e))?;
        info!(
            kind = %descriptor.kind,
            name = %descriptor.name,
            id = %created.id,
            "created missing entity"
        );
        Ok(EntityHandle::found(descriptor.kind, created.id))
    }
}

/// Always resolves to the current tenant. Name and subtype are ignored.
#[derive(Debug, Clone, Copy)]
pub struct TenantStrategy {
    tenant_id: EntityId,
}

impl TenantStrategy {
    /// Resolve every descriptor to `tenant_id`.
    #[must_use]
    pub const fn new(tenant_id: EntityId) -> Self {
        Self { tenant_id }
    }
}

impl ResolutionStrategy for TenantStrategy {
    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        _create_if_missing: bool,
    ) -> Result<EntityHandle, ResolutionError> {
        Ok(EntityHandle::found(descriptor.kind, self.tenant_id))
    }
}

/// Scan paged title search results for an exact title match. Never creates.
///
/// Every page is scanned and the last exact match seen wins.
pub struct TitleSearchStrategy {
    tenant_id: EntityId,
    service: Arc<dyn TitleSearchService>,
    page_size: usize,
}

impl TitleSearchStrategy {
    /// Search `service` with the default page size.
    #[must_use]
    pub fn new(tenant_id: EntityId, service: Arc<dyn TitleSearchService>) -> Self {
        Self {
            tenant_id,
            service,
            page_size: TITLE_SEARCH_PAGE_SIZE,
        }
    }

    /// Override the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl ResolutionStrategy for TitleSearchStrategy {
    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        _create_if_missing: bool,
    ) -> Result<EntityHandle, ResolutionError> {
        let mut link = PageLink::first(self.page_size, descriptor.name.clone());
        let mut found = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .service
                .search_by_tenant_and_title_page(self.tenant_id, &link)
                .map_err(|e| storage_err(descriptor, e))?;
            pages += 1;
            for record in &page.data {
                if record.name == descriptor.name {
                    found = Some(record.id);
                }
            }
            if !page.has_next {
                break;
            }
            link = link.next_page();
        }
        debug!(kind = %descriptor.kind, name = %descriptor.name, pages, "title search finished");
        Ok(EntityHandle {
            kind: descriptor.kind,
            id: found,
        })
    }
}

/// Dispatch table from kind to strategy.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<EntityKind, Arc<dyn ResolutionStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry; every kind resolves to an absent handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registrations over the given services:
    /// devices, assets and customers are creatable; entity views are lookup
    /// only; the tenant resolves to itself; dashboards are found by title.
    #[must_use]
    pub fn standard(services: &EntityServices) -> Self {
        let tenant = services.tenant_id;
        Self::new()
            .with(
                EntityKind::Device,
                NamedLookupStrategy::creatable(tenant, Arc::clone(&services.devices)),
            )
            .with(
                EntityKind::Asset,
                NamedLookupStrategy::creatable(tenant, Arc::clone(&services.assets)),
            )
            .with(
                EntityKind::Customer,
                NamedLookupStrategy::creatable(tenant, Arc::clone(&services.customers))
                    .without_subtype(),
            )
            .with(
                EntityKind::EntityView,
                NamedLookupStrategy::lookup_only(tenant, Arc::clone(&services.entity_views)),
            )
            .with(EntityKind::Tenant, TenantStrategy::new(tenant))
            .with(
                EntityKind::Dashboard,
                TitleSearchStrategy::new(tenant, Arc::clone(&services.dashboards)),
            )
    }

    /// Register (or replace) the strategy for `kind`.
    #[must_use]
    pub fn with(mut self, kind: EntityKind, strategy: impl ResolutionStrategy + 'static) -> Self {
        self.register(kind, Arc::new(strategy));
        self
    }

    /// Register (or replace) the strategy for `kind`.
    pub fn register(&mut self, kind: EntityKind, strategy: Arc<dyn ResolutionStrategy>) {
        self.strategies.insert(kind, strategy);
    }

    /// Returns true if `kind` has a strategy.
    #[must_use]
    pub fn supports(&self, kind: EntityKind) -> bool {
        self.strategies.contains_key(&kind)
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.strategies.keys().collect();
        kinds.sort();
        f.debug_struct("StrategyRegistry").field("kinds", &kinds).finish()
    }
}

impl ResolutionStrategy for StrategyRegistry {
    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        create_if_missing: bool,
    ) -> Result<EntityHandle, ResolutionError> {
        match self.strategies.get(&descriptor.kind) {
            Some(strategy) => strategy.resolve(descriptor, create_if_missing),
            None => Ok(EntityHandle::absent(descriptor.kind)),
        }
    }
}
