//! # relnode - Named-entity resolution for relation action nodes
//!
//! relnode is the shared core of rule-engine nodes that act on "the entity
//! named X": given an incoming message, it builds a name from the message
//! metadata, resolves that name to an identity (optionally creating the
//! entity), and runs a relation action between the resolved entity and the
//! message originator.
//!
//! ## Core Concepts
//!
//! - **EntityDescriptor**: `(kind, name, subtype)` computed per message from patterns
//! - **IdentityCache**: single-flight, time-expiring map from descriptor to identity
//! - **ResolutionStrategy**: per-kind lookup, creation and title search
//! - **RelationActionPipeline**: resolve, assign direction, act, route
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relnode::{
//!     ActionRequest, ChannelSink, EntityKind, InMemoryServices, RelationActionConfig,
//!     RelationActionPipeline,
//! };
//!
//! let services = InMemoryServices::default();
//! let (sink, routes) = ChannelSink::channel();
//! let pipeline = RelationActionPipeline::builder()
//!     .config(RelationActionConfig::from_json_str(r#"{
//!         "entityType": "DEVICE",
//!         "entityNamePattern": "${deviceName}"
//!     }"#)?)
//!     .create_if_missing(true)
//!     .services(&services.services())
//!     .hook_fn(|req: &ActionRequest<'_>| Ok(req.handle.id.is_some()))
//!     .sink(sink)
//!     .build()?;
//!
//! pipeline.on_msg(msg);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entity;
pub mod error;
pub mod message;
pub mod time;

// Resolution and caching
pub mod cache;
pub mod resolution;
pub mod storage;
pub mod template;

// Execution
pub mod config;
pub mod pipeline;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use cache::{CacheSettings, CacheStats, IdentityCache};
pub use config::{NodeConfiguration, RelationActionConfig, DEFAULT_CACHE_EXPIRATION_SECS};
pub use entity::{
    Direction, EntityDescriptor, EntityHandle, EntityId, EntityKind, EntityRef, LinkEndpoints,
};
pub use error::{
    ActionError, ConfigError, ExecutionError, FailureCause, PipelineError, RelnodeError,
    RelnodeResult, ResolutionError, StorageError,
};
pub use message::{ChannelSink, Message, MessageSink, Metadata, Route, RouteReceiver};
pub use pipeline::{ActionHook, ActionRequest, PipelineBuilder, RelationActionPipeline, Stage};
pub use resolution::{
    NamedLookupStrategy, ResolutionStrategy, StrategyRegistry, TenantStrategy,
    TitleSearchStrategy, TITLE_SEARCH_PAGE_SIZE,
};
pub use runtime::{ExecutorConfig, Executors, IoExecutor};
pub use storage::{
    EntityRecord, EntityServices, InMemoryEntityService, InMemoryServices, NamedEntityService,
    Page, PageLink, TitleSearchService,
};
pub use template::{substitute, Substitution};
pub use time::{Clock, ManualClock, SystemClock};
