//! The relation action pipeline.
//!
//! For every message the pipeline walks the same state machine:
//!
//! ```text
//! RECEIVED -> DESCRIPTOR_BUILT -> RESOLVING -> RESOLVED -> DIRECTING
//!          -> ACTION_RUNNING -> ACTION_DONE -> ROUTED
//! ```
//!
//! The descriptor is built on the calling thread (pure substitution). The
//! cache lookup runs on the resolve executor; only after it succeeds is the
//! action hook dispatched to the action executor. Whatever happens, the
//! message ends up routed exactly once, to success or failure.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::cache::{CacheSettings, IdentityCache};
use crate::config::RelationActionConfig;
use crate::entity::{EntityDescriptor, EntityHandle, LinkEndpoints};
use crate::error::{
    ActionError, ConfigError, FailureCause, PipelineError, RelnodeResult, ResolutionError,
};
use crate::message::{Message, MessageSink};
use crate::resolution::{ResolutionStrategy, StrategyRegistry};
use crate::runtime::{Executors, IoExecutor};
use crate::storage::EntityServices;
use crate::template::{substitute, Substitution};
use crate::time::Clock;

/// Processing states of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Accepted by `on_msg`.
    Received,
    /// Patterns substituted.
    DescriptorBuilt,
    /// Waiting on the identity cache.
    Resolving,
    /// An identity was returned.
    Resolved,
    /// Assigning link endpoints.
    Directing,
    /// The action hook is running.
    ActionRunning,
    /// The action hook returned.
    ActionDone,
    /// Handed to the sink.
    Routed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::DescriptorBuilt => "descriptor built",
            Self::Resolving => "resolving",
            Self::Resolved => "resolved",
            Self::Directing => "directing",
            Self::ActionRunning => "action",
            Self::ActionDone => "action done",
            Self::Routed => "routed",
        };
        f.write_str(s)
    }
}

/// Everything an action hook gets to see.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest<'a> {
    /// The triggering message.
    pub message: &'a Message,
    /// The descriptor that was resolved.
    pub descriptor: &'a EntityDescriptor,
    /// The resolved handle; its id is always present.
    pub handle: EntityHandle,
    /// Link ends after direction assignment.
    pub endpoints: LinkEndpoints,
}

/// The domain-specific mutation a concrete node performs once the entity is
/// resolved (for example creating or removing a relation).
///
/// `Ok(true)` routes the message to success, `Ok(false)` to failure without
/// an error, and `Err` to failure carrying the error.
pub trait ActionHook: Send + Sync {
    /// Perform the action.
    fn perform_action(&self, request: &ActionRequest<'_>) -> Result<bool, ActionError>;
}

impl<F> ActionHook for F
where
    F: Fn(&ActionRequest<'_>) -> Result<bool, ActionError> + Send + Sync,
{
    fn perform_action(&self, request: &ActionRequest<'_>) -> Result<bool, ActionError> {
        self(request)
    }
}

struct PipelineInner {
    config: RelationActionConfig,
    create_if_missing: bool,
    cache: IdentityCache,
    hook: Arc<dyn ActionHook>,
    sink: Arc<dyn MessageSink>,
    executors: Executors,
    substitution: Substitution,
}

/// Resolves the configured entity for each message, runs the action hook,
/// and routes the message by outcome.
///
/// # Example
/// ```rust,ignore
/// let pipeline = RelationActionPipeline::builder()
///     .config(RelationActionConfig::new(EntityKind::Asset, "${building}"))
///     .create_if_missing(true)
///     .services(&services)
///     .hook(|req: &ActionRequest<'_>| relations.link(req.endpoints))
///     .sink(sink)
///     .build()?;
/// pipeline.on_msg(msg);
/// ```
#[derive(Clone)]
pub struct RelationActionPipeline {
    inner: Arc<PipelineInner>,
}

impl RelationActionPipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The node configuration.
    #[must_use]
    pub fn config(&self) -> &RelationActionConfig {
        &self.inner.config
    }

    /// Whether missing entities are created.
    #[must_use]
    pub fn create_if_missing(&self) -> bool {
        self.inner.create_if_missing
    }

    /// The identity cache owned by this pipeline.
    #[must_use]
    pub fn cache(&self) -> &IdentityCache {
        &self.inner.cache
    }

    /// Build the descriptor for `msg` from the configured patterns.
    #[must_use]
    pub fn build_descriptor(&self, msg: &Message) -> EntityDescriptor {
        self.inner.build_descriptor(msg)
    }

    /// Process a message without blocking the caller. The message is routed
    /// to the sink once processing completes.
    pub fn on_msg(&self, msg: Message) {
        debug!(msg_id = %msg.id, stage = %Stage::Received, "message received");
        let descriptor = self.inner.build_descriptor(&msg);
        debug!(
            msg_id = %msg.id,
            stage = %Stage::DescriptorBuilt,
            descriptor = %descriptor,
            "descriptor built"
        );
        let inner = Arc::clone(&self.inner);
        let job_descriptor = descriptor.clone();
        self.inner.dispatch(
            &self.inner.executors.resolve,
            Stage::Resolving,
            &descriptor,
            msg,
            move |msg| inner.resolve_stage(msg, job_descriptor),
        );
    }

    /// Tear down: drop every cached identity.
    pub fn destroy(&self) {
        self.inner.cache.invalidate_all();
    }
}

impl fmt::Debug for RelationActionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationActionPipeline")
            .field("config", &self.inner.config)
            .field("create_if_missing", &self.inner.create_if_missing)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl PipelineInner {
    fn build_descriptor(&self, msg: &Message) -> EntityDescriptor {
        let name = (self.substitution)(&self.config.entity_name_pattern, &msg.metadata);
        let subtype = self
            .config
            .entity_type_pattern
            .as_deref()
            .map(|pattern| (self.substitution)(pattern, &msg.metadata));
        EntityDescriptor {
            name,
            subtype,
            kind: self.config.entity_type,
        }
    }

    fn error(&self, stage: Stage, descriptor: &EntityDescriptor, cause: FailureCause) -> PipelineError {
        PipelineError {
            stage,
            kind: descriptor.kind,
            name: descriptor.name.clone(),
            direction: self.config.direction,
            cause,
        }
    }

    /// Hand `msg` to `f` on `executor`. If the executor refuses the job the
    /// message is routed to failure here instead.
    fn dispatch<F>(
        &self,
        executor: &IoExecutor,
        stage: Stage,
        descriptor: &EntityDescriptor,
        msg: Message,
        f: F,
    ) where
        F: FnOnce(Message) + Send + 'static,
    {
        let parked = Arc::new(Mutex::new(Some(msg)));
        let job_parked = Arc::clone(&parked);
        let submitted = executor.spawn(move || {
            let msg = job_parked.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(msg) = msg {
                f(msg);
            }
        });
        if let Err(err) = submitted {
            let msg = parked.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(msg) = msg {
                self.route_failure(msg, Some(self.error(stage, descriptor, err.into())));
            }
        }
    }

    fn resolve_stage(self: &Arc<Self>, msg: Message, descriptor: EntityDescriptor) {
        debug!(msg_id = %msg.id, stage = %Stage::Resolving, descriptor = %descriptor, "resolving");
        let resolved = catch_unwind(AssertUnwindSafe(|| self.cache.get(&descriptor)))
            .unwrap_or_else(|_| {
                Err(ResolutionError::Abandoned {
                    kind: descriptor.kind,
                    name: descriptor.name.clone(),
                })
            });
        let handle = match resolved {
            Ok(handle) => handle,
            Err(err) => {
                let err = self.error(Stage::Resolving, &descriptor, err.into());
                return self.route_failure(msg, Some(err));
            }
        };
        let Some(entity) = handle.entity_ref() else {
            let cause = FailureCause::NotFound {
                kind: descriptor.kind,
                name: descriptor.name.clone(),
            };
            let err = self.error(Stage::Resolving, &descriptor, cause);
            return self.route_failure(msg, Some(err));
        };

        debug!(msg_id = %msg.id, stage = %Stage::Resolved, entity = %entity, "identity resolved");

        let endpoints = self.config.direction.assign(entity, msg.originator);
        debug!(
            msg_id = %msg.id,
            stage = %Stage::Directing,
            direction = %self.config.direction,
            from = %endpoints.from,
            to = %endpoints.to,
            "link direction assigned"
        );

        let inner = Arc::clone(self);
        let job_descriptor = descriptor.clone();
        self.dispatch(
            &self.executors.action,
            Stage::ActionRunning,
            &descriptor,
            msg,
            move |msg| inner.action_stage(msg, &job_descriptor, handle, endpoints),
        );
    }

    fn action_stage(
        &self,
        msg: Message,
        descriptor: &EntityDescriptor,
        handle: EntityHandle,
        endpoints: LinkEndpoints,
    ) {
        let request = ActionRequest {
            message: &msg,
            descriptor,
            handle,
            endpoints,
        };
        debug!(msg_id = %msg.id, stage = %Stage::ActionRunning, "running action");
        let outcome = catch_unwind(AssertUnwindSafe(|| self.hook.perform_action(&request)));
        debug!(
            msg_id = %msg.id,
            stage = %Stage::ActionDone,
            succeeded = matches!(outcome, Ok(Ok(true))),
            "action finished"
        );
        match outcome {
            Ok(Ok(true)) => self.route_success(msg),
            Ok(Ok(false)) => self.route_failure(msg, None),
            Ok(Err(err)) => {
                let err = self.error(Stage::ActionRunning, descriptor, err.into());
                self.route_failure(msg, Some(err));
            }
            Err(payload) => {
                let cause = FailureCause::ActionPanicked {
                    message: panic_message(payload.as_ref()),
                };
                let err = self.error(Stage::ActionRunning, descriptor, cause);
                self.route_failure(msg, Some(err));
            }
        }
    }

    fn route_success(&self, msg: Message) {
        debug!(msg_id = %msg.id, stage = %Stage::Routed, "routed to success");
        self.sink.route_success(msg);
    }

    fn route_failure(&self, msg: Message, error: Option<PipelineError>) {
        match &error {
            Some(err) => warn!(
                msg_id = %msg.id,
                stage = %Stage::Routed,
                failed_at = %err.stage,
                kind = %err.kind,
                name = %err.name,
                direction = %err.direction,
                error = %err.cause,
                "routed to failure"
            ),
            None => debug!(
                msg_id = %msg.id,
                stage = %Stage::Routed,
                "action returned false, routed to failure"
            ),
        }
        self.sink.route_failure(msg, error);
    }
}

/// Builder for [`RelationActionPipeline`].
pub struct PipelineBuilder {
    config: Option<RelationActionConfig>,
    create_if_missing: bool,
    hook: Option<Arc<dyn ActionHook>>,
    sink: Option<Arc<dyn MessageSink>>,
    resolver: Option<Arc<dyn ResolutionStrategy>>,
    executors: Option<Executors>,
    clock: Option<Arc<dyn Clock>>,
    substitution: Substitution,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            config: None,
            create_if_missing: false,
            hook: None,
            sink: None,
            resolver: None,
            executors: None,
            clock: None,
            substitution: substitute,
        }
    }
}

impl PipelineBuilder {
    /// Set the node configuration (required).
    #[must_use]
    pub fn config(mut self, config: RelationActionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Create missing entities (default: false). Fixed per concrete node.
    #[must_use]
    pub const fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the action hook (required).
    #[must_use]
    pub fn hook(mut self, hook: impl ActionHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Set the action hook from a closure.
    #[must_use]
    pub fn hook_fn<F>(self, f: F) -> Self
    where
        F: Fn(&ActionRequest<'_>) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        self.hook(f)
    }

    /// Set the routing sink (required).
    #[must_use]
    pub fn sink(mut self, sink: impl MessageSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Resolve with the standard strategies over `services`.
    #[must_use]
    pub fn services(mut self, services: &EntityServices) -> Self {
        self.resolver = Some(Arc::new(StrategyRegistry::standard(services)));
        self
    }

    /// Resolve with a custom strategy (typically a [`StrategyRegistry`]).
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn ResolutionStrategy>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Dispatch onto these executors (default: two fresh pools).
    #[must_use]
    pub fn executors(mut self, executors: Executors) -> Self {
        self.executors = Some(executors);
        self
    }

    /// Measure cache entry age with this clock (default: system clock).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the pattern substitution function.
    #[must_use]
    pub fn substitution(mut self, substitution: Substitution) -> Self {
        self.substitution = substitution;
        self
    }

    /// Validate and build.
    ///
    /// Returns `ConfigError::MissingField` if the config, hook, sink or
    /// resolver is not set, or the config's own validation error.
    pub fn build(self) -> RelnodeResult<RelationActionPipeline> {
        let config = self.config.ok_or_else(|| missing("config"))?;
        config.validate()?;
        let hook = self.hook.ok_or_else(|| missing("hook"))?;
        let sink = self.sink.ok_or_else(|| missing("sink"))?;
        let resolver = self.resolver.ok_or_else(|| missing("resolver"))?;

        let mut cache = IdentityCache::new(
            resolver,
            CacheSettings {
                expiration_seconds: config.entity_cache_expiration,
                create_if_missing: self.create_if_missing,
            },
        );
        if let Some(clock) = self.clock {
            cache = cache.with_clock(clock);
        }
        let executors = self.executors.unwrap_or_else(Executors::start_default);

        Ok(RelationActionPipeline {
            inner: Arc::new(PipelineInner {
                config,
                create_if_missing: self.create_if_missing,
                cache,
                hook,
                sink,
                executors,
                substitution: self.substitution,
            }),
        })
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::entity::{Direction, EntityId, EntityKind, EntityRef};
    use crate::message::{ChannelSink, Metadata, Route, RouteReceiver};
    use crate::runtime::ExecutorConfig;
    use crate::storage::InMemoryServices;

    const WAIT: Duration = Duration::from_secs(5);

    fn executors() -> Executors {
        Executors::shared(Arc::new(IoExecutor::start(&ExecutorConfig {
            name: "pipeline-test".to_string(),
            workers: 2,
            queue_capacity: 64,
        })))
    }

    fn pipeline<F>(
        config: RelationActionConfig,
        hook: F,
    ) -> (InMemoryServices, RelationActionPipeline, RouteReceiver)
    where
        F: Fn(&ActionRequest<'_>) -> Result<bool, ActionError> + Send + Sync + 'static,
    {
        let mem = InMemoryServices::default();
        let (sink, routes) = ChannelSink::channel();
        let pipeline = RelationActionPipeline::builder()
            .config(config)
            .create_if_missing(true)
            .services(&mem.services())
            .hook_fn(hook)
            .sink(sink)
            .executors(executors())
            .build()
            .unwrap();
        (mem, pipeline, routes)
    }

    fn message(metadata: Metadata) -> Message {
        Message::new(
            "POST_TELEMETRY",
            EntityRef::new(EntityKind::Device, EntityId::new()),
            metadata,
        )
    }

    fn next(routes: &RouteReceiver) -> Route {
        routes.recv_timeout(WAIT).expect("message was routed")
    }

    #[test]
    fn test_build_descriptor_substitutes_patterns() {
        let config = RelationActionConfig::new(EntityKind::Asset, "${site}-${room}")
            .with_type_pattern("${kind}");
        let (_, pipeline, _) = pipeline(config, |_| Ok(true));
        let msg = message(
            Metadata::new()
                .with("site", "north")
                .with("room", "12")
                .with("kind", "room"),
        );
        let descriptor = pipeline.build_descriptor(&msg);
        assert_eq!(
            descriptor,
            EntityDescriptor::new(EntityKind::Asset, "north-12").with_subtype("room")
        );
    }

    #[test]
    fn test_build_descriptor_without_type_pattern_has_no_subtype() {
        let config = RelationActionConfig::new(EntityKind::Asset, "${site}");
        let (_, pipeline, _) = pipeline(config, |_| Ok(true));
        let descriptor = pipeline.build_descriptor(&message(Metadata::new().with("site", "s")));
        assert_eq!(descriptor.subtype, None);
    }

    #[test]
    fn test_false_outcome_routes_failure_without_error() {
        let config = RelationActionConfig::new(EntityKind::Tenant, "any");
        let (_, pipeline, routes) = pipeline(config, |_| Ok(false));
        pipeline.on_msg(message(Metadata::new()));
        let route = next(&routes);
        assert!(!route.is_success());
        assert!(route.error().is_none());
    }

    #[test]
    fn test_action_error_routes_failure_with_cause() {
        let config = RelationActionConfig::new(EntityKind::Tenant, "any");
        let (_, pipeline, routes) = pipeline(config, |_| {
            Err(ActionError::failed("relation service down"))
        });
        pipeline.on_msg(message(Metadata::new()));
        let route = next(&routes);
        let err = route.error().expect("error payload");
        assert_eq!(err.stage, Stage::ActionRunning);
        assert!(err.is_action());
        assert!(err.to_string().contains("relation service down"));
    }

    #[test]
    fn test_panicking_action_routes_failure() {
        let config = RelationActionConfig::new(EntityKind::Tenant, "any");
        let (_, pipeline, routes) = pipeline(config, |_| {
            panic!("hook exploded")
        });
        pipeline.on_msg(message(Metadata::new()));
        let route = next(&routes);
        let err = route.error().expect("error payload");
        assert_eq!(
            err.cause,
            FailureCause::ActionPanicked {
                message: "hook exploded".to_string()
            }
        );

        // The worker survives and keeps processing.
        pipeline.on_msg(message(Metadata::new()));
        assert!(!next(&routes).is_success());
    }

    #[test]
    fn test_not_found_routes_failure_before_action() {
        let config = RelationActionConfig::new(EntityKind::EntityView, "${view}");
        let (_, pipeline, routes) = pipeline(config, |_| {
            panic!("action must not run")
        });
        pipeline.on_msg(message(Metadata::new().with("view", "missing-view")));
        let route = next(&routes);
        let err = route.error().expect("error payload");
        assert!(err.is_not_found());
        assert_eq!(err.stage, Stage::Resolving);
        assert_eq!(
            err.cause.to_string(),
            "No entity found with kind 'ENTITY_VIEW' and name 'missing-view'"
        );
    }

    #[test]
    fn test_direction_to_puts_originator_first() {
        let config = RelationActionConfig::new(EntityKind::Tenant, "t").with_direction(Direction::To);
        let (sink_tx, seen) = crossbeam_channel::unbounded::<LinkEndpoints>();
        let (mem, pipeline, routes) = pipeline(config, move |req| {
            let _ = sink_tx.send(req.endpoints);
            Ok(true)
        });
        let msg = message(Metadata::new());
        let originator = msg.originator;
        pipeline.on_msg(msg);
        assert!(next(&routes).is_success());

        let endpoints = seen.recv_timeout(WAIT).unwrap();
        assert_eq!(endpoints.from, originator);
        assert_eq!(endpoints.to, EntityRef::new(EntityKind::Tenant, mem.tenant_id));
    }

    #[test]
    fn test_rejected_dispatch_routes_failure() {
        let pool = Arc::new(IoExecutor::start(&ExecutorConfig::named("closed")));
        pool.shutdown();
        let mem = InMemoryServices::default();
        let (sink, routes) = ChannelSink::channel();
        let pipeline = RelationActionPipeline::builder()
            .config(RelationActionConfig::new(EntityKind::Tenant, "t"))
            .services(&mem.services())
            .hook_fn(|_| Ok(true))
            .sink(sink)
            .executors(Executors::shared(pool))
            .build()
            .unwrap();

        pipeline.on_msg(message(Metadata::new()));
        let route = routes.try_recv().expect("routed synchronously");
        let err = route.error().expect("error payload");
        assert!(matches!(err.cause, FailureCause::Dispatch(_)));
        assert_eq!(err.stage, Stage::Resolving);
    }

    #[test]
    fn test_builder_requires_hook_and_sink() {
        let mem = InMemoryServices::default();
        let err = RelationActionPipeline::builder()
            .config(RelationActionConfig::new(EntityKind::Device, "${n}"))
            .services(&mem.services())
            .executors(executors())
            .build()
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("hook"));
    }

    struct PanicOnceSink {
        inner: ChannelSink,
        panicked: AtomicBool,
    }

    impl MessageSink for PanicOnceSink {
        fn route_success(&self, msg: Message) {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("sink exploded");
            }
            self.inner.route_success(msg);
        }

        fn route_failure(&self, msg: Message, error: Option<PipelineError>) {
            self.inner.route_failure(msg, error);
        }
    }

    #[test]
    fn test_panicking_sink_keeps_single_worker_alive() {
        let pool = Arc::new(IoExecutor::start(&ExecutorConfig {
            name: "single".to_string(),
            workers: 1,
            queue_capacity: 8,
        }));
        let mem = InMemoryServices::default();
        let (channel, routes) = ChannelSink::channel();
        let pipeline = RelationActionPipeline::builder()
            .config(RelationActionConfig::new(EntityKind::Tenant, "t"))
            .services(&mem.services())
            .hook_fn(|_| Ok(true))
            .sink(PanicOnceSink {
                inner: channel,
                panicked: AtomicBool::new(false),
            })
            .executors(Executors::shared(pool))
            .build()
            .unwrap();

        pipeline.on_msg(message(Metadata::new()));
        let msg = message(Metadata::new());
        let msg_id = msg.id;
        pipeline.on_msg(msg);

        let route = next(&routes);
        assert!(route.is_success());
        assert_eq!(route.message().id, msg_id);
    }

    #[test]
    fn test_stage_names() {
        let names: Vec<String> = [
            Stage::Received,
            Stage::DescriptorBuilt,
            Stage::Resolving,
            Stage::Resolved,
            Stage::Directing,
            Stage::ActionRunning,
            Stage::ActionDone,
            Stage::Routed,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(
            names,
            [
                "received",
                "descriptor built",
                "resolving",
                "resolved",
                "directing",
                "action",
                "action done",
                "routed"
            ]
        );
    }

    #[test]
    fn test_destroy_clears_cache() {
        let config = RelationActionConfig::new(EntityKind::Tenant, "t");
        let (_, pipeline, routes) = pipeline(config, |_| Ok(true));
        pipeline.on_msg(message(Metadata::new()));
        assert!(next(&routes).is_success());
        assert_eq!(pipeline.cache().len(), 1);
        pipeline.destroy();
        assert!(pipeline.cache().is_empty());
    }
}
