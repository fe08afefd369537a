//! Actor System
//!
//! Owns the dispatchers, the scheduler, the dead-letter sink, the path
//! registry and the top-level actors. Cloning an [`ActorSystem`] clones a
//! handle; every clone addresses the same runtime.
//!
//! The system stays alive until [`ActorSystem::shutdown`], which is final:
//! top-level actors are stopped (and their subtrees with them), pools and
//! timers are torn down and later `actor_of` calls fail.

use crate::actor::Actor;
use crate::actor_ref::ActorRef;
use crate::ask::AskHub;
use crate::cell::{install, ActorCell, Cell, CellCore};
use crate::dead_letters::DeadLetters;
use crate::dispatch::{Dispatchers, Executor, PoolDispatcher};
use crate::error::{ActorError, Result};
use crate::metrics::{SystemMetrics, SystemStats};
use crate::path::{validate_name, ActorPath};
use crate::props::Props;
use crate::scheduler::Scheduler;
use crate::supervision::{default_strategy, SupervisorStrategy};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use runtime_config::defaults::{ask, dispatch};
use runtime_config::{
    AskSettings, DeadLetterSettings, DispatcherKind, DispatcherSettings, RuntimeConfig,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Handle to a running actor system
///
/// Every live cell holds a handle back to its system, so dropping the last
/// application handle does not tear anything down. Call
/// [`shutdown`](ActorSystem::shutdown) to stop the actors and release the
/// dispatcher and scheduler threads.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    name: String,
    system_id: String,
    dispatchers: Dispatchers,
    scheduler: Scheduler,
    default_strategy: Arc<dyn SupervisorStrategy>,
    dead_letters: Arc<DeadLetters>,
    dead_letters_ref: ActorRef,
    top_level: DashMap<String, Arc<dyn Cell>>,
    registry: DashMap<String, ActorRef>,
    metrics: Arc<SystemMetrics>,
    terminated: AtomicBool,
    ask_hub: OnceCell<ActorRef>,
    next_request_id: AtomicU64,
    ask: AskSettings,
}

/// Builder for [`ActorSystem`]
pub struct ActorSystemBuilder {
    name: String,
    executors: Vec<(String, Arc<dyn Executor>)>,
    pools: Vec<(String, DispatcherSettings)>,
    default_dispatcher: String,
    default_strategy: Arc<dyn SupervisorStrategy>,
    ask: AskSettings,
    dead_letters: DeadLetterSettings,
}

impl ActorSystemBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executors: Vec::new(),
            pools: Vec::new(),
            default_dispatcher: dispatch::CPU_DISPATCHER.to_string(),
            default_strategy: default_strategy(),
            ask: AskSettings::default(),
            dead_letters: DeadLetterSettings::default(),
        }
    }

    /// Register a caller-supplied executor under `id`
    pub fn dispatcher(mut self, id: &str, executor: Arc<dyn Executor>) -> Self {
        self.executors.push((id.to_string(), executor));
        self
    }

    /// Declare a tokio-backed pool; declaring any pool replaces the
    /// built-in `cpu`/`io` pair
    pub fn pool(mut self, id: &str, kind: DispatcherKind, threads: Option<usize>) -> Self {
        self.pools.push((id.to_string(), DispatcherSettings { kind, threads }));
        self
    }

    pub fn default_dispatcher(mut self, id: &str) -> Self {
        self.default_dispatcher = id.to_string();
        self
    }

    /// Strategy for actors whose props carry none
    pub fn default_strategy(mut self, strategy: Arc<dyn SupervisorStrategy>) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn ask_settings(mut self, settings: AskSettings) -> Self {
        self.ask = settings;
        self
    }

    pub fn dead_letter_settings(mut self, settings: DeadLetterSettings) -> Self {
        self.dead_letters = settings;
        self
    }

    pub fn build(self) -> Result<ActorSystem> {
        validate_system_name(&self.name)?;
        if self.ask.hub_capacity == 0 {
            return Err(ActorError::configuration(
                "ask hub capacity must be positive",
                Some("ask.hub_capacity"),
            ));
        }
        if self.ask.default_timeout_ms == 0 {
            return Err(ActorError::configuration(
                "ask default timeout must be positive",
                Some("ask.default_timeout_ms"),
            ));
        }

        let mut pools = self.pools;
        if pools.is_empty() {
            pools.push((
                dispatch::CPU_DISPATCHER.to_string(),
                DispatcherSettings {
                    kind: DispatcherKind::Pool,
                    threads: None,
                },
            ));
            pools.push((
                dispatch::IO_DISPATCHER.to_string(),
                DispatcherSettings {
                    kind: DispatcherKind::Blocking,
                    threads: None,
                },
            ));
        }

        let overridden: HashSet<&str> = self.executors.iter().map(|(id, _)| id.as_str()).collect();
        let mut executors: Vec<(String, Arc<dyn Executor>)> = Vec::new();
        for (id, settings) in pools {
            if overridden.contains(id.as_str()) {
                continue;
            }
            let pool = PoolDispatcher::new(&self.name, &id, settings.kind, settings.threads)?;
            executors.push((id, Arc::new(pool)));
        }
        executors.extend(self.executors);
        let dispatchers = Dispatchers::new(executors, &self.default_dispatcher)?;

        let scheduler = Scheduler::new(&self.name)?;
        let metrics = Arc::new(SystemMetrics::default());
        let dead_letters = Arc::new(DeadLetters::new(
            self.dead_letters.capacity,
            self.dead_letters.log,
            metrics.clone(),
        ));
        let dead_letters_ref = ActorRef::for_dead_letters(&dead_letters);
        let system_id = format!("system-{}", Uuid::new_v4());

        let system = ActorSystem {
            inner: Arc::new(SystemInner {
                name: self.name,
                system_id,
                dispatchers,
                scheduler,
                default_strategy: self.default_strategy,
                dead_letters,
                dead_letters_ref,
                top_level: DashMap::new(),
                registry: DashMap::new(),
                metrics,
                terminated: AtomicBool::new(false),
                ask_hub: OnceCell::new(),
                next_request_id: AtomicU64::new(1),
                ask: self.ask,
            }),
        };

        info!(
            system = %system.inner.name,
            system_id = %system.inner.system_id,
            dispatchers = ?system.inner.dispatchers.ids(),
            default_dispatcher = system.inner.dispatchers.default_id(),
            "Actor system started"
        );

        let hub_props = Props::new(AskHub::new)
            .with_mailbox_capacity(system.inner.ask.hub_capacity)?
            .with_overflow_policy(system.inner.ask.hub_overflow);
        let hub = system.actor_of(ask::HUB_NAME, hub_props)?;
        // Freshly built, so the cell is always empty
        let _ = system.inner.ask_hub.set(hub);

        Ok(system)
    }
}

/// Reject system names that would make paths ambiguous
fn validate_system_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains(':') {
        return Err(ActorError::configuration(
            format!("invalid system name '{}': must be non-empty without '/' or ':'", name),
            Some("system.name"),
        ));
    }
    Ok(())
}

impl ActorSystem {
    pub fn builder(name: &str) -> ActorSystemBuilder {
        ActorSystemBuilder::new(name)
    }

    /// System with the built-in dispatchers and default settings
    pub fn new(name: &str) -> Result<Self> {
        Self::builder(name).build()
    }

    /// System described by a loaded configuration
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ActorError::configuration(format!("{:#}", e), None))?;

        let mut builder = Self::builder(&config.system.name)
            .default_dispatcher(&config.system.default_dispatcher)
            .ask_settings(config.ask.clone())
            .dead_letter_settings(config.dead_letters.clone());

        let mut ids: Vec<&String> = config.dispatchers.keys().collect();
        ids.sort();
        for id in ids {
            let settings = &config.dispatchers[id];
            builder = builder.pool(id, settings.kind, settings.threads);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Unique identifier used in logs
    pub fn system_id(&self) -> &str {
        &self.inner.system_id
    }

    /// Create (or return the existing) top-level actor named `name`
    pub fn actor_of<A: Actor>(&self, name: &str, props: Props<A>) -> Result<ActorRef> {
        if self.is_terminated() {
            return Err(ActorError::system_terminated(&self.inner.name));
        }
        validate_name(name)?;
        let existing = self
            .inner
            .top_level
            .get(name)
            .map(|cell| cell.value().core().self_ref().clone());
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let path = ActorPath::root(&self.inner.name, name)?;
        let cell = ActorCell::create(self, None, path, props)?;
        let actor = install(&self.inner.top_level, name, cell);

        if self.is_terminated() {
            if let Some(cell) = actor.cell() {
                cell.stop("system-shutdown");
            }
        }
        Ok(actor)
    }

    /// Look up a live actor by `system:/a/b` or `/a/b`; anything unknown
    /// resolves to dead letters
    pub fn resolve(&self, path: &str) -> ActorRef {
        let Some(path) = ActorPath::parse(path, &self.inner.name) else {
            return self.dead_letters();
        };
        if path.system() != self.inner.name {
            return self.dead_letters();
        }
        self.inner
            .registry
            .get(path.as_str())
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.dead_letters())
    }

    /// Stop `actor` gracefully
    pub fn stop(&self, actor: &ActorRef) {
        if let Some(cell) = actor.cell() {
            cell.stop("stop-requested");
        }
    }

    /// Reference to the dead-letter sink
    pub fn dead_letters(&self) -> ActorRef {
        self.inner.dead_letters_ref.clone()
    }

    /// Dead-letter records and subscriptions
    pub fn dead_letter_sink(&self) -> &Arc<DeadLetters> {
        &self.inner.dead_letters
    }

    pub(crate) fn dead_letter_sink_weak(&self) -> Weak<DeadLetters> {
        Arc::downgrade(&self.inner.dead_letters)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Executor for `id`, or the default when unknown
    pub fn dispatcher(&self, id: &str) -> Arc<dyn Executor> {
        self.inner.dispatchers.lookup(id)
    }

    pub fn dispatcher_ids(&self) -> Vec<String> {
        self.inner.dispatchers.ids()
    }

    pub fn default_strategy(&self) -> Arc<dyn SupervisorStrategy> {
        self.inner.default_strategy.clone()
    }

    pub fn metrics(&self) -> &SystemMetrics {
        &self.inner.metrics
    }

    pub fn stats(&self) -> SystemStats {
        self.inner.metrics.snapshot()
    }

    /// Top-level actors, the ask hub included
    pub fn top_level_actors(&self) -> Vec<ActorRef> {
        self.inner
            .top_level
            .iter()
            .map(|cell| cell.value().core().self_ref().clone())
            .collect()
    }

    /// Default timeout for [`crate::ask_default`]
    pub fn default_ask_timeout(&self) -> Duration {
        Duration::from_millis(self.inner.ask.default_timeout_ms)
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// Stop every actor and release the runtime threads; idempotent
    ///
    /// Required before the system goes away: cells keep the system alive
    /// until they are stopped.
    pub fn shutdown(&self) {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            system = %self.inner.name,
            system_id = %self.inner.system_id,
            "Shutting down actor system"
        );

        let actors: Vec<Arc<dyn Cell>> = self
            .inner
            .top_level
            .iter()
            .map(|cell| cell.value().clone())
            .collect();
        for cell in &actors {
            cell.stop("system-shutdown");
        }
        self.inner.top_level.clear();

        self.inner.dispatchers.shutdown_all();
        self.inner.scheduler.shutdown();
        self.inner.registry.clear();

        info!(
            system = %self.inner.name,
            stopped = actors.len(),
            dead_letters = self.inner.dead_letters.count(),
            "Actor system shutdown complete"
        );
    }

    pub(crate) fn register(&self, actor: &ActorRef) {
        self.inner
            .registry
            .insert(actor.path().as_str().to_string(), actor.clone());
    }

    pub(crate) fn unregister(&self, actor: &ActorRef) {
        self.inner
            .registry
            .remove_if(actor.path().as_str(), |_, registered| registered == actor);
    }

    pub(crate) fn remove_top_level(&self, core: &CellCore) {
        let removed = self
            .inner
            .top_level
            .remove_if(core.path().name(), |_, cell| std::ptr::eq(cell.core(), core));
        if removed.is_some() {
            debug!(path = %core.path(), "Top-level actor removed");
        }
    }

    pub(crate) fn ask_hub(&self) -> Option<&ActorRef> {
        self.inner.ask_hub.get()
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.inner.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.inner.name)
            .field("system_id", &self.inner.system_id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Context;
    use crate::error::ActorResult;
    use crate::dispatch::InlineExecutor;

    struct Idle;

    impl Actor for Idle {
        type Message = ();

        fn receive(&mut self, _ctx: &mut Context<'_>, _msg: ()) -> ActorResult {
            Ok(())
        }
    }

    #[test]
    fn test_system_creation() {
        let system = ActorSystem::new("unit").unwrap();
        assert_eq!(system.name(), "unit");
        assert!(system.system_id().starts_with("system-"));
        assert_eq!(system.dispatcher_ids(), vec!["cpu".to_string(), "io".to_string()]);
        assert!(system.ask_hub().is_some());
        assert!(!system.is_terminated());
        system.shutdown();
        assert!(system.is_terminated());
    }

    #[test]
    fn test_invalid_system_names() {
        for name in ["", "a/b", "a:b"] {
            let err = ActorSystem::new(name).unwrap_err();
            assert_eq!(err.category(), "configuration", "name {:?}", name);
        }
    }

    #[test]
    fn test_unknown_default_dispatcher_rejected() {
        let err = ActorSystem::builder("unit")
            .default_dispatcher("gpu")
            .build()
            .unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_actor_of_is_idempotent_and_resolvable() {
        let system = ActorSystem::builder("unit")
            .dispatcher("cpu", Arc::new(InlineExecutor))
            .build()
            .unwrap();

        let first = system.actor_of("idle", Props::new(|| Idle)).unwrap();
        let second = system.actor_of("idle", Props::new(|| Idle)).unwrap();
        assert_eq!(first, second);

        assert_eq!(system.resolve("/idle"), first);
        assert_eq!(system.resolve("unit:/idle"), first);
        assert!(system.resolve("/missing").is_dead_letters());
        assert!(system.resolve("other:/idle").is_dead_letters());
        assert!(system.resolve("").is_dead_letters());

        system.shutdown();
        assert!(matches!(
            system.actor_of("late", Props::new(|| Idle)),
            Err(ActorError::SystemTerminated { .. })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [system]
            name = "configured"
            default_dispatcher = "workers"

            [dispatchers.workers]
            kind = "pool"
            threads = 2
            "#,
        )
        .unwrap();

        let system = ActorSystem::from_config(&config).unwrap();
        assert_eq!(system.name(), "configured");
        assert_eq!(system.dispatcher_ids(), vec!["workers".to_string()]);
        system.shutdown();
    }
}
