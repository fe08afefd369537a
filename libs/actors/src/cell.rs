//! Actor Cells
//!
//! A cell owns one behaviour instance, its bounded mailbox, its children and
//! its watchers. Turns are submitted to the cell's dispatcher; at most one
//! turn (or lifecycle hook) runs at a time because every callback holds the
//! behaviour lock, and the `scheduled` flag keeps at most one turn queued.
//!
//! Stopping is two-phase. `stop_gracefully` marks the cell, stops children
//! and drains the mailbox to dead letters; the final phase (`post_stop`,
//! watcher notification, unregistration) needs the behaviour lock, so when a
//! turn or restart currently holds it the final phase is finished by that
//! holder through `settle` once the lock is released.

use crate::actor::{Actor, Context};
use crate::actor_ref::ActorRef;
use crate::dispatch::Executor;
use crate::error::{ActorError, ActorResult, Result};
use crate::mailbox::{Mailbox, Slot};
use crate::message::{Envelope, PoisonPill, Signal};
use crate::path::{validate_name, ActorPath};
use crate::props::Props;
use crate::supervision::{restart_delay, Directive, SupervisorStrategy};
use crate::system::ActorSystem;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Type-erased cell operations
pub(crate) trait Cell: Send + Sync + 'static {
    fn core(&self) -> &CellCore;

    /// Offer an envelope to the mailbox and schedule a turn
    fn enqueue(&self, envelope: Envelope);

    /// Run `pre_start` and begin processing
    fn start(&self);

    /// Graceful stop; idempotent
    fn stop(&self, reason: &'static str);

    /// Drop a never-started cell that lost a name race
    fn discard(&self);
}

/// Behaviour-independent cell state
pub(crate) struct CellCore {
    path: ActorPath,
    self_ref: ActorRef,
    cell: Weak<dyn Cell>,
    parent: Option<Weak<dyn Cell>>,
    system: ActorSystem,
    children: DashMap<String, Arc<dyn Cell>>,
    watchers: DashSet<ActorRef>,
    mailbox: Mailbox,
    dispatcher: Arc<dyn Executor>,
    strategy: Arc<dyn SupervisorStrategy>,
    throughput: usize,
    scheduled: AtomicBool,
    stopping: AtomicBool,
    terminated: AtomicBool,
    suspended: AtomicBool,
    restart_count: AtomicU32,
}

impl CellCore {
    pub(crate) fn path(&self) -> &ActorPath {
        &self.path
    }

    pub(crate) fn self_ref(&self) -> &ActorRef {
        &self.self_ref
    }

    pub(crate) fn system(&self) -> &ActorSystem {
        &self.system
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::SeqCst)
    }

    pub(crate) fn mailbox_len(&self) -> usize {
        self.mailbox.len()
    }

    pub(crate) fn parent_ref(&self) -> Option<ActorRef> {
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|parent| parent.core().self_ref.clone())
    }

    pub(crate) fn child(&self, name: &str) -> Option<ActorRef> {
        self.children
            .get(name)
            .map(|child| child.value().core().self_ref.clone())
    }

    pub(crate) fn children(&self) -> Vec<ActorRef> {
        self.children
            .iter()
            .map(|child| child.value().core().self_ref.clone())
            .collect()
    }

    fn should_run(&self) -> bool {
        !self.stopping.load(Ordering::SeqCst)
            && !self.suspended.load(Ordering::SeqCst)
            && !self.mailbox.is_empty()
    }

    pub(crate) fn stop_self(&self, reason: &'static str) {
        if let Some(cell) = self.cell.upgrade() {
            cell.stop(reason);
        }
    }

    /// Create (or return the existing) child
    pub(crate) fn spawn_child<B: Actor>(&self, name: &str, props: Props<B>) -> Result<ActorRef> {
        if self.is_stopping() {
            debug!(path = %self.path, child = name, "Parent stopping, child not created");
            return Ok(self.system.dead_letters());
        }
        validate_name(name)?;
        if let Some(existing) = self.child(name) {
            return Ok(existing);
        }

        let path = self.path.child(name)?;
        let cell = ActorCell::create(&self.system, Some(self.cell.clone()), path, props)?;
        let actor = install(&self.children, name, cell);

        // Lost a race with stop_gracefully's child snapshot
        if self.is_stopping() {
            if let Some(cell) = actor.cell() {
                cell.stop("parent-stopping");
            }
        }
        Ok(actor)
    }

    pub(crate) fn add_watcher(&self, watcher: ActorRef) {
        self.watchers.insert(watcher.clone());
        // Whoever removes the entry sends the notification
        if self.terminated.load(Ordering::SeqCst) && self.watchers.remove(&watcher).is_some() {
            watcher.tell(Signal::Terminated(self.self_ref.clone()), &self.self_ref);
        }
    }

    pub(crate) fn remove_watcher(&self, watcher: &ActorRef) {
        self.watchers.remove(watcher);
    }

    pub(crate) fn dead_letter(&self, envelope: Envelope, reason: &'static str) {
        self.system.dead_letter_sink().publish(envelope, &self.path, reason);
    }

    fn drain_to_dead_letters(&self, reason: &'static str) {
        for envelope in self.mailbox.drain() {
            self.dead_letter(envelope, reason);
        }
    }

    fn notify_parent(&self, cause: ActorError) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            let signal = Signal::Failure {
                child: self.self_ref.clone(),
                cause,
            };
            parent.core().self_ref.tell(signal, &self.self_ref);
        }
    }

    fn remove_child(&self, child: &CellCore) {
        self.children
            .remove_if(child.path.name(), |_, cell| std::ptr::eq(cell.core(), child));
    }

    /// Final stop phase, after `post_stop`
    fn finish_termination(&self) {
        let watchers: Vec<ActorRef> = self.watchers.iter().map(|w| w.key().clone()).collect();
        for watcher in watchers {
            if self.watchers.remove(&watcher).is_some() {
                watcher.tell(Signal::Terminated(self.self_ref.clone()), &self.self_ref);
            }
        }

        self.system.unregister(&self.self_ref);
        match &self.parent {
            Some(parent) => {
                if let Some(parent) = parent.upgrade() {
                    parent.core().remove_child(self);
                }
            }
            None => self.system.remove_top_level(self),
        }

        self.system.metrics().record_actor_stopped();
        info!(path = %self.path, "Actor stopped");
    }
}

/// Insert a freshly created cell under `name` unless another creator won
/// the race, then register and start it
pub(crate) fn install(slots: &DashMap<String, Arc<dyn Cell>>, name: &str, cell: Arc<dyn Cell>) -> ActorRef {
    let actor = cell.core().self_ref.clone();
    match slots.entry(name.to_string()) {
        Entry::Occupied(slot) => {
            let winner = slot.get().core().self_ref.clone();
            drop(slot);
            debug!(path = %actor.path(), "Duplicate child name, discarding new instance");
            cell.discard();
            return winner;
        }
        Entry::Vacant(slot) => {
            slot.insert(cell.clone());
        }
    }

    cell.core().system.register(&actor);
    cell.start();
    actor
}

/// Run a behaviour callback, converting panics into failures
fn guarded<F>(callback: F) -> ActorResult
where
    F: FnOnce() -> ActorResult,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => result,
        Err(payload) => Err(ActorError::panicked(payload.as_ref())),
    }
}

/// Cell specialised to one behaviour type
pub(crate) struct ActorCell<A: Actor> {
    core: CellCore,
    behavior: Mutex<A>,
    props: Props<A>,
    this: Weak<ActorCell<A>>,
}

impl<A: Actor> ActorCell<A> {
    /// Build the first behaviour instance and the cell around it; the cell
    /// is inert until `start`
    pub(crate) fn create(
        system: &ActorSystem,
        parent: Option<Weak<dyn Cell>>,
        path: ActorPath,
        props: Props<A>,
    ) -> Result<Arc<dyn Cell>> {
        let behavior = props.produce(path.as_str())?;
        let dispatcher = system.dispatcher(props.dispatcher());
        let strategy = props
            .supervisor()
            .cloned()
            .unwrap_or_else(|| system.default_strategy());
        let mailbox = Mailbox::new(props.mailbox_capacity(), props.overflow_policy());
        let dead_letters = system.dead_letter_sink_weak();
        let throughput = props.throughput();

        let cell: Arc<dyn Cell> = Arc::new_cyclic(|this: &Weak<ActorCell<A>>| {
            let erased: Weak<dyn Cell> = this.clone();
            let self_ref = ActorRef::for_cell(path.clone(), erased.clone(), dead_letters);
            ActorCell {
                core: CellCore {
                    path,
                    self_ref,
                    cell: erased,
                    parent,
                    system: system.clone(),
                    children: DashMap::new(),
                    watchers: DashSet::new(),
                    mailbox,
                    dispatcher,
                    strategy,
                    throughput,
                    // Held until start() so no turn can precede pre_start
                    scheduled: AtomicBool::new(true),
                    stopping: AtomicBool::new(false),
                    terminated: AtomicBool::new(false),
                    suspended: AtomicBool::new(false),
                    restart_count: AtomicU32::new(0),
                },
                behavior: Mutex::new(behavior),
                props,
                this: this.clone(),
            }
        });
        Ok(cell)
    }

    fn schedule(&self) {
        let core = &self.core;
        if core.suspended.load(Ordering::SeqCst) {
            return;
        }
        if core
            .scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        match self.this.upgrade() {
            Some(cell) => core.dispatcher.execute(Box::new(move || cell.run())),
            None => core.scheduled.store(false, Ordering::SeqCst),
        }
    }

    /// One turn: up to `throughput` envelopes
    fn run(&self) {
        let core = &self.core;
        {
            let mut actor = self.behavior.lock();
            let mut processed = 0;
            while processed < core.throughput {
                if core.suspended.load(Ordering::SeqCst) {
                    break;
                }
                let Some(slot) = core.mailbox.poll() else {
                    break;
                };
                processed += 1;
                match slot {
                    Slot::Message(envelope) => self.process(&mut actor, envelope),
                    Slot::OverflowMarker => {
                        core.mailbox.clear_overflow_marker();
                        if !core.is_stopping() {
                            self.handle_failure(ActorError::mailbox_overflow(core.path.as_str()));
                        }
                    }
                }
            }
        }

        core.scheduled.store(false, Ordering::SeqCst);
        self.settle();
        if core.should_run() {
            self.schedule();
        }
    }

    fn process(&self, actor: &mut A, envelope: Envelope) {
        let core = &self.core;
        if core.is_stopping() {
            core.dead_letter(envelope, "actor-stopping");
            return;
        }

        let Envelope { message, sender } = envelope;
        if message.is::<PoisonPill>() {
            debug!(path = %core.path, sender = %sender.path(), "Poison pill received");
            self.stop_gracefully("poison-pill");
            return;
        }

        let started = Instant::now();
        let mut ctx = Context::new(core, sender);
        let outcome = match message.downcast::<Signal>() {
            Ok(signal) => guarded(|| actor.on_signal(&mut ctx, signal)),
            Err(message) => match catch_unwind(AssertUnwindSafe(|| A::accept(message))) {
                Ok(Ok(message)) => guarded(|| actor.receive(&mut ctx, message)),
                Ok(Err(message)) => {
                    let sender = ctx.sender().clone();
                    core.dead_letter(Envelope::new(message, sender), "unhandled-message");
                    return;
                }
                // The payload went down with the panic
                Err(payload) => Err(ActorError::panicked(payload.as_ref())),
            },
        };
        core.system
            .metrics()
            .record_message_handled(started.elapsed(), outcome.is_err());

        if let Err(cause) = outcome {
            self.handle_failure(cause);
        }
    }

    fn handle_failure(&self, cause: ActorError) {
        let core = &self.core;
        if core.is_stopping() {
            debug!(path = %core.path, error = %cause, "Failure while stopping, ignored");
            return;
        }

        match core.strategy.decide(&cause) {
            Directive::Stop => {
                error!(
                    path = %core.path,
                    error = %cause,
                    error_category = cause.category(),
                    directive = "Stop",
                    strategy = core.strategy.name(),
                    "Actor failed, stopping"
                );
                self.stop_gracefully("failure-stop");
                core.notify_parent(cause);
            }
            Directive::Restart { backoff } => {
                let restarts = core.restart_count.fetch_add(1, Ordering::SeqCst);
                let delay = restart_delay(backoff, restarts);
                warn!(
                    path = %core.path,
                    error = %cause,
                    error_category = cause.category(),
                    directive = "Restart",
                    strategy = core.strategy.name(),
                    restart_count = restarts + 1,
                    backoff_ms = delay.as_millis() as u64,
                    "Actor failed, restarting after backoff"
                );

                core.suspended.store(true, Ordering::SeqCst);
                core.notify_parent(cause.clone());

                let this = self.this.clone();
                core.system.scheduler().schedule_task(delay, move || {
                    if let Some(cell) = this.upgrade() {
                        let dispatcher = cell.core.dispatcher.clone();
                        dispatcher.execute(Box::new(move || cell.restart(cause)));
                    }
                });
            }
        }
    }

    /// Replace the behaviour after a restart backoff
    fn restart(&self, cause: ActorError) {
        let core = &self.core;
        if !core.is_stopping() {
            let mut actor = self.behavior.lock();
            let mut ctx = Context::new(core, ActorRef::no_sender());

            if let Err(e) = guarded(|| actor.pre_restart(&mut ctx, &cause)) {
                warn!(path = %core.path, error = %e, "pre_restart hook failed");
            }

            match self.props.produce(core.path.as_str()) {
                Ok(fresh) => {
                    *actor = fresh;
                    if let Err(e) = guarded(|| actor.post_restart(&mut ctx, &cause)) {
                        warn!(path = %core.path, error = %e, "post_restart hook failed");
                    }
                    if let Err(e) = guarded(|| actor.pre_start(&mut ctx)) {
                        warn!(path = %core.path, error = %e, "pre_start hook failed after restart");
                    }
                    core.system.metrics().record_actor_restart(true);
                    info!(
                        path = %core.path,
                        restart_count = core.restart_count(),
                        "Actor restarted"
                    );
                }
                Err(e) => {
                    error!(path = %core.path, error = %e, "Restart failed, stopping actor");
                    core.system.metrics().record_actor_restart(false);
                    // Finished by settle() below, once the lock is released
                    self.stop_gracefully("restart-failed");
                }
            }
        }

        core.suspended.store(false, Ordering::SeqCst);
        self.settle();
        if core.should_run() {
            self.schedule();
        }
    }

    fn stop_gracefully(&self, reason: &'static str) {
        let core = &self.core;
        if core
            .stopping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        debug!(path = %core.path, reason, "Stopping actor");

        let children: Vec<Arc<dyn Cell>> = core.children.iter().map(|c| c.value().clone()).collect();
        for child in &children {
            child.stop("parent-stopping");
        }
        core.children.clear();

        core.drain_to_dead_letters("actor-stopped");
        self.settle();
    }

    /// Finish a pending stop if the behaviour lock is free
    fn settle(&self) {
        let core = &self.core;
        if !core.is_stopping() || core.terminated.load(Ordering::SeqCst) {
            return;
        }
        let Some(mut actor) = self.behavior.try_lock() else {
            // The holder calls settle() after releasing the lock
            return;
        };
        if core.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut ctx = Context::new(core, ActorRef::no_sender());
        if let Err(e) = guarded(|| actor.post_stop(&mut ctx)) {
            error!(path = %core.path, error = %e, "post_stop hook failed");
        }
        drop(actor);

        core.drain_to_dead_letters("actor-stopped");
        core.finish_termination();
    }
}

impl<A: Actor> Cell for ActorCell<A> {
    fn core(&self) -> &CellCore {
        &self.core
    }

    fn enqueue(&self, envelope: Envelope) {
        let core = &self.core;
        if core.is_stopping() {
            core.dead_letter(envelope, "actor-stopping");
            return;
        }

        let offer = core.mailbox.offer(envelope);
        for (rejected, reason) in offer.rejected {
            core.system.metrics().record_mailbox_overflow();
            core.dead_letter(rejected, reason);
        }

        // Stopped between the check and the offer
        if core.is_stopping() {
            core.drain_to_dead_letters("actor-stopped");
            return;
        }
        if offer.wake {
            self.schedule();
        }
    }

    fn start(&self) {
        let core = &self.core;
        core.system.metrics().record_actor_spawned();

        let failure = {
            let mut actor = self.behavior.lock();
            let mut ctx = Context::new(core, ActorRef::no_sender());
            let outcome = guarded(|| actor.pre_start(&mut ctx));
            outcome.err()
        };

        match failure {
            Some(cause) => {
                error!(path = %core.path, error = %cause, "pre_start failed, stopping actor");
                self.stop_gracefully("pre-start-failed");
            }
            None => debug!(
                path = %core.path,
                mailbox_capacity = core.mailbox.capacity(),
                overflow = core.mailbox.policy().name(),
                "Actor started"
            ),
        }

        core.scheduled.store(false, Ordering::SeqCst);
        self.settle();
        if core.should_run() {
            self.schedule();
        }
    }

    fn stop(&self, reason: &'static str) {
        self.stop_gracefully(reason);
    }

    fn discard(&self) {
        let core = &self.core;
        core.stopping.store(true, Ordering::SeqCst);
        core.terminated.store(true, Ordering::SeqCst);
        core.drain_to_dead_letters("actor-stopped");
    }
}
