//! Behaviours and their Context
//!
//! A behaviour is a value implementing [`Actor`]. The runtime guarantees that
//! at most one of its callbacks runs at a time, so behaviours keep plain
//! mutable state. Every callback receives a [`Context`] giving access to the
//! actor's own reference, the current sender, its children, watches and
//! timers.

use crate::actor_ref::ActorRef;
use crate::cell::CellCore;
use crate::error::{ActorError, ActorResult, Result};
use crate::message::{AnyMessage, Signal};
use crate::path::ActorPath;
use crate::props::Props;
use crate::scheduler::Cancellable;
use crate::system::ActorSystem;
use std::any::Any;
use std::time::Duration;
use tracing::debug;

/// Actor behaviour
///
/// `receive` handles the behaviour's own messages. Anything that is not a
/// runtime [`Signal`] is first passed through [`Actor::accept`], which by
/// default downcasts to `Self::Message`; rejected messages go to dead
/// letters with reason `unhandled-message`. Override `accept` to take
/// several payload types into one message enum.
///
/// Returning an error (or panicking) from `receive` or `on_signal` hands
/// the failure to the actor's supervisor strategy.
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    fn receive(&mut self, ctx: &mut Context<'_>, message: Self::Message) -> ActorResult;

    /// Map an incoming payload to `Self::Message`
    fn accept(message: AnyMessage) -> std::result::Result<Self::Message, AnyMessage>
    where
        Self: Sized,
    {
        message.downcast::<Self::Message>()
    }

    /// Runtime notifications: watched actor terminated, child failed
    fn on_signal(&mut self, ctx: &mut Context<'_>, signal: Signal) -> ActorResult {
        debug!(
            path = %ctx.path(),
            subject = %signal.subject().path(),
            "Unhandled signal"
        );
        Ok(())
    }

    /// Runs before the first message; an error stops the actor
    fn pre_start(&mut self, _ctx: &mut Context<'_>) -> ActorResult {
        Ok(())
    }

    /// Runs once after the actor has stopped
    fn post_stop(&mut self, _ctx: &mut Context<'_>) -> ActorResult {
        Ok(())
    }

    /// Runs on the failed instance before it is replaced
    fn pre_restart(&mut self, _ctx: &mut Context<'_>, _cause: &ActorError) -> ActorResult {
        Ok(())
    }

    /// Runs on the fresh instance, before `pre_start`
    fn post_restart(&mut self, _ctx: &mut Context<'_>, _cause: &ActorError) -> ActorResult {
        Ok(())
    }
}

/// Per-callback view of the running actor
pub struct Context<'a> {
    core: &'a CellCore,
    sender: ActorRef,
}

impl<'a> Context<'a> {
    pub(crate) fn new(core: &'a CellCore, sender: ActorRef) -> Self {
        Self { core, sender }
    }

    /// This actor's reference
    pub fn self_ref(&self) -> &ActorRef {
        self.core.self_ref()
    }

    pub fn path(&self) -> &ActorPath {
        self.core.path()
    }

    /// Sender of the message being processed; no-sender inside hooks
    pub fn sender(&self) -> &ActorRef {
        &self.sender
    }

    pub fn system(&self) -> &ActorSystem {
        self.core.system()
    }

    /// Parent reference; `None` for top-level actors
    pub fn parent(&self) -> Option<ActorRef> {
        self.core.parent_ref()
    }

    /// Send `message` back to the current sender
    pub fn reply<M: Any + Send>(&self, message: M) {
        self.sender.tell(message, self.core.self_ref());
    }

    /// Send on behalf of the current sender
    pub fn forward<M: Any + Send>(&self, target: &ActorRef, message: M) {
        target.tell(message, &self.sender);
    }

    /// Create (or return the existing) child named `name`
    pub fn actor_of<B: Actor>(&self, name: &str, props: Props<B>) -> Result<ActorRef> {
        self.core.spawn_child(name, props)
    }

    pub fn child(&self, name: &str) -> Option<ActorRef> {
        self.core.child(name)
    }

    pub fn children(&self) -> Vec<ActorRef> {
        self.core.children()
    }

    /// Stop `target` gracefully
    pub fn stop(&self, target: &ActorRef) {
        if let Some(cell) = target.cell() {
            cell.stop("stop-requested");
        }
    }

    /// Stop this actor after the current message
    pub fn stop_self(&self) {
        self.core.stop_self("stop-self");
    }

    /// Receive [`Signal::Terminated`] when `target` stops; immediate if it
    /// already has
    pub fn watch(&self, target: &ActorRef) {
        let me = self.core.self_ref();
        match target.cell() {
            Some(cell) => cell.core().add_watcher(me.clone()),
            None if target.is_cell_ref() => me.tell(Signal::Terminated(target.clone()), target),
            None => {}
        }
    }

    pub fn unwatch(&self, target: &ActorRef) {
        if let Some(cell) = target.cell() {
            cell.core().remove_watcher(self.core.self_ref());
        }
    }

    /// Deliver `message` to this actor after `delay`
    pub fn schedule_once<M: Any + Send>(&self, delay: Duration, message: M) -> Cancellable {
        let me = self.core.self_ref();
        self.system().scheduler().schedule_once(delay, me, message, me)
    }

    /// Deliver `message` to `target` after `delay`, with this actor as sender
    pub fn schedule_to<M: Any + Send>(&self, delay: Duration, target: &ActorRef, message: M) -> Cancellable {
        self.system()
            .scheduler()
            .schedule_once(delay, target, message, self.core.self_ref())
    }

    /// Restarts this actor has gone through
    pub fn restart_count(&self) -> u32 {
        self.core.restart_count()
    }
}
