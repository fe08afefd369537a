//! Props
//!
//! Immutable recipe for an actor: a behaviour producer plus mailbox,
//! dispatch and supervision settings. Every `with_*` call returns a new
//! value, so one `Props` can seed many differently configured actors.

use crate::actor::Actor;
use crate::error::{ActorError, Result};
use crate::supervision::SupervisorStrategy;
use runtime_config::defaults::{dispatch, mailbox};
use runtime_config::OverflowPolicy;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Producer<A> = Arc<dyn Fn() -> Result<A> + Send + Sync + 'static>;

/// Actor recipe
pub struct Props<A: Actor> {
    producer: Producer<A>,
    mailbox_capacity: usize,
    overflow: OverflowPolicy,
    dispatcher: Arc<str>,
    throughput: usize,
    supervisor: Option<Arc<dyn SupervisorStrategy>>,
}

impl<A: Actor> Props<A> {
    /// Props from an infallible factory
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::try_new(move || Ok(producer()))
    }

    /// Props from a factory that may fail; a failed restart stops the actor
    pub fn try_new<F>(producer: F) -> Self
    where
        F: Fn() -> Result<A> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
            mailbox_capacity: mailbox::DEFAULT_CAPACITY,
            overflow: OverflowPolicy::default(),
            dispatcher: Arc::from(dispatch::CPU_DISPATCHER),
            throughput: mailbox::DEFAULT_THROUGHPUT,
            supervisor: None,
        }
    }

    pub fn with_mailbox_capacity(&self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ActorError::configuration(
                "mailbox capacity must be positive",
                Some("mailbox_capacity"),
            ));
        }
        Ok(Self {
            mailbox_capacity: capacity,
            ..self.clone()
        })
    }

    pub fn with_overflow_policy(&self, overflow: OverflowPolicy) -> Self {
        Self {
            overflow,
            ..self.clone()
        }
    }

    /// Dispatcher identifier; unknown identifiers fall back to the system
    /// default at spawn time
    pub fn with_dispatcher(&self, id: &str) -> Self {
        Self {
            dispatcher: Arc::from(id),
            ..self.clone()
        }
    }

    /// Envelopes processed per turn before the worker is yielded
    pub fn with_throughput(&self, throughput: usize) -> Result<Self> {
        if throughput == 0 {
            return Err(ActorError::configuration(
                "throughput must be positive",
                Some("throughput"),
            ));
        }
        Ok(Self {
            throughput,
            ..self.clone()
        })
    }

    /// Strategy overriding the system default
    pub fn with_supervisor(&self, strategy: Arc<dyn SupervisorStrategy>) -> Self {
        Self {
            supervisor: Some(strategy),
            ..self.clone()
        }
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn dispatcher(&self) -> &str {
        &self.dispatcher
    }

    pub fn throughput(&self) -> usize {
        self.throughput
    }

    pub fn supervisor(&self) -> Option<&Arc<dyn SupervisorStrategy>> {
        self.supervisor.as_ref()
    }

    /// Build a fresh behaviour; panics in the factory become errors
    pub(crate) fn produce(&self, path: &str) -> Result<A> {
        match catch_unwind(AssertUnwindSafe(|| (self.producer)())) {
            Ok(Ok(actor)) => Ok(actor),
            Ok(Err(e)) => Err(ActorError::producer(path, e.to_string())),
            Err(payload) => Err(ActorError::producer(
                path,
                ActorError::panicked(payload.as_ref()).to_string(),
            )),
        }
    }
}

impl<A: Actor> Clone for Props<A> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            mailbox_capacity: self.mailbox_capacity,
            overflow: self.overflow,
            dispatcher: self.dispatcher.clone(),
            throughput: self.throughput,
            supervisor: self.supervisor.clone(),
        }
    }
}

impl<A: Actor> fmt::Debug for Props<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("actor", &std::any::type_name::<A>())
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("overflow", &self.overflow)
            .field("dispatcher", &self.dispatcher)
            .field("throughput", &self.throughput)
            .field("supervisor", &self.supervisor.as_ref().map(|s| s.name()))
            .finish()
    }
}
