//! Message Transport Types
//!
//! The runtime never interprets payloads. A message travels as an
//! [`AnyMessage`] inside an [`Envelope`] and is downcast exactly once, by the
//! receiving cell, into the behaviour's own message type.

use crate::actor_ref::ActorRef;
use crate::error::ActorError;
use std::any::Any;
use std::fmt;

/// Type-erased message payload that remembers its concrete type name
pub struct AnyMessage {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl AnyMessage {
    /// Box a concrete value
    pub fn new<M: Any + Send>(message: M) -> Self {
        Self {
            value: Box::new(message),
            type_name: std::any::type_name::<M>(),
        }
    }

    /// Concrete type name captured at construction
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Check the concrete type without consuming
    pub fn is<M: Any>(&self) -> bool {
        self.value.is::<M>()
    }

    /// Borrow as a concrete type
    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        self.value.downcast_ref::<M>()
    }

    /// Mutably borrow as a concrete type
    pub fn downcast_mut<M: Any>(&mut self) -> Option<&mut M> {
        self.value.downcast_mut::<M>()
    }

    /// Take the concrete value, or get the message back on mismatch
    pub fn downcast<M: Any>(self) -> Result<M, AnyMessage> {
        let type_name = self.type_name;
        match self.value.downcast::<M>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(AnyMessage { value, type_name }),
        }
    }

    /// Try `M`, mapping it into the caller's sum type
    ///
    /// Chains in [`crate::Actor::accept`] overrides:
    /// `msg.accept_as(Cmd::Ask).or_else(|m| m.downcast::<Cmd>())`
    pub fn accept_as<M: Any, T>(self, wrap: impl FnOnce(M) -> T) -> Result<T, AnyMessage> {
        self.downcast::<M>().map(wrap)
    }
}

impl fmt::Debug for AnyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyMessage<{}>", self.type_name)
    }
}

/// Immutable (message, sender) pair, consumed exactly once
#[derive(Debug)]
pub struct Envelope {
    pub message: AnyMessage,
    pub sender: ActorRef,
}

impl Envelope {
    pub fn new(message: AnyMessage, sender: ActorRef) -> Self {
        Self { message, sender }
    }
}

/// Universal termination message: the receiving actor stops gracefully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonPill;

/// Runtime notifications delivered through [`crate::Actor::on_signal`]
#[derive(Debug, Clone)]
pub enum Signal {
    /// A watched actor stopped
    Terminated(ActorRef),
    /// A child failed; sent for both stop and restart directives
    Failure { child: ActorRef, cause: ActorError },
}

impl Signal {
    /// Actor the signal is about
    pub fn subject(&self) -> &ActorRef {
        match self {
            Signal::Terminated(actor) => actor,
            Signal::Failure { child, .. } => child,
        }
    }
}
