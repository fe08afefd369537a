//! Actor References
//!
//! An [`ActorRef`] is a cheap, shareable, non-owning handle: a path plus a
//! weak pointer to the owning cell. Once the cell stops, sends through the
//! handle are redirected to dead letters; the handle itself stays valid.

use crate::cell::Cell;
use crate::dead_letters::DeadLetters;
use crate::message::{AnyMessage, Envelope};
use crate::path::ActorPath;
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tracing::trace;

static NO_SENDER: Lazy<ActorRef> = Lazy::new(|| ActorRef {
    path: ActorPath::sentinel("noSender"),
    target: Target::NoSender,
});

/// Location-transparent actor address
#[derive(Clone)]
pub struct ActorRef {
    path: ActorPath,
    target: Target,
}

#[derive(Clone)]
enum Target {
    /// Live (or formerly live) actor; dead letters catch sends after stop
    Cell {
        cell: Weak<dyn Cell>,
        dead_letters: Weak<DeadLetters>,
    },
    /// The system's dead-letter sink
    DeadLetters(Weak<DeadLetters>),
    /// Absent sender; sends are dropped
    NoSender,
}

impl ActorRef {
    pub(crate) fn for_cell(path: ActorPath, cell: Weak<dyn Cell>, dead_letters: Weak<DeadLetters>) -> Self {
        Self {
            path,
            target: Target::Cell { cell, dead_letters },
        }
    }

    pub(crate) fn for_dead_letters(sink: &Arc<DeadLetters>) -> Self {
        Self {
            path: sink.path().clone(),
            target: Target::DeadLetters(Arc::downgrade(sink)),
        }
    }

    /// Sentinel used when a message has no meaningful sender
    pub fn no_sender() -> ActorRef {
        NO_SENDER.clone()
    }

    /// Send a message; never blocks and never fails
    pub fn tell<M: Any + Send>(&self, message: M, sender: &ActorRef) {
        self.tell_any(AnyMessage::new(message), sender);
    }

    /// Send without a sender
    pub fn send<M: Any + Send>(&self, message: M) {
        self.tell_any(AnyMessage::new(message), &NO_SENDER);
    }

    /// Send an already type-erased message, e.g. when forwarding
    pub fn tell_any(&self, message: AnyMessage, sender: &ActorRef) {
        let envelope = Envelope::new(message, sender.clone());
        match &self.target {
            Target::Cell { cell, dead_letters } => match cell.upgrade() {
                Some(cell) => cell.enqueue(envelope),
                None => {
                    if let Some(sink) = dead_letters.upgrade() {
                        sink.publish(envelope, &self.path, "actor-terminated");
                    }
                }
            },
            Target::DeadLetters(sink) => {
                if let Some(sink) = sink.upgrade() {
                    sink.publish(envelope, &self.path, "sent-to-dead-letters");
                }
            }
            Target::NoSender => {
                trace!(
                    message_type = envelope.message.type_name(),
                    "Dropping message sent to no-sender"
                );
            }
        }
    }

    /// Actor path
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Check if this is the no-sender sentinel
    pub fn is_no_sender(&self) -> bool {
        matches!(self.target, Target::NoSender)
    }

    /// Check if this addresses the dead-letter sink
    pub fn is_dead_letters(&self) -> bool {
        matches!(self.target, Target::DeadLetters(_))
    }

    /// Check if the addressed actor still accepts messages
    pub fn is_alive(&self) -> bool {
        self.cell().map(|cell| !cell.core().is_stopping()).unwrap_or(false)
    }

    /// Restarts performed by the addressed actor, if it is still reachable
    pub fn restart_count(&self) -> Option<u32> {
        self.cell().map(|cell| cell.core().restart_count())
    }

    /// Envelopes currently queued, if the actor is still reachable
    pub fn mailbox_len(&self) -> Option<usize> {
        self.cell().map(|cell| cell.core().mailbox_len())
    }

    pub(crate) fn cell(&self) -> Option<Arc<dyn Cell>> {
        match &self.target {
            Target::Cell { cell, .. } => cell.upgrade(),
            _ => None,
        }
    }

    /// True when this handle ever pointed at a cell (live or not)
    pub(crate) fn is_cell_ref(&self) -> bool {
        matches!(self.target, Target::Cell { .. })
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        if self.path != other.path {
            return false;
        }
        match (&self.target, &other.target) {
            (Target::Cell { cell: a, .. }, Target::Cell { cell: b, .. }) => Weak::ptr_eq(a, b),
            (Target::DeadLetters(_), Target::DeadLetters(_)) => true,
            (Target::NoSender, Target::NoSender) => true,
            _ => false,
        }
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.path)
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.path)
    }
}
