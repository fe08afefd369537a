//! Dead Letters
//!
//! Sink for every envelope the runtime could not deliver: sends to stopped
//! actors, mailbox overflow, drains on stop, and explicit sends to the
//! dead-letter reference. Records keep the original payload, sender, intended
//! recipient and a short reason tag. A bounded ring retains the most recent
//! records; subscribers receive a cloneable summary of each one.

use crate::actor_ref::ActorRef;
use crate::ask::{AskRegister, AskTimeout};
use crate::message::{AnyMessage, Envelope};
use crate::metrics::SystemMetrics;
use crate::path::ActorPath;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Undelivered envelope
pub struct DeadLetter {
    pub message: AnyMessage,
    pub sender: ActorRef,
    pub recipient: ActorPath,
    pub reason: &'static str,
    pub at: SystemTime,
}

impl DeadLetter {
    /// Cloneable summary without the payload
    pub fn notice(&self) -> DeadLetterNotice {
        DeadLetterNotice {
            message_type: self.message.type_name(),
            sender: self.sender.path().clone(),
            recipient: self.recipient.clone(),
            reason: self.reason,
        }
    }
}

impl fmt::Debug for DeadLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetter")
            .field("message_type", &self.message.type_name())
            .field("sender", &self.sender.path())
            .field("recipient", &self.recipient)
            .field("reason", &self.reason)
            .finish()
    }
}

/// Dead-letter summary delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterNotice {
    pub message_type: &'static str,
    pub sender: ActorPath,
    pub recipient: ActorPath,
    pub reason: &'static str,
}

/// System dead-letter sink
pub struct DeadLetters {
    path: ActorPath,
    recent: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    total: AtomicU64,
    log: bool,
    subscribers: Mutex<Vec<Sender<DeadLetterNotice>>>,
    metrics: Arc<SystemMetrics>,
}

impl DeadLetters {
    pub(crate) fn new(capacity: usize, log: bool, metrics: Arc<SystemMetrics>) -> Self {
        Self {
            path: ActorPath::sentinel("deadLetters"),
            recent: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total: AtomicU64::new(0),
            log,
            subscribers: Mutex::new(Vec::new()),
            metrics,
        }
    }

    pub(crate) fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Record an undelivered envelope
    pub fn publish(&self, envelope: Envelope, recipient: &ActorPath, reason: &'static str) {
        let Envelope {
            mut message,
            sender,
        } = envelope;

        // A lost registration would otherwise leave its caller waiting for
        // the full ask timeout
        if let Some(register) = message.downcast_mut::<AskRegister>() {
            register.abandon(reason);
        }
        if let Some(timeout) = message.downcast_mut::<AskTimeout>() {
            timeout.expire();
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_dead_letter();

        let letter = DeadLetter {
            message,
            sender,
            recipient: recipient.clone(),
            reason,
            at: SystemTime::now(),
        };

        if self.log {
            warn!(
                recipient = %letter.recipient,
                sender = %letter.sender.path(),
                message_type = letter.message.type_name(),
                reason,
                "Dead letter"
            );
        } else {
            debug!(
                recipient = %letter.recipient,
                message_type = letter.message.type_name(),
                reason,
                "Dead letter"
            );
        }

        self.notify(&letter);

        let mut recent = self.recent.lock();
        if recent.len() >= self.capacity {
            recent.pop_front();
        }
        if self.capacity > 0 {
            recent.push_back(letter);
        }
    }

    fn notify(&self, letter: &DeadLetter) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        let notice = letter.notice();
        subscribers.retain(|tx| tx.send(notice.clone()).is_ok());
    }

    /// Total dead letters since system start
    pub fn count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Retained records, oldest first
    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }

    /// Take the retained records, oldest first
    pub fn drain(&self) -> Vec<DeadLetter> {
        self.recent.lock().drain(..).collect()
    }

    /// Summaries of the retained records without removing them
    pub fn notices(&self) -> Vec<DeadLetterNotice> {
        self.recent.lock().iter().map(DeadLetter::notice).collect()
    }

    /// Receive a notice for every future dead letter; dropping the
    /// receiver unsubscribes
    pub fn subscribe(&self) -> Receiver<DeadLetterNotice> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }
}

impl fmt::Debug for DeadLetters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeadLetters")
            .field("capacity", &self.capacity)
            .field("total", &self.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(capacity: usize) -> DeadLetters {
        DeadLetters::new(capacity, false, Arc::new(SystemMetrics::default()))
    }

    fn envelope(n: u32) -> Envelope {
        Envelope::new(AnyMessage::new(n), ActorRef::no_sender())
    }

    #[test]
    fn test_ring_keeps_most_recent() {
        let sink = sink(3);
        let recipient = ActorPath::root("app", "gone").unwrap();
        for n in 0..5 {
            sink.publish(envelope(n), &recipient, "actor-terminated");
        }

        assert_eq!(sink.count(), 5);
        assert_eq!(sink.len(), 3);

        let kept: Vec<u32> = sink
            .drain()
            .into_iter()
            .map(|letter| *letter.message.downcast_ref::<u32>().unwrap())
            .collect();
        assert_eq!(kept, vec![2, 3, 4]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_subscribers_receive_notices() {
        let sink = sink(4);
        let rx = sink.subscribe();
        let recipient = ActorPath::root("app", "a").unwrap();

        sink.publish(envelope(1), &recipient, "mailbox-overflow-drop-new");

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.reason, "mailbox-overflow-drop-new");
        assert_eq!(notice.message_type, "u32");
        assert_eq!(notice.recipient, recipient);

        drop(rx);
        sink.publish(envelope(2), &recipient, "actor-terminated");
        assert!(sink.subscribers.lock().is_empty());
    }

    #[test]
    fn test_zero_capacity_counts_only() {
        let sink = sink(0);
        let recipient = ActorPath::root("app", "a").unwrap();
        sink.publish(envelope(1), &recipient, "actor-stopped");
        assert_eq!(sink.count(), 1);
        assert!(sink.is_empty());
    }
}
