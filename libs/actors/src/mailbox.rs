//! Bounded Mailbox
//!
//! Multi-producer, single-consumer FIFO queue with a logical capacity and an
//! overflow policy. Producers never block: when the queue is full the policy
//! decides what is rejected, and the rejected envelope is handed back to the
//! caller for dead-letter routing.
//!
//! The physical queue is an unbounded crossbeam channel; the bound is
//! enforced by an atomic size that counts messages only. Under the `fail`
//! policy a single overflow marker may sit in the queue in addition to the
//! `capacity` messages.

use crate::message::Envelope;
use crossbeam_channel::{unbounded, Receiver, Sender};
use runtime_config::OverflowPolicy;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Queue slot
#[derive(Debug)]
pub(crate) enum Slot {
    Message(Envelope),
    OverflowMarker,
}

/// Result of an [`Mailbox::offer`]
#[derive(Debug)]
pub(crate) struct Offer {
    /// Envelopes that did not make it into (or were evicted from) the queue
    pub(crate) rejected: Vec<(Envelope, &'static str)>,
    /// Queue gained a slot the consumer must process
    pub(crate) wake: bool,
}

impl Offer {
    fn enqueued() -> Self {
        Self {
            rejected: Vec::new(),
            wake: true,
        }
    }

    fn rejected(envelope: Envelope, reason: &'static str, wake: bool) -> Self {
        Self {
            rejected: vec![(envelope, reason)],
            wake,
        }
    }
}

/// Bounded envelope queue
pub(crate) struct Mailbox {
    tx: Sender<Slot>,
    rx: Receiver<Slot>,
    size: AtomicUsize,
    capacity: usize,
    policy: OverflowPolicy,
    marker_pending: AtomicBool,
}

impl Mailbox {
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            size: AtomicUsize::new(0),
            capacity,
            policy,
            marker_pending: AtomicBool::new(false),
        }
    }

    /// Try to reserve one message slot
    fn reserve(&self) -> bool {
        self.size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size < self.capacity).then_some(size + 1)
            })
            .is_ok()
    }

    fn push(&self, slot: Slot) {
        // The receiver lives as long as the mailbox, so send cannot fail
        let _ = self.tx.send(slot);
    }

    /// Enqueue under the overflow policy
    pub(crate) fn offer(&self, envelope: Envelope) -> Offer {
        if self.reserve() {
            self.push(Slot::Message(envelope));
            return Offer::enqueued();
        }

        match self.policy {
            OverflowPolicy::DropNew => Offer::rejected(envelope, "mailbox-overflow-drop-new", false),
            OverflowPolicy::DropOld => self.evict_oldest(envelope),
            OverflowPolicy::Fail => {
                let marker = !self.marker_pending.swap(true, Ordering::AcqRel);
                if marker {
                    self.push(Slot::OverflowMarker);
                }
                Offer::rejected(envelope, "mailbox-overflow-fail-drop", marker)
            }
        }
    }

    /// Drop-old: evict the head and retry once; degrade to drop-new when a
    /// concurrent producer takes the freed slot first
    fn evict_oldest(&self, envelope: Envelope) -> Offer {
        let mut offer = Offer {
            rejected: Vec::with_capacity(1),
            wake: false,
        };
        if let Some(evicted) = self.poll_message() {
            offer.rejected.push((evicted, "mailbox-overflow-drop-old"));
        }

        if self.reserve() {
            self.push(Slot::Message(envelope));
            offer.wake = true;
        } else {
            offer
                .rejected
                .push((envelope, "mailbox-overflow-drop-new-degraded"));
        }
        offer
    }

    /// Next slot, or `None` when empty
    pub(crate) fn poll(&self) -> Option<Slot> {
        let slot = self.rx.try_recv().ok()?;
        if matches!(slot, Slot::Message(_)) {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        Some(slot)
    }

    /// Next message; drop-old never enqueues markers, so none are skipped
    fn poll_message(&self) -> Option<Envelope> {
        loop {
            if let Slot::Message(envelope) = self.poll()? {
                return Some(envelope);
            }
        }
    }

    /// Remove every queued message
    pub(crate) fn drain(&self) -> Vec<Envelope> {
        let mut drained = Vec::new();
        while let Some(slot) = self.poll() {
            if let Slot::Message(envelope) = slot {
                drained.push(envelope);
            }
        }
        self.marker_pending.store(false, Ordering::Release);
        drained
    }

    /// Marker consumed; the next overflow episode may raise a new failure
    pub(crate) fn clear_overflow_marker(&self) {
        self.marker_pending.store(false, Ordering::Release);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Queued messages, excluding the marker
    pub(crate) fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor_ref::ActorRef;
    use crate::message::AnyMessage;

    fn envelope(n: u32) -> Envelope {
        Envelope::new(AnyMessage::new(n), ActorRef::no_sender())
    }

    fn value(slot: Slot) -> u32 {
        match slot {
            Slot::Message(envelope) => *envelope.message.downcast_ref::<u32>().unwrap(),
            Slot::OverflowMarker => panic!("Expected message, got overflow marker"),
        }
    }

    fn rejected_values(offer: &Offer) -> Vec<(u32, &'static str)> {
        offer
            .rejected
            .iter()
            .map(|(env, reason)| (*env.message.downcast_ref::<u32>().unwrap(), *reason))
            .collect()
    }

    #[test]
    fn test_fifo_within_capacity() {
        let mailbox = Mailbox::new(4, OverflowPolicy::DropNew);
        for n in 0..4 {
            assert!(mailbox.offer(envelope(n)).rejected.is_empty());
        }
        assert_eq!(mailbox.len(), 4);

        let order: Vec<u32> = std::iter::from_fn(|| mailbox.poll()).map(value).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_drop_new_rejects_incoming() {
        let mailbox = Mailbox::new(2, OverflowPolicy::DropNew);
        mailbox.offer(envelope(1));
        mailbox.offer(envelope(2));

        let offer = mailbox.offer(envelope(3));
        assert!(!offer.wake);
        assert_eq!(rejected_values(&offer), vec![(3, "mailbox-overflow-drop-new")]);
        assert_eq!(mailbox.len(), 2);
    }

    #[test]
    fn test_drop_old_evicts_head() {
        let mailbox = Mailbox::new(2, OverflowPolicy::DropOld);
        mailbox.offer(envelope(1));
        mailbox.offer(envelope(2));

        let offer = mailbox.offer(envelope(3));
        assert!(offer.wake);
        assert_eq!(rejected_values(&offer), vec![(1, "mailbox-overflow-drop-old")]);

        let order: Vec<u32> = std::iter::from_fn(|| mailbox.poll()).map(value).collect();
        assert_eq!(order, vec![2, 3]);
    }

    #[test]
    fn test_fail_enqueues_single_marker_per_episode() {
        let mailbox = Mailbox::new(1, OverflowPolicy::Fail);
        mailbox.offer(envelope(1));

        let first = mailbox.offer(envelope(2));
        assert!(first.wake);
        assert_eq!(rejected_values(&first), vec![(2, "mailbox-overflow-fail-drop")]);

        let second = mailbox.offer(envelope(3));
        assert!(!second.wake);
        assert_eq!(rejected_values(&second), vec![(3, "mailbox-overflow-fail-drop")]);

        assert_eq!(value(mailbox.poll().unwrap()), 1);
        assert!(matches!(mailbox.poll(), Some(Slot::OverflowMarker)));
        assert!(mailbox.poll().is_none());

        // New episode after the marker is consumed
        mailbox.clear_overflow_marker();
        mailbox.offer(envelope(4));
        assert!(mailbox.offer(envelope(5)).wake);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mailbox = Mailbox::new(8, OverflowPolicy::DropNew);
        for n in 0..5 {
            mailbox.offer(envelope(n));
        }
        let drained = mailbox.drain();
        assert_eq!(drained.len(), 5);
        assert_eq!(mailbox.len(), 0);
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.capacity(), 8);
        assert_eq!(mailbox.policy(), OverflowPolicy::DropNew);
    }
}
