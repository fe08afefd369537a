//! Delivery Order and Turn Serialisation
//!
//! Envelopes from one sender are processed in send order, and no two
//! callbacks of the same actor ever overlap, whatever the throughput.

mod common;

use actor_runtime::{Actor, ActorResult, ActorSystem, Context, DispatcherKind, Props};
use common::{eventually, forward_props, recv_n, QUIET, TIMEOUT};
use crossbeam_channel::{unbounded, Receiver, Sender};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Single sender, single receiver: strict FIFO
#[test]
fn test_single_sender_fifo() {
    let system = ActorSystem::new("ordering-fifo").unwrap();
    let (tx, rx) = unbounded();
    let sink = system.actor_of("sink", forward_props::<u32>(tx)).unwrap();

    for n in 0..500u32 {
        sink.send(n);
    }

    let received = recv_n(&rx, 500);
    assert_eq!(received, (0..500).collect::<Vec<u32>>());
    assert!(rx.recv_timeout(QUIET).is_err());

    system.shutdown();
}

/// Several concurrent senders: each sender's stream stays in order
#[test]
fn test_per_sender_fifo_with_concurrent_senders() {
    let system = ActorSystem::new("ordering-multi").unwrap();
    let (tx, rx) = unbounded();
    let sink = system
        .actor_of("sink", forward_props::<(usize, u32)>(tx).with_throughput(3).unwrap())
        .unwrap();

    let senders: Vec<_> = (0..4)
        .map(|sender| {
            let sink = sink.clone();
            thread::spawn(move || {
                for seq in 0..200u32 {
                    sink.send((sender, seq));
                }
            })
        })
        .collect();
    for handle in senders {
        handle.join().unwrap();
    }

    let mut last: HashMap<usize, u32> = HashMap::new();
    for (sender, seq) in recv_n(&rx, 800) {
        if let Some(previous) = last.insert(sender, seq) {
            assert!(
                seq == previous + 1,
                "sender {} went from {} to {}",
                sender,
                previous,
                seq
            );
        }
    }
    assert_eq!(last.len(), 4);
    assert!(last.values().all(|&seq| seq == 199));

    system.shutdown();
}

struct Exclusive {
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    done: Sender<()>,
}

impl Actor for Exclusive {
    type Message = u32;

    fn receive(&mut self, _ctx: &mut Context<'_>, _n: u32) -> ActorResult {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        // Widen the window a concurrent turn would have to hit
        for _ in 0..200 {
            std::hint::spin_loop();
        }
        self.busy.store(false, Ordering::SeqCst);
        let _ = self.done.send(());
        Ok(())
    }
}

/// Throughput of one forces a reschedule per message; turns still never overlap
#[test]
fn test_turns_never_overlap() {
    let system = ActorSystem::new("ordering-serial").unwrap();
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = unbounded();

    let props = {
        let busy = busy.clone();
        let overlaps = overlaps.clone();
        Props::new(move || Exclusive {
            busy: busy.clone(),
            overlaps: overlaps.clone(),
            done: done_tx.clone(),
        })
        .with_throughput(1)
        .unwrap()
    };
    let actor = system.actor_of("exclusive", props).unwrap();

    let senders: Vec<_> = (0..4)
        .map(|_| {
            let actor = actor.clone();
            thread::spawn(move || {
                for n in 0..200u32 {
                    actor.send(n);
                }
            })
        })
        .collect();
    for handle in senders {
        handle.join().unwrap();
    }

    recv_n(&done_rx, 800);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert!(eventually(|| system.stats().messages_processed == 800));

    system.shutdown();
}

/// Reports `(label, n)` for every step; step 0 holds the turn open
struct Stepper {
    label: &'static str,
    steps: Sender<(&'static str, u32)>,
    entered: Sender<()>,
    release: Receiver<()>,
}

impl Actor for Stepper {
    type Message = u32;

    fn receive(&mut self, _ctx: &mut Context<'_>, n: u32) -> ActorResult {
        if n == 0 {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(TIMEOUT);
        }
        let _ = self.steps.send((self.label, n));
        Ok(())
    }
}

/// A backlogged actor yields its only worker between turns
#[test]
fn test_backlog_does_not_monopolise_worker() {
    let system = ActorSystem::builder("ordering-fair")
        .pool("solo", DispatcherKind::Pool, Some(1))
        .default_dispatcher("solo")
        .build()
        .unwrap();
    let (steps_tx, steps) = unbounded();
    let (entered_tx, entered) = unbounded();
    let (release_tx, release) = unbounded();
    let stepper = |label: &'static str| {
        let steps = steps_tx.clone();
        let entered = entered_tx.clone();
        let release = release.clone();
        Props::new(move || Stepper {
            label,
            steps: steps.clone(),
            entered: entered.clone(),
            release: release.clone(),
        })
    };
    let busy = system
        .actor_of("busy", stepper("busy").with_throughput(1).unwrap())
        .unwrap();
    let other = system.actor_of("other", stepper("other")).unwrap();

    // Hold the single worker while both mailboxes fill
    busy.send(0u32);
    entered.recv_timeout(TIMEOUT).unwrap();
    for n in 1..=1000u32 {
        busy.send(n);
    }
    other.send(1u32);
    release_tx.send(()).unwrap();

    let order = recv_n(&steps, 1002);
    let other_at = order
        .iter()
        .position(|(label, _)| *label == "other")
        .unwrap();
    assert!(
        other_at < 1001,
        "other actor waited for the whole backlog ({} busy steps)",
        other_at
    );
    let busy_steps: Vec<u32> = order
        .iter()
        .filter(|(label, _)| *label == "busy")
        .map(|(_, n)| *n)
        .collect();
    assert_eq!(busy_steps, (0..=1000).collect::<Vec<u32>>());

    system.shutdown();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_any_sequence_arrives_in_order(values in proptest::collection::vec(any::<u16>(), 1..200)) {
        let system = ActorSystem::new("ordering-prop").unwrap();
        let (tx, rx) = unbounded();
        let sink = system.actor_of("sink", forward_props::<u16>(tx)).unwrap();

        for value in &values {
            sink.send(*value);
        }
        let received = recv_n(&rx, values.len());
        system.shutdown();

        prop_assert_eq!(received, values);
    }
}
