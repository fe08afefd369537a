//! Dead Letters
//!
//! Every envelope the runtime cannot deliver ends up in the sink with its
//! payload, sender, intended recipient and a reason tag.

mod common;

use actor_runtime::{ActorSystem, DeadLetterSettings};
use common::{eventually, forward_props, gated_props, park, GateMsg, QUIET, TIMEOUT};
use crossbeam_channel::unbounded;

#[test_log::test]
fn test_unhandled_message_type() {
    let system = ActorSystem::new("dead-unhandled").unwrap();
    let (tx, rx) = unbounded();
    let numbers = system.actor_of("numbers", forward_props::<u32>(tx)).unwrap();
    let (probe_tx, _probe_rx) = unbounded();
    let probe = system.actor_of("probe", forward_props::<u32>(probe_tx)).unwrap();

    numbers.tell(String::from("not a number"), &probe);
    numbers.send(7u32);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 7);

    assert!(eventually(|| system.dead_letter_sink().len() == 1));
    let letter = system.dead_letter_sink().drain().remove(0);
    assert_eq!(letter.reason, "unhandled-message");
    assert_eq!(letter.recipient, *numbers.path());
    assert_eq!(letter.sender, probe);
    assert_eq!(
        letter.message.downcast_ref::<String>().map(String::as_str),
        Some("not a number")
    );
    assert!(numbers.is_alive());

    system.shutdown();
}

#[test]
fn test_explicit_send_to_dead_letters() {
    let system = ActorSystem::new("dead-explicit").unwrap();
    let notices = system.dead_letter_sink().subscribe();

    let sink = system.dead_letters();
    assert!(sink.is_dead_letters());
    sink.send(99u64);

    let notice = notices.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(notice.reason, "sent-to-dead-letters");
    assert_eq!(notice.message_type, "u64");
    assert_eq!(notice.sender.as_str(), "dead:/dead/noSender");
    assert_eq!(system.stats().dead_letters, 1);

    system.shutdown();
}

#[test]
fn test_send_to_stopped_actor() {
    let system = ActorSystem::new("dead-stopped").unwrap();
    let (tx, _rx) = unbounded();
    let gone = system.actor_of("gone", forward_props::<u32>(tx)).unwrap();
    system.stop(&gone);
    assert!(eventually(|| system.resolve("/gone").is_dead_letters()));

    gone.send(1u32);
    let letter = system.dead_letter_sink().drain().pop().unwrap();
    assert!(["actor-terminated", "actor-stopping"].contains(&letter.reason));
    assert_eq!(letter.recipient.as_str(), "dead-stopped:/gone");

    system.shutdown();
}

/// Queued envelopes are drained to the sink when the actor stops
#[test]
fn test_stop_drains_mailbox() {
    let system = ActorSystem::new("dead-drain").unwrap();
    let (props, gate) = gated_props();
    let actor = system.actor_of("busy", props).unwrap();

    park(&actor, &gate);
    for n in 1..=3 {
        actor.send(GateMsg::Item(n));
    }
    system.stop(&actor);

    let drained: Vec<u32> = system
        .dead_letter_sink()
        .drain()
        .into_iter()
        .filter(|letter| letter.reason == "actor-stopped")
        .filter_map(|letter| match letter.message.downcast_ref::<GateMsg>() {
            Some(GateMsg::Item(n)) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(drained, vec![1, 2, 3]);

    gate.release.send(()).unwrap();
    assert!(gate.seen.recv_timeout(QUIET).is_err());
    assert!(eventually(|| system.resolve("/busy").is_dead_letters()));

    system.shutdown();
}

/// The sink keeps only the most recent records but counts all of them
#[test]
fn test_retention_is_bounded() {
    let system = ActorSystem::builder("dead-bounded")
        .dead_letter_settings(DeadLetterSettings {
            capacity: 3,
            log: false,
        })
        .build()
        .unwrap();

    for n in 0..5u32 {
        system.dead_letters().send(n);
    }

    let sink = system.dead_letter_sink();
    assert_eq!(sink.count(), 5);
    assert_eq!(sink.len(), 3);
    let kept: Vec<u32> = sink
        .drain()
        .iter()
        .filter_map(|letter| letter.message.downcast_ref::<u32>().copied())
        .collect();
    assert_eq!(kept, vec![2, 3, 4]);
    assert!(sink.is_empty());

    system.shutdown();
}

#[test]
fn test_subscribers_see_every_notice() {
    let system = ActorSystem::new("dead-subscribe").unwrap();
    let first = system.dead_letter_sink().subscribe();
    let second = system.dead_letter_sink().subscribe();

    system.dead_letters().send("one");
    drop(second);
    system.dead_letters().send("two");

    assert_eq!(first.recv_timeout(TIMEOUT).unwrap().message_type, "&str");
    assert_eq!(first.recv_timeout(TIMEOUT).unwrap().message_type, "&str");
    assert_eq!(system.dead_letter_sink().notices().len(), 2);

    system.shutdown();
}
