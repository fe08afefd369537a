//! Shared behaviours and helpers for the integration suites

#![allow(dead_code)]

use actor_runtime::{Actor, ActorRef, ActorResult, Context, Props, Signal};
use crossbeam_channel::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound for anything the runtime does asynchronously
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Window in which "nothing else arrives" is checked
pub const QUIET: Duration = Duration::from_millis(200);

/// Poll `condition` until it holds or `TIMEOUT` passes
pub fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Collect exactly `n` values or panic
pub fn recv_n<T>(rx: &Receiver<T>, n: usize) -> Vec<T> {
    (0..n)
        .map(|i| {
            rx.recv_timeout(TIMEOUT)
                .unwrap_or_else(|_| panic!("Timed out waiting for value {} of {}", i + 1, n))
        })
        .collect()
}

/// Forwards every message it receives into a channel
pub struct Forward<M> {
    tx: Sender<M>,
}

impl<M: Send + 'static> Actor for Forward<M> {
    type Message = M;

    fn receive(&mut self, _ctx: &mut Context<'_>, message: M) -> ActorResult {
        let _ = self.tx.send(message);
        Ok(())
    }
}

pub fn forward_props<M: Send + 'static>(tx: Sender<M>) -> Props<Forward<M>> {
    Props::new(move || Forward { tx: tx.clone() })
}

/// Messages for [`Gated`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMsg {
    /// Park the turn until the test releases it
    Block,
    Item(u32),
}

/// Behaviour whose turn can be held open, so the mailbox fills up behind it
pub struct Gated {
    entered: Sender<()>,
    release: Receiver<()>,
    seen: Sender<u32>,
}

impl Actor for Gated {
    type Message = GateMsg;

    fn receive(&mut self, _ctx: &mut Context<'_>, message: GateMsg) -> ActorResult {
        match message {
            GateMsg::Block => {
                let _ = self.entered.send(());
                let _ = self.release.recv_timeout(TIMEOUT);
            }
            GateMsg::Item(n) => {
                let _ = self.seen.send(n);
            }
        }
        Ok(())
    }
}

/// Handles to a [`Gated`] actor's channels
pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
    pub seen: Receiver<u32>,
}

pub fn gated_props() -> (Props<Gated>, Gate) {
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let (seen_tx, seen_rx) = crossbeam_channel::unbounded();
    let props = Props::new(move || Gated {
        entered: entered_tx.clone(),
        release: release_rx.clone(),
        seen: seen_tx.clone(),
    });
    let gate = Gate {
        entered: entered_rx,
        release: release_tx,
        seen: seen_rx,
    };
    (props, gate)
}

/// Block `actor` inside a turn and wait until it is parked
pub fn park(actor: &ActorRef, gate: &Gate) {
    actor.send(GateMsg::Block);
    gate.entered
        .recv_timeout(TIMEOUT)
        .expect("actor never entered the blocking turn");
}

/// Watches a target from `pre_start` and reports every signal it gets
pub struct Watcher {
    target: ActorRef,
    signals: Sender<Signal>,
}

/// Commands understood by [`Watcher`]
#[derive(Debug)]
pub enum WatchCmd {
    Watch(ActorRef),
    Unwatch(ActorRef),
}

impl Actor for Watcher {
    type Message = WatchCmd;

    fn pre_start(&mut self, ctx: &mut Context<'_>) -> ActorResult {
        ctx.watch(&self.target);
        Ok(())
    }

    fn receive(&mut self, ctx: &mut Context<'_>, command: WatchCmd) -> ActorResult {
        match command {
            WatchCmd::Watch(target) => ctx.watch(&target),
            WatchCmd::Unwatch(target) => ctx.unwatch(&target),
        }
        Ok(())
    }

    fn on_signal(&mut self, _ctx: &mut Context<'_>, signal: Signal) -> ActorResult {
        let _ = self.signals.send(signal);
        Ok(())
    }
}

pub fn watcher_props(target: ActorRef, signals: Sender<Signal>) -> Props<Watcher> {
    Props::new(move || Watcher {
        target: target.clone(),
        signals: signals.clone(),
    })
}
