//! Ask Pattern
//!
//! Request/response on top of one-way messaging. A per-system hub actor
//! owns the table of in-flight requests: the caller registers a request id
//! with the hub, then sends the target an [`AskRequest`] whose sender is the
//! hub. The target answers with an [`AskResponse`] carrying the same id. The
//! first of response or timeout completes the caller's promise; anything
//! later for that id is ignored.

use crate::actor::{Actor, Context};
use crate::actor_ref::ActorRef;
use crate::error::{ActorError, ActorResult};
use crate::message::AnyMessage;
use crate::promise::Promise;
use crate::system::ActorSystem;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Ask correlation identifier, unique per system
pub type RequestId = u64;

/// Request delivered to the asked actor
pub struct AskRequest {
    pub id: RequestId,
    pub payload: AnyMessage,
}

impl AskRequest {
    /// Answer with a value
    pub fn reply<R: Any + Send>(&self, ctx: &Context<'_>, value: R) {
        ctx.reply(AskResponse::success(self.id, value));
    }

    /// Answer with a failure
    pub fn reply_error(&self, ctx: &Context<'_>, error: ActorError) {
        ctx.reply(AskResponse::failure(self.id, error));
    }

    /// Take the payload as `P`, or get the request back on mismatch
    pub fn payload_as<P: Any>(self) -> Result<(RequestId, P), AskRequest> {
        let id = self.id;
        self.payload
            .downcast::<P>()
            .map(|payload| (id, payload))
            .map_err(|payload| AskRequest { id, payload })
    }
}

impl fmt::Debug for AskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskRequest")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Answer to an [`AskRequest`]
#[derive(Debug)]
pub struct AskResponse {
    pub id: RequestId,
    pub result: Result<AnyMessage, ActorError>,
}

impl AskResponse {
    pub fn success<R: Any + Send>(id: RequestId, value: R) -> Self {
        Self {
            id,
            result: Ok(AnyMessage::new(value)),
        }
    }

    pub fn failure(id: RequestId, error: ActorError) -> Self {
        Self { id, result: Err(error) }
    }
}

/// Completion side of a typed promise, erased for the hub table
pub(crate) trait PendingReply: Send {
    fn complete(self: Box<Self>, result: Result<AnyMessage, ActorError>);

    /// Second completion handle onto the same promise
    fn handle(&self) -> Box<dyn PendingReply>;

    fn is_done(&self) -> bool;
}

struct TypedReply<R> {
    promise: Promise<R>,
}

impl<R: Any + Send + Clone> PendingReply for TypedReply<R> {
    fn complete(self: Box<Self>, result: Result<AnyMessage, ActorError>) {
        match result {
            Ok(message) => {
                let actual = message.type_name();
                match message.downcast::<R>() {
                    Ok(value) => {
                        self.promise.try_succeed(value);
                    }
                    Err(_) => {
                        self.promise
                            .try_fail(ActorError::unexpected_reply(type_name::<R>(), actual));
                    }
                }
            }
            Err(error) => {
                self.promise.try_fail(error);
            }
        }
    }

    fn handle(&self) -> Box<dyn PendingReply> {
        Box::new(TypedReply {
            promise: self.promise.clone(),
        })
    }

    fn is_done(&self) -> bool {
        self.promise.is_done()
    }
}

/// Hub registration; fails its promise if dropped undelivered
pub(crate) struct AskRegister {
    id: RequestId,
    pending: Option<Box<dyn PendingReply>>,
    timeout: Duration,
}

impl AskRegister {
    /// Fail the caller now instead of at the timeout
    pub(crate) fn abandon(&mut self, reason: &str) {
        if let Some(pending) = self.pending.take() {
            pending.complete(Err(ActorError::ask_undeliverable(self.id, reason)));
        }
    }
}

impl Drop for AskRegister {
    fn drop(&mut self) {
        self.abandon("registration dropped");
    }
}

/// Self-addressed timer message; fails its promise if it never reaches
/// the hub
pub(crate) struct AskTimeout {
    id: RequestId,
    timeout: Duration,
    expiry: Option<Box<dyn PendingReply>>,
}

impl AskTimeout {
    /// Fail the caller with the timeout it asked for
    pub(crate) fn expire(&mut self) {
        if let Some(expiry) = self.expiry.take() {
            expiry.complete(Err(ActorError::ask_timeout(
                self.id,
                self.timeout.as_millis() as u64,
            )));
        }
    }
}

impl Drop for AskTimeout {
    fn drop(&mut self) {
        self.expire();
    }
}

impl fmt::Debug for AskTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskTimeout")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub(crate) enum HubMessage {
    Register(AskRegister),
    Timeout(AskTimeout),
    Response(AskResponse),
}

/// Per-system table of in-flight asks
pub(crate) struct AskHub {
    inflight: HashMap<RequestId, Box<dyn PendingReply>>,
    sweep_at: usize,
}

/// Table size that triggers the first sweep of expired entries
const SWEEP_FLOOR: usize = 1024;

impl AskHub {
    pub(crate) fn new() -> Self {
        Self {
            inflight: HashMap::new(),
            sweep_at: SWEEP_FLOOR,
        }
    }

    /// Drop entries whose promise was completed outside the hub, such as
    /// by a timeout lost on the way here
    fn sweep(&mut self) {
        if self.inflight.len() < self.sweep_at {
            return;
        }
        let before = self.inflight.len();
        self.inflight.retain(|_, pending| !pending.is_done());
        self.sweep_at = (self.inflight.len() * 2).max(SWEEP_FLOOR);
        debug!(
            removed = before - self.inflight.len(),
            inflight = self.inflight.len(),
            "Ask table swept"
        );
    }

    fn fail_all(&mut self, reason: &str) {
        for (id, pending) in self.inflight.drain() {
            pending.complete(Err(ActorError::ask_undeliverable(id, reason)));
        }
    }
}

impl Actor for AskHub {
    type Message = HubMessage;

    fn accept(message: AnyMessage) -> Result<HubMessage, AnyMessage> {
        message
            .accept_as(HubMessage::Register)
            .or_else(|m| m.accept_as(HubMessage::Response))
            .or_else(|m| m.accept_as(HubMessage::Timeout))
    }

    fn receive(&mut self, ctx: &mut Context<'_>, message: HubMessage) -> ActorResult {
        match message {
            HubMessage::Register(mut register) => {
                if let Some(pending) = register.pending.take() {
                    let expiry = pending.handle();
                    self.inflight.insert(register.id, pending);
                    ctx.schedule_once(
                        register.timeout,
                        AskTimeout {
                            id: register.id,
                            timeout: register.timeout,
                            expiry: Some(expiry),
                        },
                    );
                    self.sweep();
                }
            }
            HubMessage::Timeout(mut timeout) => {
                if self.inflight.remove(&timeout.id).is_some() {
                    debug!(request_id = timeout.id, "Ask timed out");
                    timeout.expire();
                }
            }
            HubMessage::Response(response) => match self.inflight.remove(&response.id) {
                Some(pending) => pending.complete(response.result),
                None => debug!(request_id = response.id, "Late or duplicate ask response ignored"),
            },
        }
        Ok(())
    }

    fn pre_restart(&mut self, _ctx: &mut Context<'_>, cause: &ActorError) -> ActorResult {
        warn!(inflight = self.inflight.len(), error = %cause, "Ask hub restarting, failing in-flight requests");
        self.fail_all("ask hub restarted");
        Ok(())
    }

    fn post_stop(&mut self, _ctx: &mut Context<'_>) -> ActorResult {
        self.fail_all("ask hub stopped");
        Ok(())
    }
}

/// Send `payload` to `target` and get a promise for its typed reply
///
/// The target sees an [`AskRequest`] and answers with
/// [`AskRequest::reply`]. The promise fails with `AskTimeout` when no reply
/// arrives within `timeout`, and with `UnexpectedReply` when the reply is
/// not an `R`.
pub fn ask<R, P>(system: &ActorSystem, target: &ActorRef, payload: P, timeout: Duration) -> Promise<R>
where
    R: Any + Send + Clone,
    P: Any + Send,
{
    let promise = Promise::new();
    let Some(hub) = system.ask_hub().filter(|_| !system.is_terminated()) else {
        promise.try_fail(ActorError::system_terminated(system.name()));
        return promise;
    };

    let id = system.next_request_id();
    // Registration is enqueued before the request, so the hub always
    // knows the id when the response arrives
    hub.send(AskRegister {
        id,
        pending: Some(Box::new(TypedReply {
            promise: promise.clone(),
        })),
        timeout,
    });
    target.tell(
        AskRequest {
            id,
            payload: AnyMessage::new(payload),
        },
        hub,
    );
    promise
}

/// [`ask`] with the system's configured default timeout
pub fn ask_default<R, P>(system: &ActorSystem, target: &ActorRef, payload: P) -> Promise<R>
where
    R: Any + Send + Clone,
    P: Any + Send,
{
    ask(system, target, payload, system.default_ask_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_reply_matches_type() {
        let promise: Promise<u32> = Promise::new();
        let pending: Box<dyn PendingReply> = Box::new(TypedReply {
            promise: promise.clone(),
        });
        pending.complete(Ok(AnyMessage::new(5u32)));
        assert_eq!(promise.try_get().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_typed_reply_rejects_wrong_type() {
        let promise: Promise<u32> = Promise::new();
        let pending: Box<dyn PendingReply> = Box::new(TypedReply {
            promise: promise.clone(),
        });
        pending.complete(Ok(AnyMessage::new("text")));
        match promise.try_get().unwrap().unwrap_err() {
            ActorError::UnexpectedReply { expected, actual } => {
                assert_eq!(expected, "u32");
                assert_eq!(actual, "&str");
            }
            other => panic!("Expected UnexpectedReply, got {:?}", other),
        }
    }

    #[test]
    fn test_dropped_registration_fails_promise() {
        let promise: Promise<u32> = Promise::new();
        let register = AskRegister {
            id: 9,
            pending: Some(Box::new(TypedReply {
                promise: promise.clone(),
            })),
            timeout: Duration::from_secs(1),
        };
        drop(register);
        assert!(matches!(
            promise.try_get().unwrap(),
            Err(ActorError::AskUndeliverable { request_id: 9, .. })
        ));
    }

    #[test]
    fn test_lost_timeout_fails_promise() {
        let promise: Promise<u32> = Promise::new();
        let pending: Box<dyn PendingReply> = Box::new(TypedReply {
            promise: promise.clone(),
        });
        let timeout = AskTimeout {
            id: 4,
            timeout: Duration::from_millis(50),
            expiry: Some(pending.handle()),
        };
        assert!(!pending.is_done());

        drop(timeout);
        assert!(pending.is_done());
        assert!(matches!(
            promise.try_get().unwrap(),
            Err(ActorError::AskTimeout {
                request_id: 4,
                timeout_ms: 50
            })
        ));
    }

    #[test]
    fn test_hub_sweeps_expired_entries() {
        let mut hub = AskHub::new();
        let mut promises = Vec::new();
        for id in 0..SWEEP_FLOOR as u64 {
            let promise: Promise<u32> = Promise::new();
            hub.inflight.insert(
                id,
                Box::new(TypedReply {
                    promise: promise.clone(),
                }),
            );
            promises.push(promise);
        }
        for promise in promises.iter().skip(1) {
            promise.try_fail(ActorError::failed("expired"));
        }

        hub.sweep();
        assert_eq!(hub.inflight.len(), 1);
        assert!(hub.inflight.contains_key(&0));
        assert_eq!(hub.sweep_at, SWEEP_FLOOR);
    }

    #[test]
    fn test_request_payload_downcast() {
        let request = AskRequest {
            id: 3,
            payload: AnyMessage::new(String::from("ping")),
        };
        let request = request.payload_as::<u32>().unwrap_err();
        let (id, payload) = request.payload_as::<String>().unwrap();
        assert_eq!(id, 3);
        assert_eq!(payload, "ping");
    }
}
