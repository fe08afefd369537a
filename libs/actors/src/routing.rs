//! Key-based sharding
//!
//! [`ShardRouter`] forwards each [`Route`] to a child named after the
//! route's key, creating the child from a factory on first use. The
//! original sender is preserved, so replies go straight back to the caller.

use crate::actor::{Actor, Context};
use crate::error::ActorResult;
use crate::message::{AnyMessage, Envelope};
use crate::path::validate_name;
use crate::props::Props;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Payload addressed to the shard owning `key`
pub struct Route {
    pub key: String,
    pub payload: AnyMessage,
}

impl Route {
    pub fn new<M: Any + Send>(key: impl Into<String>, payload: M) -> Self {
        Self {
            key: key.into(),
            payload: AnyMessage::new(payload),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("key", &self.key)
            .field("payload", &self.payload)
            .finish()
    }
}

type ShardFactory<B> = Arc<dyn Fn(&str) -> Props<B> + Send + Sync + 'static>;

/// Router creating one child per distinct key
pub struct ShardRouter<B: Actor> {
    factory: ShardFactory<B>,
}

impl<B: Actor> ShardRouter<B> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Props<B> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
        }
    }

    /// Props producing a router around `factory`
    pub fn props<F>(factory: F) -> Props<Self>
    where
        F: Fn(&str) -> Props<B> + Send + Sync + 'static,
    {
        let factory: ShardFactory<B> = Arc::new(factory);
        Props::new(move || ShardRouter {
            factory: factory.clone(),
        })
    }
}

impl<B: Actor> Actor for ShardRouter<B> {
    type Message = Route;

    fn receive(&mut self, ctx: &mut Context<'_>, route: Route) -> ActorResult {
        let Route { key, payload } = route;

        if let Err(e) = validate_name(&key) {
            warn!(router = %ctx.path(), key = %key, error = %e, "Invalid shard key");
            ctx.system().dead_letter_sink().publish(
                Envelope::new(payload, ctx.sender().clone()),
                ctx.path(),
                "invalid-shard-key",
            );
            return Ok(());
        }

        let shard = match ctx.child(&key) {
            Some(shard) => shard,
            None => ctx.actor_of(&key, (self.factory)(&key))?,
        };
        shard.tell_any(payload, ctx.sender());
        Ok(())
    }
}
