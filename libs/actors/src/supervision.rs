//! Supervision
//!
//! A supervisor strategy is a pure, stateless decision: given the failure
//! cause, stop the actor or restart it after a backoff. Strategies are
//! shared freely between cells.

use crate::error::ActorError;
use runtime_config::defaults::supervision::{BACKOFF_BASE_MS, BACKOFF_CEILING_MS, BACKOFF_MAX_EXPONENT};
use std::sync::Arc;
use std::time::Duration;

/// Supervision directive for a failed actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Stop the actor and its children
    Stop,
    /// Rebuild the behaviour after `backoff`; zero selects the default
    /// exponential backoff
    Restart { backoff: Duration },
}

impl Directive {
    /// Restart with the default exponential backoff
    pub fn restart() -> Self {
        Directive::Restart {
            backoff: Duration::ZERO,
        }
    }

    /// Restart after a fixed delay
    pub fn restart_after(backoff: Duration) -> Self {
        Directive::Restart { backoff }
    }
}

/// Decides how a failed actor recovers
pub trait SupervisorStrategy: Send + Sync + 'static {
    fn decide(&self, cause: &ActorError) -> Directive;

    /// Label used in logs
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> SupervisorStrategy for F
where
    F: Fn(&ActorError) -> Directive + Send + Sync + 'static,
{
    fn decide(&self, cause: &ActorError) -> Directive {
        self(cause)
    }
}

/// Restart on every failure with exponential backoff (the system default)
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartWithBackoff;

impl SupervisorStrategy for RestartWithBackoff {
    fn decide(&self, _cause: &ActorError) -> Directive {
        Directive::restart()
    }

    fn name(&self) -> &'static str {
        "restart-with-backoff"
    }
}

/// Stop on every failure
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnFailure;

impl SupervisorStrategy for StopOnFailure {
    fn decide(&self, _cause: &ActorError) -> Directive {
        Directive::Stop
    }

    fn name(&self) -> &'static str {
        "stop-on-failure"
    }
}

/// Restart on every failure after a fixed delay
#[derive(Debug, Clone, Copy)]
pub struct RestartWithFixedBackoff(pub Duration);

impl SupervisorStrategy for RestartWithFixedBackoff {
    fn decide(&self, _cause: &ActorError) -> Directive {
        Directive::restart_after(self.0)
    }

    fn name(&self) -> &'static str {
        "restart-with-fixed-backoff"
    }
}

/// Shared handle to the default strategy
pub fn default_strategy() -> Arc<dyn SupervisorStrategy> {
    Arc::new(RestartWithBackoff)
}

/// Shared handle to the stop-on-any-failure strategy
pub fn stop_on_failure() -> Arc<dyn SupervisorStrategy> {
    Arc::new(StopOnFailure)
}

/// Shared handle to a fixed-backoff restart strategy
pub fn restart_with_fixed_backoff(backoff: Duration) -> Arc<dyn SupervisorStrategy> {
    Arc::new(RestartWithFixedBackoff(backoff))
}

/// Exponential restart delay: `min(5000ms, 100ms * 2^min(6, restarts))`
pub fn default_backoff(restarts: u32) -> Duration {
    let exponent = restarts.min(BACKOFF_MAX_EXPONENT);
    let millis = BACKOFF_BASE_MS.saturating_mul(1u64 << exponent);
    Duration::from_millis(millis.min(BACKOFF_CEILING_MS))
}

/// Delay actually applied for a restart directive
pub fn restart_delay(requested: Duration, restarts: u32) -> Duration {
    if requested.is_zero() {
        default_backoff(restarts)
    } else {
        requested
    }
}
