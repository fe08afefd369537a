//! Scheduler
//!
//! Delayed one-shot delivery backed by a single-worker tokio runtime. Used
//! for restart backoff, ask timeouts and behaviour timers.

use crate::actor_ref::ActorRef;
use crate::error::{ActorError, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Handle to a scheduled task
#[derive(Debug)]
pub struct Cancellable {
    abort: Option<AbortHandle>,
}

impl Cancellable {
    fn inert() -> Self {
        Self { abort: None }
    }

    /// Cancel if not yet fired; a no-op afterwards
    pub fn cancel(&self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Fired, cancelled, or never scheduled
    pub fn is_finished(&self) -> bool {
        self.abort.as_ref().map(AbortHandle::is_finished).unwrap_or(true)
    }
}

/// Single-threaded timer service
pub struct Scheduler {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new(system: &str) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{}-sched", system))
            .enable_time()
            .build()
            .map_err(|e| ActorError::system(format!("Failed to build scheduler: {}", e)))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
        })
    }

    /// Run `task` on the scheduler thread after `delay`
    pub fn schedule_task<F>(&self, delay: Duration, task: F) -> Cancellable
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            trace!("Scheduler closed, dropping task");
            return Cancellable::inert();
        }
        let handle = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Cancellable {
            abort: Some(handle.abort_handle()),
        }
    }

    /// Deliver `message` to `target` after `delay`
    pub fn schedule_once<M: Any + Send>(
        &self,
        delay: Duration,
        target: &ActorRef,
        message: M,
        sender: &ActorRef,
    ) -> Cancellable {
        let target = target.clone();
        let sender = sender.clone();
        self.schedule_task(delay, move || target.tell(message, &sender))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drop every pending task; later calls are no-ops
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        debug!("Scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("closed", &self.is_closed())
            .finish()
    }
}
