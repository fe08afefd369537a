//! Dispatchers
//!
//! An executor runs cell turns. The runtime ships three flavours:
//!
//! - [`PoolDispatcher`]: tokio-backed worker pool, either a fixed set of
//!   workers for non-blocking behaviours or an elastic blocking pool
//! - [`InlineExecutor`]: runs the task on the calling thread
//! - [`MainThreadExecutor`]: bound to the thread that created it; tasks
//!   submitted from other threads queue until that thread pumps them
//!
//! [`Dispatchers`] is the per-system registry of named executors with a
//! default fallback for unknown identifiers.

use crate::error::{ActorError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::Mutex;
use runtime_config::defaults::dispatch::{MAX_BLOCKING_THREADS, MIN_POOL_THREADS};
use runtime_config::DispatcherKind;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info, warn};

/// Unit of work submitted to an executor
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks; implementations decide on which thread
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: Task);

    /// Stop accepting work; tasks submitted afterwards are dropped
    fn shutdown(&self) {}
}

/// Worker count for the default `cpu` pool
pub fn default_pool_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_POOL_THREADS)
        .max(MIN_POOL_THREADS)
}

/// Tokio-backed dispatcher
pub struct PoolDispatcher {
    id: String,
    kind: DispatcherKind,
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    closed: AtomicBool,
}

impl PoolDispatcher {
    /// Build a pool; `threads` is the worker count (pool) or the thread
    /// ceiling (blocking)
    pub fn new(system: &str, id: &str, kind: DispatcherKind, threads: Option<usize>) -> Result<Self> {
        let prefix = format!("{}-{}", system, id);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut builder = Builder::new_multi_thread();
        builder.thread_name_fn(move || {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            format!("{}-{}", prefix, n)
        });

        let threads = match kind {
            DispatcherKind::Pool => {
                let workers = threads.unwrap_or_else(default_pool_threads);
                builder.worker_threads(workers);
                workers
            }
            DispatcherKind::Blocking => {
                let ceiling = threads.unwrap_or(MAX_BLOCKING_THREADS);
                builder.worker_threads(1).max_blocking_threads(ceiling);
                ceiling
            }
        };

        let runtime = builder.build().map_err(|e| {
            ActorError::system(format!("Failed to build dispatcher '{}': {}", id, e))
        })?;

        info!(
            dispatcher = id,
            kind = ?kind,
            threads,
            "Dispatcher started"
        );

        Ok(Self {
            id: id.to_string(),
            kind,
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> DispatcherKind {
        self.kind
    }
}

impl Executor for PoolDispatcher {
    fn execute(&self, task: Task) {
        if self.closed.load(Ordering::Acquire) {
            debug!(dispatcher = %self.id, "Dispatcher closed, dropping task");
            return;
        }
        match self.kind {
            DispatcherKind::Pool => {
                self.handle.spawn(async move { task() });
            }
            DispatcherKind::Blocking => {
                self.handle.spawn_blocking(task);
            }
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            // Never blocks, so it is safe from inside a worker thread
            runtime.shutdown_background();
        }
        debug!(dispatcher = %self.id, "Dispatcher shut down");
    }
}

impl Drop for PoolDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PoolDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolDispatcher")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Runs every task on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Executor bound to its creating thread (e.g. a UI thread)
pub struct MainThreadExecutor {
    owner: ThreadId,
    tx: Sender<Task>,
    rx: Receiver<Task>,
    closed: AtomicBool,
}

impl MainThreadExecutor {
    /// Bind to the current thread
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            owner: thread::current().id(),
            tx,
            rx,
            closed: AtomicBool::new(false),
        }
    }

    fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Tasks waiting for the owner thread
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run every queued task; returns how many ran
    pub fn run_pending(&self) -> usize {
        if !self.on_owner_thread() {
            warn!("run_pending called off the owner thread, ignoring");
            return 0;
        }
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for work, then run everything queued
    pub fn pump(&self, timeout: Duration) -> usize {
        if !self.on_owner_thread() {
            warn!("pump called off the owner thread, ignoring");
            return 0;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

impl Default for MainThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for MainThreadExecutor {
    fn execute(&self, task: Task) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if self.on_owner_thread() {
            task();
        } else {
            // Both ends live in self, so the channel is never disconnected
            let _ = self.tx.send(task);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        while self.rx.try_recv().is_ok() {}
    }
}

impl fmt::Debug for MainThreadExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThreadExecutor")
            .field("owner", &self.owner)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Named executors of one system
pub struct Dispatchers {
    executors: DashMap<String, Arc<dyn Executor>>,
    default_id: String,
}

impl Dispatchers {
    /// Registry over `executors`; `default_id` must be among them
    pub fn new(executors: Vec<(String, Arc<dyn Executor>)>, default_id: &str) -> Result<Self> {
        let map = DashMap::new();
        for (id, executor) in executors {
            map.insert(id, executor);
        }
        if !map.contains_key(default_id) {
            return Err(ActorError::configuration(
                format!("Default dispatcher '{}' is not defined", default_id),
                Some("default_dispatcher"),
            ));
        }
        Ok(Self {
            executors: map,
            default_id: default_id.to_string(),
        })
    }

    /// Executor for `id`, falling back to the default
    pub fn lookup(&self, id: &str) -> Arc<dyn Executor> {
        if let Some(executor) = self.executors.get(id) {
            return executor.value().clone();
        }
        if id != self.default_id {
            debug!(dispatcher = id, fallback = %self.default_id, "Unknown dispatcher, using default");
        }
        self.default_executor()
    }

    fn default_executor(&self) -> Arc<dyn Executor> {
        match self.executors.get(&self.default_id) {
            Some(executor) => executor.value().clone(),
            // Entries are never removed, so the default stays present
            None => Arc::new(InlineExecutor),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.executors.contains_key(id)
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.executors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Shut down every executor
    pub fn shutdown_all(&self) {
        let executors: Vec<Arc<dyn Executor>> =
            self.executors.iter().map(|e| e.value().clone()).collect();
        for executor in executors {
            executor.shutdown();
        }
    }
}

impl fmt::Debug for Dispatchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatchers")
            .field("ids", &self.ids())
            .field("default", &self.default_id)
            .finish()
    }
}
