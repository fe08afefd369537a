//! Promises
//!
//! Single-assignment result cell completed by the ask machinery. The first
//! completion wins; later ones report `false` and change nothing. Callers
//! may block with a timeout, register listeners that run on an executor, or
//! `.await` the promise from async code.

use crate::dispatch::Executor;
use crate::error::{ActorError, Result};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

type Listener<T> = (Arc<dyn Executor>, Box<dyn FnOnce(Result<T>) + Send + 'static>);

enum State<T> {
    Pending {
        listeners: Vec<Listener<T>>,
        wakers: Vec<Waker>,
    },
    Done(Result<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    completed: Condvar,
}

/// Write-once result shared between producer and consumers
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending {
                    listeners: Vec::new(),
                    wakers: Vec::new(),
                }),
                completed: Condvar::new(),
            }),
        }
    }

    /// Already-failed promise
    pub fn failed(error: ActorError) -> Self {
        let promise = Self::new();
        promise.try_fail(error);
        promise
    }

    /// Complete with a value; `false` if already completed
    pub fn try_succeed(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Complete with an error; `false` if already completed
    pub fn try_fail(&self, error: ActorError) -> bool {
        self.complete(Err(error))
    }

    fn complete(&self, result: Result<T>) -> bool {
        let (listeners, wakers) = {
            let mut state = self.inner.state.lock();
            if matches!(*state, State::Done(_)) {
                return false;
            }
            match mem::replace(&mut *state, State::Done(result.clone())) {
                State::Pending { listeners, wakers } => (listeners, wakers),
                State::Done(_) => (Vec::new(), Vec::new()),
            }
        };
        self.inner.completed.notify_all();

        for (executor, listener) in listeners {
            let result = result.clone();
            executor.execute(Box::new(move || listener(result)));
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Done(_))
    }

    /// Outcome if completed
    pub fn try_get(&self) -> Option<Result<T>> {
        match &*self.inner.state.lock() {
            State::Done(result) => Some(result.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Block until completed
    pub fn wait(&self) -> Result<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let State::Done(result) = &*state {
                return result.clone();
            }
            self.inner.completed.wait(&mut state);
        }
    }

    /// Block until completed or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            if let State::Done(result) = &*state {
                return result.clone();
            }
            if self.inner.completed.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    State::Done(result) => result.clone(),
                    State::Pending { .. } => Err(ActorError::wait_timeout(timeout.as_millis() as u64)),
                };
            }
        }
    }

    /// Run `listener` on `executor` once completed; immediately submitted
    /// when already completed
    pub fn on_complete<F>(&self, executor: Arc<dyn Executor>, listener: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let result = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { listeners, .. } => {
                    listeners.push((executor, Box::new(listener)));
                    return;
                }
                State::Done(result) => result.clone(),
            }
        };
        executor.execute(Box::new(move || listener(result)));
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Future for Promise<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.inner.state.lock();
        match &mut *state {
            State::Done(result) => Poll::Ready(result.clone()),
            State::Pending { wakers, .. } => {
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let done = matches!(*self.inner.state.lock(), State::Done(_));
        f.debug_struct("Promise").field("done", &done).finish()
    }
}
