//! Actor Runtime
//!
//! In-process actor runtime: hierarchical actors with bounded mailboxes,
//! pluggable dispatchers, supervision with exponential restart backoff,
//! death watch, dead letters and a promise-based ask pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ActorSystem                                                  │
//! │                                                              │
//! │  registry ──► ActorRef ──weak──► Cell ──► Mailbox (bounded)  │
//! │                                   │                          │
//! │                                   ├─► behaviour (one turn    │
//! │                                   │   at a time)             │
//! │                                   ├─► children / watchers    │
//! │                                   └─► SupervisorStrategy     │
//! │                                                              │
//! │  Dispatchers (cpu pool, io pool, custom)   Scheduler (timers)│
//! │  DeadLetters (bounded ring + subscribers)  askHub (promises) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Per-sender FIFO**: envelopes from one sender to one actor are
//!   processed in send order (absent overflow drops)
//! - **Serial turns**: at most one callback of an actor runs at a time
//! - **No silent loss**: every undelivered envelope reaches dead letters
//! - **Exactly-once stop**: `post_stop` and `Terminated` signals fire once
//!
//! # Examples
//!
//! A request/response round trip through the ask pattern:
//!
//! ```rust
//! use actor_runtime::{ask, Actor, ActorResult, ActorSystem, AskRequest, Context, Props};
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! impl Actor for Echo {
//!     type Message = AskRequest;
//!
//!     fn receive(&mut self, ctx: &mut Context<'_>, request: AskRequest) -> ActorResult {
//!         let text = request.payload.downcast_ref::<String>().cloned().unwrap_or_default();
//!         request.reply(ctx, text.to_uppercase());
//!         Ok(())
//!     }
//! }
//!
//! let system = ActorSystem::new("docs").unwrap();
//! let echo = system.actor_of("echo", Props::new(|| Echo)).unwrap();
//!
//! let reply = ask::<String, _>(&system, &echo, "hi".to_string(), Duration::from_secs(2));
//! assert_eq!(reply.wait().unwrap(), "HI");
//!
//! system.shutdown();
//! ```

pub mod actor;
pub mod actor_ref;
pub mod ask;
pub(crate) mod cell;
pub mod dead_letters;
pub mod dispatch;
pub mod error;
pub mod logging;
pub(crate) mod mailbox;
pub mod message;
pub mod metrics;
pub mod path;
pub mod promise;
pub mod props;
pub mod routing;
pub mod scheduler;
pub mod supervision;
pub mod system;

pub use actor::{Actor, Context};
pub use actor_ref::ActorRef;
pub use ask::{ask, ask_default, AskRequest, AskResponse, RequestId};
pub use dead_letters::{DeadLetter, DeadLetterNotice, DeadLetters};
pub use dispatch::{
    default_pool_threads, Dispatchers, Executor, InlineExecutor, MainThreadExecutor,
    PoolDispatcher, Task,
};
pub use error::{ActorError, ActorResult, Result};
pub use logging::init_tracing;
pub use message::{AnyMessage, Envelope, PoisonPill, Signal};
pub use metrics::{SystemMetrics, SystemStats};
pub use path::ActorPath;
pub use promise::Promise;
pub use props::Props;
pub use routing::{Route, ShardRouter};
pub use scheduler::{Cancellable, Scheduler};
pub use supervision::{
    default_backoff, default_strategy, restart_with_fixed_backoff, stop_on_failure, Directive,
    RestartWithBackoff, RestartWithFixedBackoff, StopOnFailure, SupervisorStrategy,
};
pub use system::{ActorSystem, ActorSystemBuilder};

pub use runtime_config::{
    defaults, AskSettings, DeadLetterSettings, DispatcherKind, DispatcherSettings, LoggingSettings,
    OverflowPolicy, RuntimeConfig,
};
