//! Runtime defaults
//!
//! Default values and constants shared by the actor runtime and its
//! configuration layer, grouped by the subsystem that consumes them.

/// Mailbox defaults
pub mod mailbox {
    /// Bounded mailbox capacity (envelopes)
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Envelopes processed per scheduling turn before yielding the worker
    pub const DEFAULT_THROUGHPUT: usize = 200;
}

/// Dispatcher defaults
pub mod dispatch {
    /// Shared pool for non-blocking behaviours
    pub const CPU_DISPATCHER: &str = "cpu";

    /// Elastic pool for behaviours that perform blocking I/O
    pub const IO_DISPATCHER: &str = "io";

    /// Lower bound on worker threads for the `cpu` pool
    pub const MIN_POOL_THREADS: usize = 2;

    /// Upper bound on threads spawned by a blocking pool
    pub const MAX_BLOCKING_THREADS: usize = 64;
}

/// Supervision defaults
pub mod supervision {
    /// First restart delay (milliseconds)
    pub const BACKOFF_BASE_MS: u64 = 100;

    /// Exponent cap: delays stop doubling after this many restarts
    pub const BACKOFF_MAX_EXPONENT: u32 = 6;

    /// Ceiling on any computed restart delay (milliseconds)
    pub const BACKOFF_CEILING_MS: u64 = 5_000;
}

/// Ask pattern defaults
pub mod ask {
    /// Name of the top-level routing actor that owns pending requests
    pub const HUB_NAME: &str = "askHub";

    /// Ask hub mailbox capacity
    pub const HUB_CAPACITY: usize = 4096;

    /// Timeout used by `ask_default` (milliseconds)
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
}

/// Dead-letter defaults
pub mod dead_letters {
    /// Number of undelivered envelopes retained for inspection
    pub const DEFAULT_CAPACITY: usize = 512;
}

/// System defaults
pub mod system {
    /// Name given to systems built without an explicit one
    pub const DEFAULT_NAME: &str = "actors";

    /// Environment variable prefix for configuration overrides
    pub const ENV_PREFIX: &str = "ACTORS";
}
