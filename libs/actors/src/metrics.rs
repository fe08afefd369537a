//! System Metrics
//!
//! Lock-free counters updated on the hot path and a point-in-time snapshot
//! for callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// System-wide counters
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub messages_failed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,

    // Supervision
    pub actor_restarts: AtomicU64,
    pub restart_failures: AtomicU64,

    // Delivery
    pub dead_letters: AtomicU64,
    pub mailbox_overflows: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration, failed: bool) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if failed {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    /// Record actor restart event
    pub fn record_actor_restart(&self, success: bool) {
        self.actor_restarts.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.restart_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_actor_spawned(&self) {
        self.actors_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actor_stopped(&self) {
        self.actors_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_letter(&self) {
        self.dead_letters.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an envelope rejected or evicted by a full mailbox
    pub fn record_mailbox_overflow(&self) {
        self.mailbox_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> SystemStats {
        let total_restarts = self.actor_restarts.load(Ordering::Relaxed);
        let restart_failures = self.restart_failures.load(Ordering::Relaxed);
        let restart_success_rate = if total_restarts > 0 {
            ((total_restarts - restart_failures) as f64 / total_restarts as f64) * 100.0
        } else {
            100.0
        };

        SystemStats {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
            total_restarts,
            restart_failures,
            restart_success_rate,
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            mailbox_overflows: self.mailbox_overflows.load(Ordering::Relaxed),
        }
    }
}

/// System statistics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub messages_processed: u64,
    pub messages_failed: u64,
    pub avg_processing_time_ns: f64,
    pub total_restarts: u64,
    pub restart_failures: u64,
    pub restart_success_rate: f64,
    pub dead_letters: u64,
    pub mailbox_overflows: u64,
}

impl SystemStats {
    /// Actors spawned and not yet stopped
    pub fn live_actors(&self) -> u64 {
        self.actors_spawned.saturating_sub(self.actors_stopped)
    }
}
