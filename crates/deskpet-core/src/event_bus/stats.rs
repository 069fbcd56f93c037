//! Dispatch counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the bus counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventBusStats {
    /// Calls to `emit`.
    pub emitted: u64,
    /// Handler invocations that completed successfully.
    pub delivered: u64,
    /// Events suppressed by a throttle policy.
    pub throttled: u64,
    /// Pending payloads replayed by the throttle sweep.
    pub replayed: u64,
    /// Jobs handed to the async worker.
    pub async_enqueued: u64,
    /// Jobs lost to a saturated queue or to shutdown.
    pub async_dropped: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    emitted: AtomicU64,
    delivered: AtomicU64,
    throttled: AtomicU64,
    replayed: AtomicU64,
    async_enqueued: AtomicU64,
    async_dropped: AtomicU64,
    handler_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_emit(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one handler invocation
    pub(crate) fn record_invocation(&self, succeeded: bool) {
        if succeeded {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.handler_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replay(&self) {
        self.replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self) {
        self.async_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: u64) {
        self.async_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EventBusStats {
        EventBusStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            async_enqueued: self.async_enqueued.load(Ordering::Relaxed),
            async_dropped: self.async_dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}
