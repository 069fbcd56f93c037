//! Throttle policies and per-subscription throttle state.
//!
//! Three modes share the same clock rules: the first event of a burst fires
//! immediately and starts the interval. They differ in what happens to events
//! arriving inside the interval:
//!
//! - [`ThrottleMode::First`] drops them.
//! - [`ThrottleMode::Last`] and [`ThrottleMode::Rate`] keep only the most
//!   recent one in a single pending slot, replayed by
//!   [`EventBus::process_throttled_events`](super::EventBus::process_throttled_events)
//!   once the interval has elapsed.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::payload::EventPayload;
use crate::error::EventBusError;

/// How events inside a throttle interval are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMode {
    /// Fire the first event, drop the rest of the burst.
    First,
    /// Fire the first event, replay the latest suppressed one later.
    Last,
    /// Same mechanics as `Last`; labels intent as rate limiting.
    Rate,
}

impl ThrottleMode {
    /// Whether suppressed events are kept for a later replay
    pub fn keeps_pending(self) -> bool {
        matches!(self, ThrottleMode::Last | ThrottleMode::Rate)
    }
}

impl std::fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleMode::First => write!(f, "first"),
            ThrottleMode::Last => write!(f, "last"),
            ThrottleMode::Rate => write!(f, "rate"),
        }
    }
}

/// Throttle policy attached to a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    mode: ThrottleMode,
    interval: Duration,
}

impl Throttle {
    /// Create a policy with an explicit interval
    pub fn new(mode: ThrottleMode, interval: Duration) -> Self {
        Self { mode, interval }
    }

    /// Create a policy from an interval in seconds.
    ///
    /// Rejects intervals that are not finite, not strictly positive, or too
    /// large to represent as a [`Duration`].
    pub fn from_secs_f64(mode: ThrottleMode, seconds: f64) -> Result<Self, EventBusError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(EventBusError::InvalidThrottleInterval { seconds });
        }
        let interval = Duration::try_from_secs_f64(seconds)
            .map_err(|_| EventBusError::InvalidThrottleInterval { seconds })?;
        Ok(Self::new(mode, interval))
    }

    /// Drop-the-burst policy
    pub fn first(interval: Duration) -> Self {
        Self::new(ThrottleMode::First, interval)
    }

    /// Keep-last policy
    pub fn last(interval: Duration) -> Self {
        Self::new(ThrottleMode::Last, interval)
    }

    /// Fixed-rate policy
    pub fn rate(interval: Duration) -> Self {
        Self::new(ThrottleMode::Rate, interval)
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Outcome of offering an event to a throttled subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThrottleDecision {
    /// Deliver now.
    Fire,
    /// Suppressed and discarded.
    Dropped,
    /// Suppressed and stored for replay.
    Deferred,
}

/// Suppressed event waiting for replay
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingEvent {
    pub(crate) event_type: String,
    pub(crate) payload: EventPayload,
}

/// Mutable throttle bookkeeping owned by one subscription
#[derive(Debug, Default)]
pub(crate) struct ThrottleState {
    last_fired_at: Option<Instant>,
    pending: Option<PendingEvent>,
}

impl ThrottleState {
    /// Decide whether an event may fire at `now`.
    ///
    /// A firing event starts a new interval and supersedes any pending replay.
    pub(crate) fn admit(
        &mut self,
        throttle: &Throttle,
        event_type: &str,
        payload: &EventPayload,
        now: Instant,
    ) -> ThrottleDecision {
        if self.within_interval(throttle, now) {
            if throttle.mode.keeps_pending() {
                self.pending = Some(PendingEvent {
                    event_type: event_type.to_string(),
                    payload: payload.clone(),
                });
                return ThrottleDecision::Deferred;
            }
            return ThrottleDecision::Dropped;
        }

        self.last_fired_at = Some(now);
        self.pending = None;
        ThrottleDecision::Fire
    }

    /// Take the pending payload if its interval has elapsed at `now`
    pub(crate) fn take_due(&mut self, throttle: &Throttle, now: Instant) -> Option<PendingEvent> {
        if self.pending.is_none() || self.within_interval(throttle, now) {
            return None;
        }
        self.last_fired_at = Some(now);
        self.pending.take()
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn within_interval(&self, throttle: &Throttle, now: Instant) -> bool {
        self.last_fired_at
            .is_some_and(|last| now.saturating_duration_since(last) < throttle.interval)
    }
}
