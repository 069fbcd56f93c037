//! Subscription records and handler plumbing.
//!
//! A [`Subscription`] binds a handler to an event-type pattern together with
//! its priority, filters, throttle policy and one-shot flag. Everything except
//! the throttle bookkeeping and the one-shot claim is fixed at subscribe time.

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::payload::EventPayload;
use super::priority::Priority;
use super::throttle::{PendingEvent, Throttle, ThrottleDecision, ThrottleState};

/// Event type pattern that matches every event
pub const WILDCARD: &str = "*";

/// Result returned by event handlers
pub type HandlerResult = anyhow::Result<()>;

/// Unique identity of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Receiver of events.
///
/// Implemented for every `Fn(&str, &EventPayload) -> HandlerResult` closure.
pub trait EventHandler: Send + Sync {
    /// Handle one event
    fn handle(&self, event_type: &str, payload: &EventPayload) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&str, &EventPayload) -> HandlerResult + Send + Sync,
{
    fn handle(&self, event_type: &str, payload: &EventPayload) -> HandlerResult {
        self(event_type, payload)
    }
}

/// Predicate evaluated before a handler fires
#[derive(Clone)]
pub struct EventFilter(Arc<dyn Fn(&str, &EventPayload) -> bool + Send + Sync>);

impl EventFilter {
    /// Wrap a predicate
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str, &EventPayload) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Passes when the payload has `key` equal to `value`
    pub fn field_equals(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        let value = value.into();
        Self::new(move |_, payload| payload.get(&key) == Some(&value))
    }

    /// Passes when the payload has a value for `key`
    pub fn has_field(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |_, payload| payload.contains_key(&key))
    }

    /// Evaluate the predicate
    pub fn matches(&self, event_type: &str, payload: &EventPayload) -> bool {
        (self.0)(event_type, payload)
    }
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventFilter(..)")
    }
}

/// Optional parameters of [`EventBus::subscribe`](super::EventBus::subscribe)
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub(crate) priority: Priority,
    pub(crate) filters: Vec<EventFilter>,
    pub(crate) is_async: bool,
    pub(crate) throttle: Option<Throttle>,
    pub(crate) once: bool,
    pub(crate) name: Option<String>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a filter; all filters must pass for the handler to fire
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a filter from a closure
    pub fn filter_fn<F>(self, predicate: F) -> Self
    where
        F: Fn(&str, &EventPayload) -> bool + Send + Sync + 'static,
    {
        self.filter(EventFilter::new(predicate))
    }

    /// Run the handler on the async worker pool
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Remove the subscription after its first delivery
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Name used for the handler in log records
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    event_type: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Pattern the subscription was registered under
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn is_wildcard(&self) -> bool {
        self.event_type == WILDCARD
    }
}

/// A registered handler and its delivery rules
pub(crate) struct Subscription {
    id: SubscriptionId,
    sequence: u64,
    event_type: String,
    handler: Arc<dyn EventHandler>,
    name: String,
    priority: Priority,
    filters: Vec<EventFilter>,
    is_async: bool,
    throttle: Option<Throttle>,
    once: bool,
    throttle_state: Mutex<ThrottleState>,
    claimed: AtomicBool,
    retired: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        event_type: String,
        handler: Arc<dyn EventHandler>,
        default_name: &str,
        options: SubscribeOptions,
        sequence: u64,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            sequence,
            event_type,
            handler,
            name: options.name.unwrap_or_else(|| default_name.to_string()),
            priority: options.priority,
            filters: options.filters,
            is_async: options.is_async,
            throttle: options.throttle,
            once: options.once,
            throttle_state: Mutex::new(ThrottleState::default()),
            claimed: AtomicBool::new(false),
            retired: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            id: self.id,
            event_type: self.event_type.clone(),
        }
    }

    pub(crate) fn event_type(&self) -> &str {
        &self.event_type
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Sort key: priority first, then subscription order
    pub(crate) fn order_key(&self) -> (Priority, u64) {
        (self.priority(), self.sequence())
    }

    pub(crate) fn is_async(&self) -> bool {
        self.is_async
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once
    }

    pub(crate) fn is_throttled(&self) -> bool {
        self.throttle.is_some()
    }

    /// Pattern match followed by every filter (AND)
    pub(crate) fn matches(&self, event_type: &str, payload: &EventPayload) -> bool {
        (self.event_type == WILDCARD || self.event_type == event_type)
            && self.filters.iter().all(|f| f.matches(event_type, payload))
    }

    /// Apply the throttle policy, if any
    pub(crate) fn admit(
        &self,
        event_type: &str,
        payload: &EventPayload,
        now: Instant,
    ) -> ThrottleDecision {
        match &self.throttle {
            None => ThrottleDecision::Fire,
            Some(throttle) => self
                .throttle_state
                .lock()
                .admit(throttle, event_type, payload, now),
        }
    }

    /// Pending replay whose interval has elapsed
    pub(crate) fn take_due_replay(&self, now: Instant) -> Option<PendingEvent> {
        let throttle = self.throttle.as_ref()?;
        self.throttle_state.lock().take_due(throttle, now)
    }

    pub(crate) fn has_pending_replay(&self) -> bool {
        self.throttle.is_some() && self.throttle_state.lock().has_pending()
    }

    /// Claim the single delivery of a one-shot subscription.
    ///
    /// Always succeeds for regular subscriptions.
    pub(crate) fn claim(&self) -> bool {
        if !self.once {
            return true;
        }
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give back a one-shot claim whose delivery did not happen
    pub(crate) fn release_claim(&self) {
        if self.once {
            self.claimed.store(false, Ordering::Release);
        }
    }

    /// Mark as removed from the registry; a retired subscription is skipped
    /// by emit passes and sweeps that snapshotted it earlier
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// Run the handler, capturing errors and panics.
    ///
    /// Returns `true` when the handler completed successfully.
    pub(crate) fn invoke(&self, event_type: &str, payload: &EventPayload) -> bool {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle(event_type, payload)
        }));

        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::warn!(
                    event_type,
                    subscription = %self.id,
                    handler = %self.name,
                    "Event handler failed: {:#}",
                    err
                );
                false
            }
            Err(panic_err) => {
                let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!(
                    event_type,
                    subscription = %self.id,
                    handler = %self.name,
                    "Event handler panicked: {}",
                    info
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("filters", &self.filters.len())
            .field("is_async", &self.is_async)
            .field("throttle", &self.throttle)
            .field("once", &self.once)
            .finish()
    }
}
