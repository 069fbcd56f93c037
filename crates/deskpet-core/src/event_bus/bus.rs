//! Event Bus implementation.
//!
//! Provides the [`EventBus`] struct: subscription management, the `emit`
//! dispatch pass, the throttle replay sweep and the async worker lifecycle.
//!
//! The registry lock is held only long enough to mutate it or to take a
//! snapshot of candidates. Handlers always run outside the lock, so they may
//! subscribe, unsubscribe or emit themselves.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use super::config::EventBusConfig;
use super::payload::EventPayload;
use super::registry::SubscriptionRegistry;
use super::stats::{EventBusStats, StatsCounters};
use super::subscription::{
    EventHandler, HandlerResult, SubscribeOptions, Subscription, SubscriptionHandle,
};
use super::throttle::ThrottleDecision;
use super::type_registry::EventTypeRegistry;
use super::worker::{AsyncJob, AsyncWorker};
use crate::error::EventBusError;

/// An emitted event as seen by [`EventBus::tap`] receivers
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub event_type: String,
    pub payload: EventPayload,
}

/// Process-wide publish/subscribe bus.
///
/// Construct one at start-up and share it (usually behind an `Arc`) with
/// every producer and consumer.
pub struct EventBus {
    /// Type buckets and wildcard list
    registry: RwLock<SubscriptionRegistry>,
    /// Advisory set of known event type names
    known_types: EventTypeRegistry,
    /// Async handler execution
    worker: AsyncWorker,
    /// Broadcast copy of every emitted event
    tap: broadcast::Sender<EmittedEvent>,
    /// Dispatch counters
    stats: Arc<StatsCounters>,
    /// Next subscription sequence number
    sequence: AtomicU64,
    /// Configuration
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration.
    ///
    /// Zero capacities and pool sizes are raised to 1.
    pub fn with_config(mut config: EventBusConfig) -> Self {
        config.queue_capacity = config.queue_capacity.max(1);
        config.worker_threads = config.worker_threads.max(1);
        config.poll_interval_ms = config.poll_interval_ms.max(1);
        config.tap_capacity = config.tap_capacity.max(1);

        let stats = Arc::new(StatsCounters::default());
        let (tap, _) = broadcast::channel(config.tap_capacity);
        Self {
            registry: RwLock::new(SubscriptionRegistry::new()),
            known_types: EventTypeRegistry::default(),
            worker: AsyncWorker::new(&config, Arc::clone(&stats)),
            tap,
            stats,
            sequence: AtomicU64::new(0),
            config,
        }
    }

    /// Subscribe a closure to an event type, or to every type with `"*"`.
    ///
    /// Duplicate registrations are allowed and each fires independently.
    pub fn subscribe<F>(
        &self,
        event_type: impl Into<String>,
        handler: F,
        options: SubscribeOptions,
    ) -> SubscriptionHandle
    where
        F: Fn(&str, &EventPayload) -> HandlerResult + Send + Sync + 'static,
    {
        let name = std::any::type_name::<F>();
        self.register(event_type.into(), Arc::new(handler), name, options)
    }

    /// Subscribe a shared handler object
    pub fn subscribe_handler(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        self.register(event_type.into(), handler, "handler", options)
    }

    fn register(
        &self,
        event_type: String,
        handler: Arc<dyn EventHandler>,
        default_name: &str,
        options: SubscribeOptions,
    ) -> SubscriptionHandle {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let subscription = Arc::new(Subscription::new(
            event_type,
            handler,
            default_name,
            options,
            sequence,
        ));
        let handle = subscription.handle();

        self.registry.write().insert(Arc::clone(&subscription));
        tracing::debug!(
            "Subscription {} added for '{}' ({})",
            handle.id(),
            handle.event_type(),
            subscription.name()
        );
        handle
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.registry.write().remove(handle);
        if removed {
            tracing::debug!("Subscription {} removed", handle.id());
        }
        removed
    }

    /// Remove subscriptions in bulk.
    ///
    /// `None` clears everything, `Some("*")` only the wildcard list, and any
    /// other type only that type's bucket.
    pub fn unsubscribe_all(&self, event_type: Option<&str>) {
        let removed = self.registry.write().clear(event_type);
        tracing::debug!(
            "Removed {} subscriptions ({})",
            removed,
            event_type.unwrap_or("all")
        );
    }

    /// Publish an event to every matching subscription.
    ///
    /// Handlers fire in ascending priority, then subscription order. Handler
    /// failures are logged and never reach the caller.
    pub fn emit(&self, event_type: &str, payload: EventPayload) {
        self.stats.record_emit();
        let candidates = self.registry.read().candidates(event_type);
        tracing::trace!(event_type, candidates = candidates.len(), "Emitting event");

        let mut spent = Vec::new();
        for subscription in &candidates {
            if subscription.is_retired() || !subscription.matches(event_type, &payload) {
                continue;
            }

            match subscription.admit(event_type, &payload, Instant::now()) {
                ThrottleDecision::Fire => {}
                ThrottleDecision::Dropped | ThrottleDecision::Deferred => {
                    self.stats.record_throttled();
                    continue;
                }
            }

            if !subscription.claim() {
                continue;
            }
            if !self.fire(subscription, event_type, &payload) {
                subscription.release_claim();
                continue;
            }
            if subscription.is_once() {
                spent.push(subscription.handle());
            }
        }

        for handle in &spent {
            self.unsubscribe(handle);
        }

        if self.tap.receiver_count() > 0 {
            // A send error only means every receiver dropped in the meantime.
            let _ = self.tap.send(EmittedEvent {
                event_type: event_type.to_string(),
                payload,
            });
        }
    }

    /// Deliver one event to one subscription, directly or via the worker.
    ///
    /// Returns `false` when an async job could not be queued.
    fn fire(
        &self,
        subscription: &Arc<Subscription>,
        event_type: &str,
        payload: &EventPayload,
    ) -> bool {
        if !subscription.is_async() {
            let succeeded = subscription.invoke(event_type, payload);
            self.stats.record_invocation(succeeded);
            return true;
        }

        let job = AsyncJob {
            subscription: Arc::clone(subscription),
            event_type: event_type.to_string(),
            payload: payload.clone(),
        };
        match self.worker.enqueue(job) {
            Ok(()) => true,
            Err(err) => {
                self.stats.record_dropped(1);
                tracing::warn!(
                    event_type,
                    subscription = %subscription.id(),
                    handler = %subscription.name(),
                    "Dropping async event: {}",
                    err
                );
                false
            }
        }
    }

    /// Replay pending throttled events whose interval has elapsed.
    ///
    /// Must be driven periodically by the host; the bus starts no timer of
    /// its own. Returns the number of replayed events.
    pub fn process_throttled_events(&self) -> usize {
        let throttled = self.registry.read().throttled();

        let mut replayed = 0;
        for subscription in &throttled {
            if subscription.is_retired() {
                continue;
            }
            let Some(pending) = subscription.take_due_replay(Instant::now()) else {
                continue;
            };
            tracing::trace!(
                event_type = %pending.event_type,
                subscription = %subscription.id(),
                "Replaying throttled event"
            );
            if self.fire(subscription, &pending.event_type, &pending.payload) {
                self.stats.record_replay();
                replayed += 1;
            }
        }
        replayed
    }

    /// Start the async worker. No-op when already running.
    pub fn start(&self) -> Result<(), EventBusError> {
        self.worker.start()
    }

    /// Stop the async worker, discarding queued async jobs. No-op when stopped.
    pub fn stop(&self) {
        self.worker.stop();
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Async jobs waiting for the worker
    pub fn queued_async(&self) -> usize {
        self.worker.queued()
    }

    /// Number of subscriptions for an event type, `"*"` for wildcards, or
    /// every subscription for `None`
    pub fn subscription_count(&self, event_type: Option<&str>) -> usize {
        self.registry.read().count(event_type)
    }

    /// Event types that currently have at least one subscription
    pub fn subscribed_event_types(&self) -> Vec<String> {
        self.registry.read().event_types()
    }

    /// Throttled subscriptions holding an event for replay
    pub fn pending_replays(&self) -> usize {
        self.registry
            .read()
            .throttled()
            .iter()
            .filter(|s| s.has_pending_replay())
            .count()
    }

    /// Record an event type name as known. Informational only.
    pub fn register_event_type(&self, name: &str) -> bool {
        self.known_types.register(name)
    }

    pub fn is_event_type_registered(&self, name: &str) -> bool {
        self.known_types.contains(name)
    }

    pub fn registered_event_types(&self) -> Vec<String> {
        self.known_types.names()
    }

    /// Get a receiver that observes every emitted event.
    ///
    /// Useful in async contexts; lagging receivers lose the oldest events.
    pub fn tap(&self) -> broadcast::Receiver<EmittedEvent> {
        self.tap.subscribe()
    }

    pub fn stats(&self) -> EventBusStats {
        self.stats.snapshot()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count(None))
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish()
    }
}
