//! # deskpet Core
//!
//! Core building blocks for deskpet.
//! Provides the event dispatch core every other component talks through:
//! subscriptions, priority-ordered dispatch, throttling, one-shot and
//! wildcard subscriptions, and the async handler worker pool.

pub mod error;
pub mod event_bus;

pub use error::{ConfigError, Error, EventBusError, Result};

// Re-export event bus for convenience
pub use event_bus::{
    EmittedEvent, EventBus, EventBusConfig, EventBusStats, EventFilter, EventHandler,
    EventPayload, HandlerResult, Priority, SubscribeOptions, SubscriptionHandle, SubscriptionId,
    Throttle, ThrottleMode, WILDCARD,
};
