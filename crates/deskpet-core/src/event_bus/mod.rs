//! # Event Bus Module
//!
//! Provides the process-wide publish/subscribe bus that decouples producers
//! (timers, resource loaders, UI actions) from consumers (managers,
//! notification renderers, adapters).
//!
//! ## Overview
//!
//! - Event types are dot-separated strings; `"*"` subscribes to everything
//! - Handlers fire in priority order, ties in subscription order
//! - Filters, throttling (first / last / rate) and one-shot subscriptions
//! - Handlers run synchronously on the emitting thread or on a worker pool
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deskpet_core::event_bus::{EventBus, EventPayload, Priority, SubscribeOptions};
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//!
//! // Subscribe to pet state changes
//! let handle = bus.subscribe(
//!     "pet.state.change",
//!     |event_type, payload| {
//!         println!("{}: {:?}", event_type, payload.get("state"));
//!         Ok(())
//!     },
//!     SubscribeOptions::new().priority(Priority::High),
//! );
//!
//! // Publish an event
//! bus.emit("pet.state.change", EventPayload::from(json!({ "state": "sleeping" })));
//!
//! // Unsubscribe when done
//! bus.unsubscribe(&handle);
//! ```
//!
//! Throttled `last`/`rate` subscriptions only replay their pending event when
//! the host calls [`EventBus::process_throttled_events`] from its own timer.

mod bus;
mod config;
mod payload;
mod priority;
mod registry;
mod stats;
mod subscription;
mod throttle;
mod type_registry;
mod worker;

pub use bus::{EmittedEvent, EventBus};
pub use config::EventBusConfig;
pub use payload::EventPayload;
pub use priority::Priority;
pub use stats::EventBusStats;
pub use subscription::{
    EventFilter, EventHandler, HandlerResult, SubscribeOptions, SubscriptionHandle,
    SubscriptionId, WILDCARD,
};
pub use throttle::{Throttle, ThrottleMode};
