//! # Deskpet
//!
//! Host crate for the deskpet event dispatch core.
//!
//! ## Architecture
//!
//! 1. **deskpet-core** - Event bus: subscriptions, priorities, filters,
//!    throttling, one-shot handlers and the async worker pool
//! 2. **deskpet** - Logging setup and the host loop that drives the bus

pub use deskpet_core::event_bus;
pub use deskpet_core::{
    ConfigError, EmittedEvent, Error, EventBus, EventBusConfig, EventBusError, EventBusStats,
    EventFilter, EventPayload, Priority, Result, SubscribeOptions, SubscriptionHandle, Throttle,
    ThrottleMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - Thread ids and names, so async handler output can be told apart
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
