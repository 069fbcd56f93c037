use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use deskpet::event_bus::WILDCARD;
use deskpet::{
    init_logging, EventBus, EventBusConfig, EventFilter, EventPayload, Priority,
    SubscribeOptions, Throttle, BUILD_DATE, VERSION,
};

/// How long the demo host loop runs
const RUN_FOR: Duration = Duration::from_secs(2);

/// Host tick driving throttled replays
const TICK: Duration = Duration::from_millis(50);

fn load_config() -> anyhow::Result<EventBusConfig> {
    match std::env::var_os("DESKPET_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            EventBusConfig::load_from_file(&path)
                .with_context(|| format!("loading config from {}", path.display()))
        }
        None => Ok(EventBusConfig::default()),
    }
}

fn register_handlers(bus: &EventBus) {
    for name in ["pet.state.change", "pet.move", "pet.ready"] {
        bus.register_event_type(name);
    }

    bus.subscribe(
        "pet.state.change",
        |_, payload| {
            let state = payload
                .get("state")
                .and_then(|value| value.as_str())
                .unwrap_or("unknown");
            tracing::info!("Pet is now {}", state);
            Ok(())
        },
        SubscribeOptions::new()
            .priority(Priority::High)
            .name("state-logger"),
    );

    bus.subscribe(
        "pet.state.change",
        |_, _| {
            tracing::info!("Pet fell asleep, dimming sprite");
            Ok(())
        },
        SubscribeOptions::new()
            .filter(EventFilter::field_equals("state", "sleeping"))
            .asynchronous()
            .name("sleep-dimmer"),
    );

    bus.subscribe(
        "pet.move",
        |_, payload| {
            tracing::info!(
                "Rendering pet at ({}, {})",
                payload.get("x").cloned().unwrap_or_default(),
                payload.get("y").cloned().unwrap_or_default()
            );
            Ok(())
        },
        SubscribeOptions::new()
            .throttle(Throttle::last(Duration::from_millis(200)))
            .name("renderer"),
    );

    bus.subscribe(
        "pet.ready",
        |_, _| {
            tracing::info!("Pet ready, greeting user");
            Ok(())
        },
        SubscribeOptions::new().once().name("greeter"),
    );

    bus.subscribe(
        WILDCARD,
        |event_type, _| {
            tracing::debug!("Observed {}", event_type);
            Ok(())
        },
        SubscribeOptions::new()
            .priority(Priority::Lowest)
            .name("observer"),
    );
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("deskpet {} (built {})", VERSION, BUILD_DATE);

    let bus = Arc::new(EventBus::with_config(load_config()?));
    register_handlers(&bus);
    bus.start()?;

    bus.emit("pet.ready", EventPayload::new());
    bus.emit("pet.ready", EventPayload::new());

    let started = Instant::now();
    let mut frame = 0i64;
    while started.elapsed() < RUN_FOR {
        frame += 1;
        bus.emit(
            "pet.move",
            EventPayload::new().with("x", frame * 4).with("y", 100),
        );
        if frame % 10 == 0 {
            let state = if frame % 20 == 0 { "sleeping" } else { "idle" };
            bus.emit("pet.state.change", EventPayload::new().with("state", state));
        }

        bus.process_throttled_events();
        thread::sleep(TICK);
    }

    // Let the last coalesced move through before shutting down
    thread::sleep(Duration::from_millis(200));
    bus.process_throttled_events();

    bus.stop();
    let stats = bus.stats();
    tracing::info!("Bus statistics: {}", serde_json::to_string(&stats)?);
    Ok(())
}
