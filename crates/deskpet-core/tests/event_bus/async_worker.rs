use deskpet_core::event_bus::{EventBus, EventBusConfig, EventPayload, SubscribeOptions};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

fn fast_config() -> EventBusConfig {
    EventBusConfig {
        worker_threads: 2,
        poll_interval_ms: 10,
        shutdown_timeout_ms: 500,
        ..Default::default()
    }
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_async_handler_runs_on_worker_thread() {
    let bus = EventBus::with_config(fast_config());
    let handler_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));

    let t = Arc::clone(&handler_thread);
    bus.subscribe(
        "t",
        move |_, _| {
            *t.lock() = Some(thread::current().id());
            Ok(())
        },
        SubscribeOptions::new().asynchronous(),
    );

    bus.start().expect("worker starts");
    bus.emit("t", EventPayload::new());

    assert!(wait_until(|| handler_thread.lock().is_some()));
    assert_ne!(*handler_thread.lock(), Some(thread::current().id()));
    bus.stop();
}

#[test]
fn test_async_jobs_wait_while_stopped() {
    let bus = EventBus::with_config(fast_config());
    let counter = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&counter);
    bus.subscribe(
        "t",
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::new().asynchronous(),
    );

    bus.emit("t", EventPayload::new());
    bus.emit("t", EventPayload::new());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(bus.queued_async(), 2);

    bus.start().expect("worker starts");
    assert!(wait_until(|| counter.load(Ordering::SeqCst) == 2));
    bus.stop();
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let bus = EventBus::with_config(fast_config());

    bus.stop();
    assert!(!bus.is_running());

    bus.start().expect("first start");
    bus.start().expect("second start");
    assert!(bus.is_running());

    bus.stop();
    bus.stop();
    assert!(!bus.is_running());
}

#[test]
fn test_async_payload_is_isolated_from_emitter() {
    let bus = EventBus::with_config(fast_config());
    let received = Arc::new(Mutex::new(None));

    let r = Arc::clone(&received);
    bus.subscribe(
        "t",
        move |_, payload| {
            *r.lock() = payload.get("mood").cloned();
            Ok(())
        },
        SubscribeOptions::new().asynchronous(),
    );

    let mut payload = EventPayload::new().with("mood", "happy");
    bus.emit("t", payload.clone());
    payload.insert("mood", "grumpy");

    bus.start().expect("worker starts");
    assert!(wait_until(|| received.lock().is_some()));
    assert_eq!(*received.lock(), Some(json!("happy")));
    bus.stop();
}

#[test]
fn test_async_failures_do_not_stop_the_pool() {
    let bus = EventBus::with_config(fast_config());
    let counter = Arc::new(AtomicUsize::new(0));

    bus.subscribe(
        "t",
        |_, _| panic!("async handler bug"),
        SubscribeOptions::new().asynchronous(),
    );
    let c = Arc::clone(&counter);
    bus.subscribe(
        "t",
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::new().asynchronous(),
    );

    bus.start().expect("worker starts");
    for _ in 0..3 {
        bus.emit("t", EventPayload::new());
    }

    assert!(wait_until(|| counter.load(Ordering::SeqCst) == 3));
    assert!(wait_until(|| bus.stats().handler_failures == 3));
    bus.stop();
}

#[test]
fn test_saturated_queue_drops_and_counts() {
    let bus = EventBus::with_config(EventBusConfig {
        queue_capacity: 2,
        enqueue_timeout_ms: 1,
        ..fast_config()
    });
    bus.subscribe("t", |_, _| Ok(()), SubscribeOptions::new().asynchronous());

    for _ in 0..5 {
        bus.emit("t", EventPayload::new());
    }

    let stats = bus.stats();
    assert_eq!(stats.async_enqueued, 2);
    assert_eq!(stats.async_dropped, 3);
    assert_eq!(bus.queued_async(), 2);
}

#[test]
fn test_once_async_is_removed_after_enqueue() {
    let bus = EventBus::with_config(fast_config());
    let counter = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&counter);
    bus.subscribe(
        "t",
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::new().asynchronous().once(),
    );

    bus.emit("t", EventPayload::new());
    assert_eq!(bus.subscription_count(Some("t")), 0);
    bus.emit("t", EventPayload::new());

    bus.start().expect("worker starts");
    assert!(wait_until(|| counter.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    bus.stop();
}

#[test]
fn test_stop_discards_queued_jobs() {
    let bus = EventBus::with_config(EventBusConfig {
        worker_threads: 1,
        shutdown_timeout_ms: 1000,
        ..fast_config()
    });
    bus.subscribe(
        "t",
        |_, _| {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        },
        SubscribeOptions::new().asynchronous(),
    );

    bus.start().expect("worker starts");
    for _ in 0..10 {
        bus.emit("t", EventPayload::new());
    }
    // Let the single worker pick up the first job
    thread::sleep(Duration::from_millis(50));
    bus.stop();

    let stats = bus.stats();
    assert_eq!(bus.queued_async(), 0);
    assert_eq!(stats.async_enqueued, 10);
    assert!(stats.async_dropped > 0);
    assert_eq!(stats.delivered + stats.async_dropped, 10);
}
