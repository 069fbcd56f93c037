use deskpet_core::event_bus::{EventBus, EventPayload, Priority, SubscribeOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_emit_and_subscribe() {
    let bus = Arc::new(EventBus::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&counter);
    bus.subscribe(
        "tick",
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::new(),
    );

    let emitters: Vec<_> = (0..4)
        .map(|_| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for _ in 0..250 {
                    bus.emit("tick", EventPayload::new());
                }
            })
        })
        .collect();

    let subscribers: Vec<_> = (0..2)
        .map(|index| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for _ in 0..50 {
                    let handle = bus.subscribe(
                        format!("other.{}", index),
                        |_, _| Ok(()),
                        SubscribeOptions::new().priority(Priority::Low),
                    );
                    bus.unsubscribe(&handle);
                }
            })
        })
        .collect();

    for handle in emitters.into_iter().chain(subscribers) {
        handle.join().expect("thread panicked");
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1000);
    assert_eq!(bus.subscription_count(None), 1);
    assert_eq!(bus.stats().emitted, 1000);
}

#[test]
fn test_once_fires_once_under_concurrent_emit() {
    let bus = Arc::new(EventBus::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let c = Arc::clone(&counter);
    bus.subscribe(
        "ready",
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::new().once(),
    );

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let bus = Arc::clone(&bus);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    bus.emit("ready", EventPayload::new());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscription_count(Some("ready")), 0);
}

#[test]
fn test_handlers_from_many_threads_share_one_bus() {
    let bus = Arc::new(EventBus::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bus = Arc::clone(&bus);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                bus.subscribe(
                    "shared",
                    move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                    SubscribeOptions::new(),
                );
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }

    bus.emit("shared", EventPayload::new());
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}
