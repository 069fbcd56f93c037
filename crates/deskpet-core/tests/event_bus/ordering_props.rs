use deskpet_core::event_bus::{EventBus, EventPayload, Priority, SubscribeOptions, WILDCARD};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Highest),
        Just(Priority::High),
        Just(Priority::Normal),
        Just(Priority::Low),
        Just(Priority::Lowest),
    ]
}

proptest! {
    #[test]
    fn prop_handlers_fire_in_priority_then_insertion_order(
        subscriptions in prop::collection::vec((priority_strategy(), any::<bool>()), 1..24)
    ) {
        let bus = EventBus::new();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for (index, (priority, wildcard)) in subscriptions.iter().enumerate() {
            let fired = Arc::clone(&fired);
            let event_type = if *wildcard { WILDCARD } else { "t" };
            bus.subscribe(
                event_type,
                move |_, _| {
                    fired.lock().push(index);
                    Ok(())
                },
                SubscribeOptions::new().priority(*priority),
            );
        }

        bus.emit("t", EventPayload::new());

        let fired = fired.lock();
        prop_assert_eq!(fired.len(), subscriptions.len());
        let keys: Vec<(Priority, usize)> =
            fired.iter().map(|&index| (subscriptions[index].0, index)).collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
