pub mod fixtures;

use fixtures::threaded;
use herald_dispatcher::{Delivery, SubscribeOptions};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn delivery() -> impl Strategy<Value = Delivery> {
    prop_oneof![Just(Delivery::Inline), Just(Delivery::Detached), Just(Delivery::Transactional)]
}

fn options() -> impl Strategy<Value = SubscribeOptions> {
    (any::<bool>(), delivery()).prop_map(|(once, delivery)| SubscribeOptions { once, delivery })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_delivery_is_accounted_for_after_wait(
        handlers in proptest::collection::vec(options(), 0..8),
        dispatches in 1usize..5,
    ) {
        let dispatcher = threaded::<usize>("property");
        let counters: Vec<Arc<AtomicUsize>> =
            handlers.iter().map(|_| Arc::new(AtomicUsize::new(0))).collect();

        for (options, counter) in handlers.iter().zip(&counters) {
            let counter = Arc::clone(counter);
            dispatcher.subscribe_with(*options, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        for i in 0..dispatches {
            dispatcher.dispatch(i).unwrap();
        }
        dispatcher.wait();

        prop_assert_eq!(dispatcher.pending(), 0);
        for (options, counter) in handlers.iter().zip(&counters) {
            let expected = if options.once { 1 } else { dispatches };
            prop_assert_eq!(counter.load(Ordering::SeqCst), expected);
        }
        let persistent = handlers.iter().filter(|o| !o.once).count();
        prop_assert_eq!(dispatcher.len(), persistent);
    }
}
