use proptest::prelude::*;
use uoccin_core::command::Command;
use uoccin_core::config::FormatConfig;
use uoccin_core::reduce::reduce;
use uoccin_core::store::StateStore;

use generators::*;

fn fold(store: StateStore, commands: &[Command]) -> StateStore {
    reduce(store, commands, &FormatConfig::default()).store
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn existence_invariant_holds(log in arb_log(60)) {
        let store = fold(StateStore::default(), &log);
        prop_assert!(store.invariant_violations().is_empty(), "{:?}", store.invariant_violations());
    }

    #[test]
    fn existence_invariant_holds_from_reduced_start(seed in arb_log(30), log in arb_log(30)) {
        let start = fold(StateStore::default(), &seed);
        let store = fold(start, &log);
        prop_assert!(store.invariant_violations().is_empty());
    }

    #[test]
    fn replaying_flag_log_is_idempotent(seed in arb_flag_log(20), log in arb_flag_log(40)) {
        let start = fold(StateStore::default(), &seed);
        let once = reduce(start, &log, &FormatConfig::default());
        let twice = reduce(once.store.clone(), &log, &FormatConfig::default());
        prop_assert_eq!(&twice.store, &once.store);
    }

    #[test]
    fn arrival_order_does_not_matter(shuffled in arb_log(40).prop_shuffle()) {
        // Timestamps in arb_log are unique, so sorting recovers one canonical order.
        let mut sorted = shuffled.clone();
        sorted.sort_by_key(|c| c.timestamp_ms);
        prop_assert_eq!(fold(StateStore::default(), &shuffled), fold(StateStore::default(), &sorted));
    }

    #[test]
    fn batch_order_across_devices_does_not_matter((a, b) in arb_device_logs(25)) {
        let ab: Vec<Command> = a.iter().chain(b.iter()).cloned().collect();
        let ba: Vec<Command> = b.iter().chain(a.iter()).cloned().collect();
        prop_assert_eq!(fold(StateStore::default(), &ab), fold(StateStore::default(), &ba));
    }

    #[test]
    fn device_interleavings_converge(
        (a, b) in arb_device_logs(25),
        picks_one in prop::collection::vec(any::<bool>(), 0..50),
        picks_two in prop::collection::vec(any::<bool>(), 0..50),
    ) {
        let one = interleave(&a, &b, &picks_one);
        let two = interleave(&a, &b, &picks_two);
        prop_assert_eq!(fold(StateStore::default(), &one), fold(StateStore::default(), &two));
    }
}
