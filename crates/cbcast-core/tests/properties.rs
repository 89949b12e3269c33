//! Property-based tests for vector clocks and the wire codec
//!
//! These tests pin down the laws the delivery engine relies on:
//!  - Predicate: V + e_j >= Vm  <=>  V[i] >= Vm[i] (i != j) and V[j] + 1 >= Vm[j]
//!  - Increments never decrease any slot
//!  - parse(encode(v)) == v
//!  - Length mismatches are always rejected

use cbcast_core::{CausalMessage, ProtocolError, VectorClock};
use proptest::prelude::*;

/// Pair of equal-length clocks plus a valid sender index
fn clock_pair_strategy() -> impl Strategy<Value = (VectorClock, VectorClock, usize)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(0u64..6, n),
            prop::collection::vec(0u64..6, n),
            0..n,
        )
            .prop_map(|(a, b, j)| (VectorClock::from_slots(a), VectorClock::from_slots(b), j))
    })
}

fn clock_strategy() -> impl Strategy<Value = VectorClock> {
    prop::collection::vec(any::<u64>(), 1..16).prop_map(VectorClock::from_slots)
}

proptest! {
    #[test]
    fn predicate_matches_slotwise_definition((local, stamp, j) in clock_pair_strategy()) {
        let expected = local
            .as_slice()
            .iter()
            .zip(stamp.as_slice())
            .enumerate()
            .all(|(i, (v, vm))| if i == j { v + 1 >= *vm } else { v >= vm });

        prop_assert_eq!(local.can_deliver(j, &stamp).unwrap(), expected);
    }

    #[test]
    fn with_increment_never_mutates((local, _stamp, j) in clock_pair_strategy()) {
        let before = local.clone();
        let _ = local.with_increment(j).unwrap();
        prop_assert_eq!(local, before);
    }

    #[test]
    fn increments_are_monotonic(
        n in 1usize..6,
        ops in prop::collection::vec(0usize..6, 0..50),
    ) {
        let mut clock = VectorClock::new(n);
        for op in ops {
            let before = clock.clone();
            let _ = clock.increment(op % n).unwrap();
            prop_assert!(clock.greater_or_equal(&before).unwrap());
            prop_assert!(before.happened_before(&clock).unwrap());
        }
    }

    #[test]
    fn encode_parse_roundtrip(clock in clock_strategy()) {
        let parsed = VectorClock::parse(&clock.encode(), clock.len()).unwrap();
        prop_assert_eq!(parsed, clock);
    }

    #[test]
    fn parse_rejects_other_lengths(clock in clock_strategy(), extra in 1usize..4) {
        let expected = clock.len() + extra;
        let err = VectorClock::parse(&clock.encode(), expected).unwrap_err();
        prop_assert_eq!(err, ProtocolError::SizeMismatch { expected, found: clock.len() });
    }

    #[test]
    fn message_roundtrip(
        clock in clock_strategy(),
        payload in prop::option::of("[a-z \n]{0,24}"),
    ) {
        let source = clock.len() - 1;
        let msg = CausalMessage::new(source, clock.clone(), payload);
        let decoded = CausalMessage::decode(source, &msg.encode(), clock.len()).unwrap();
        prop_assert_eq!(decoded, msg);
    }
}

#[test]
fn comparison_never_truncates() {
    let long = VectorClock::from_slots([0, 0, 0, 0]);
    let short = VectorClock::from_slots([0, 0, 0]);

    assert!(long.greater_or_equal(&short).is_err());
    assert!(short.greater_or_equal(&long).is_err());
    assert!(short.can_deliver(0, &long).is_err());
}
