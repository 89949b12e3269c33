//! Causal delivery tests
//!
//! These tests verify the delivery engine end to end: causal order under
//! arbitrary arrival order, fixpoint completeness, clock monotonicity and
//! behaviour under a reordering/duplicating network.

use cbcast_delivery::{
    CausalCluster, CausalDeliveryEngine, CausalMessage, NetworkConfig, ProtocolError,
    ReceiveOutcome, VectorClock,
};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Build a causal history among `n - 1` broadcasting processes; process
/// `n - 1` only observes. `ops` picks between broadcasting and moving one
/// packet through a FIFO network.
fn causal_history(n: usize, ops: &[(bool, usize)]) -> Vec<CausalMessage> {
    let mut cluster = CausalCluster::new(n, NetworkConfig::default()).unwrap();
    let mut history = Vec::new();

    for (i, &(broadcast, who)) in ops.iter().enumerate() {
        if broadcast {
            let from = who % (n - 1);
            history.push(cluster.broadcast(from, format!("op-{}", i)).unwrap());
        } else {
            cluster.process_one().unwrap();
        }
    }
    history
}

fn assert_causal_order(delivered: &[CausalMessage]) {
    for (i, earlier) in delivered.iter().enumerate() {
        for later in &delivered[i + 1..] {
            assert!(
                !later.clock.happened_before(&earlier.clock).unwrap(),
                "{} delivered before its cause {}",
                earlier.clock,
                later.clock
            );
        }
    }
}

// ============================================================================
// Scenario tests
// ============================================================================

#[test]
fn test_second_message_received_first() {
    let mut p0 = CausalDeliveryEngine::new(0, 3).unwrap();
    let mut p2 = CausalDeliveryEngine::new(2, 3).unwrap();
    let mut own: Vec<CausalMessage> = Vec::new();

    let m1 = p0.broadcast(Some("m1".into()), &mut own).unwrap();
    let m2 = p0.broadcast(Some("m2".into()), &mut own).unwrap();
    assert_eq!(m1.clock.as_slice(), &[1, 0, 0]);
    assert_eq!(m2.clock.as_slice(), &[2, 0, 0]);

    let mut delivered: Vec<CausalMessage> = Vec::new();
    assert_eq!(
        p2.on_receive(m2.clone(), &mut delivered).unwrap(),
        ReceiveOutcome::Buffered
    );
    assert!(delivered.is_empty());

    let mut clocks = Vec::new();
    let mut record = |m: &CausalMessage| clocks.push((m.payload.clone(), m.clock.clone()));
    assert_eq!(
        p2.on_receive(m1.clone(), &mut record).unwrap(),
        ReceiveOutcome::Delivered(2)
    );

    assert_eq!(
        clocks,
        vec![
            (Some("m1".to_string()), m1.clock.clone()),
            (Some("m2".to_string()), m2.clock.clone()),
        ]
    );
    assert_eq!(p2.clock().as_slice(), &[2, 0, 0]);
    assert!(p2.pending().is_empty());
}

#[test]
fn test_slides_scenario() {
    // 0 broadcasts; 1 answers after delivering it; 2 gets the answer first
    let mut p0 = CausalDeliveryEngine::new(0, 3).unwrap();
    let mut p1 = CausalDeliveryEngine::new(1, 3).unwrap();
    let mut p2 = CausalDeliveryEngine::new(2, 3).unwrap();
    let mut log0: Vec<CausalMessage> = Vec::new();
    let mut log1: Vec<CausalMessage> = Vec::new();
    let mut log2: Vec<CausalMessage> = Vec::new();

    let question = p0.broadcast(Some("question".into()), &mut log0).unwrap();
    p1.on_receive(question.clone(), &mut log1).unwrap();
    let answer = p1.broadcast(Some("answer".into()), &mut log1).unwrap();
    assert_eq!(answer.clock.as_slice(), &[1, 1, 0]);

    p0.on_receive(answer.clone(), &mut log0).unwrap();
    assert_eq!(p2.on_receive(answer, &mut log2).unwrap(), ReceiveOutcome::Buffered);
    assert_eq!(
        p2.on_receive(question, &mut log2).unwrap(),
        ReceiveOutcome::Delivered(2)
    );

    for (engine, log) in [(&p0, &log0), (&p1, &log1), (&p2, &log2)] {
        assert_eq!(engine.clock().as_slice(), &[1, 1, 0]);
        let payloads: Vec<_> = log.iter().filter_map(|m| m.payload.as_deref()).collect();
        assert_eq!(payloads, vec!["question", "answer"]);
    }
}

#[test]
fn test_malformed_clock_leaves_state_untouched() {
    let mut engine = CausalDeliveryEngine::new(1, 3).unwrap();
    let mut log: Vec<CausalMessage> = Vec::new();
    engine
        .on_receive(
            CausalMessage::new(0, VectorClock::from_slots([2, 0, 0]), None),
            &mut log,
        )
        .unwrap();

    let err = CausalMessage::decode(0, "[1, 0, 0, 0]\nextra", 3).unwrap_err();
    assert!(matches!(err, ProtocolError::SizeMismatch { .. }));

    let short = CausalMessage::new(0, VectorClock::from_slots([1, 0]), None);
    assert!(engine.on_receive(short, &mut log).is_err());
    assert_eq!(engine.clock().as_slice(), &[0, 0, 0]);
    assert_eq!(engine.pending_count(), 1);
    assert!(log.is_empty());
}

// ============================================================================
// Cluster tests
// ============================================================================

#[test]
fn test_cluster_chaotic_network() {
    for seed in [1u64, 7, 42, 1234, 99999] {
        let mut cluster =
            CausalCluster::new(4, NetworkConfig::chaotic().seeded(seed)).unwrap();

        // interleave broadcasts with partial draining so later broadcasts
        // causally depend on earlier ones
        for round in 0..10 {
            for from in 0..4 {
                if (round + from) % 3 != 0 {
                    cluster.broadcast(from, format!("{}-{}", from, round)).unwrap();
                }
            }
            for _ in 0..5 {
                cluster.process_one().unwrap();
            }
        }
        cluster.drain_network().unwrap();

        assert!(cluster.is_quiescent(), "seed {} did not settle", seed);
        let expected = cluster.clock(0).unwrap().clone();
        for id in 0..4 {
            assert_eq!(cluster.clock(id).unwrap(), &expected);
            assert_eq!(cluster.log(id).unwrap().len() as u64, expected.total());
            assert_causal_order(cluster.log(id).unwrap());
        }
    }
}

#[test]
fn test_cluster_duplicates_delivered_once() {
    let mut cluster = CausalCluster::new(3, NetworkConfig::with_dups(0.9)).unwrap();
    for i in 0..5 {
        cluster.broadcast(i % 2, format!("m{}", i)).unwrap();
    }
    cluster.drain_network().unwrap();

    assert!(cluster.is_quiescent());
    assert_eq!(cluster.clock(2).unwrap().as_slice(), &[3, 2, 0]);
    assert_eq!(cluster.log(2).unwrap().len(), 5);
    assert_eq!(cluster.engine(2).unwrap().delivered_count(), 5);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fixpoint_delivers_any_permutation(
        n in 3usize..6,
        ops in prop::collection::vec((any::<bool>(), 0usize..8), 1..40),
        seed in any::<u64>(),
    ) {
        let history = causal_history(n, &ops);
        let observer = n - 1;

        let mut arrivals = history.clone();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        arrivals.shuffle(&mut rng);

        let mut engine = CausalDeliveryEngine::new(observer, n).unwrap();
        let mut delivered: Vec<CausalMessage> = Vec::new();
        let mut previous = engine.clock().clone();
        for message in arrivals {
            engine.on_receive(message, &mut delivered).unwrap();
            prop_assert!(engine.clock().greater_or_equal(&previous).unwrap());
            previous = engine.clock().clone();
        }

        prop_assert!(engine.pending().is_empty());
        prop_assert_eq!(delivered.len(), history.len());
        assert_causal_order(&delivered);

        let mut expected = VectorClock::new(n);
        for message in &history {
            expected.increment(message.source).unwrap();
        }
        prop_assert_eq!(engine.clock(), &expected);
    }

    #[test]
    fn delivery_order_respects_sender_sequence(
        sends in 1u64..20,
        seed in any::<u64>(),
    ) {
        let mut sender = CausalDeliveryEngine::new(0, 2).unwrap();
        let mut own: Vec<CausalMessage> = Vec::new();
        let mut messages: Vec<_> = (0..sends)
            .map(|_| sender.broadcast(None, &mut own).unwrap())
            .collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        messages.shuffle(&mut rng);

        let mut receiver = CausalDeliveryEngine::new(1, 2).unwrap();
        let mut delivered: Vec<CausalMessage> = Vec::new();
        for message in messages {
            receiver.on_receive(message, &mut delivered).unwrap();
        }

        let sequences: Vec<u64> = delivered.iter().map(|m| m.sequence()).collect();
        prop_assert_eq!(sequences, (1..=sends).collect::<Vec<_>>());
    }
}
