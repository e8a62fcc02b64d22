//! Replica determinism under arbitrary delivery orders.
//!
//! The safety core of the protocol: replicas that receive the same vertex
//! set, in whatever order, must produce identical finalized sequences for
//! every round that reaches `Final` on both.

use tessera_simulation::{generate_rounds, Cluster};
use tessera_types::Round;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_shuffled_replicas_agree() {
    let vertices = generate_rounds(4, 6);
    let mut cluster = Cluster::new(4, 4);
    cluster.deliver_shuffled(&vertices, 42);

    let reference = cluster.outputs(0);
    assert_eq!(reference.len(), 5, "rounds 1..=5 should finalize");
    for replica in 1..cluster.len() {
        assert_eq!(
            cluster.outputs(replica),
            reference,
            "replica {replica} diverged from replica 0"
        );
    }
}

#[traced_test]
#[test]
fn test_shuffled_matches_in_order() {
    let vertices = generate_rounds(4, 6);

    let mut ordered = Cluster::new(4, 1);
    ordered.deliver_in_order(&vertices);

    let mut shuffled = Cluster::new(4, 3);
    shuffled.deliver_shuffled(&vertices, 7);

    let reference = ordered.outputs(0);
    for replica in 0..shuffled.len() {
        assert_eq!(shuffled.outputs(replica), reference);
    }
}

#[traced_test]
#[test]
fn test_agreement_across_seeds() {
    let vertices = generate_rounds(7, 5);
    let mut reference = None;

    for seed in [1u64, 99, 12345] {
        let mut cluster = Cluster::new(7, 2);
        cluster.deliver_shuffled(&vertices, seed);
        let outputs = cluster.outputs(0);
        assert_eq!(cluster.outputs(1), outputs);
        match &reference {
            None => reference = Some(outputs),
            Some(reference) => assert_eq!(&outputs, reference, "seed {seed} diverged"),
        }
    }

    let reference = reference.unwrap();
    assert_eq!(reference.len(), 4);
    for interpreted in &reference {
        assert_eq!(interpreted.blocks.len(), 7);
    }
}

#[traced_test]
#[test]
fn test_duplicate_redelivery_is_idempotent() {
    let vertices = generate_rounds(4, 5);
    let mut cluster = Cluster::new(4, 2);

    // Replica 0 gets the set once, replica 1 gets it three times over (an
    // at-least-once transport at its worst).
    cluster.deliver_to(0, &vertices);
    for _ in 0..3 {
        cluster.deliver_to(1, &vertices);
    }

    assert_eq!(cluster.outputs(0), cluster.outputs(1));
    let stats = cluster.stats(1);
    assert_eq!(stats.vertices, 20);
    assert_eq!(stats.duplicates, 40);
    assert_eq!(cluster.phase(1, Round(1)), cluster.phase(0, Round(1)));
}
