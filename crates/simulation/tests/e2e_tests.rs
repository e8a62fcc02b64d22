//! End-to-end scenarios for the consensus engine.
//!
//! These tests run complete vertex histories through engine replicas and
//! check the finalized output, entirely synchronously: no transport, no
//! threads, no wall clock.

use tessera_bft::{Graph, GraphConfig};
use tessera_simulation::{generate_rounds, generate_with_equivocator, Cluster};
use tessera_types::{BlockGraph, Config, NodeId, Phase, Round};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_e2e_four_nodes_total_order() {
    let vertices = generate_rounds(4, 6);
    let mut cluster = Cluster::new(4, 1);
    cluster.deliver_in_order(&vertices);

    // Commit evidence for round r arrives with round r+1 vertices, so the
    // last generated round stays open.
    let outputs = cluster.outputs(0);
    assert_eq!(outputs.len(), 5);
    for (i, interpreted) in outputs.iter().enumerate() {
        assert_eq!(interpreted.round, Round(i as u64 + 1));
        assert_eq!(interpreted.blocks.len(), 4);
        let nodes: Vec<NodeId> = interpreted.blocks.iter().map(|b| b.node).collect();
        assert_eq!(nodes, vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
    }

    let stats = cluster.stats(0);
    assert_eq!(stats.vertices, 24);
    assert_eq!(stats.view_changes, 0);
    assert_eq!(stats.equivocations, 0);
}

#[traced_test]
#[test]
fn test_e2e_single_node_self_chain() {
    let vertices = generate_rounds(1, 4);
    let mut cluster = Cluster::new(1, 1);
    cluster.deliver_in_order(&vertices);

    // With f=0 the quorum is trivial: every round finalizes on arrival.
    let outputs = cluster.outputs(0);
    assert_eq!(outputs.len(), 4);
    for (i, interpreted) in outputs.iter().enumerate() {
        assert_eq!(interpreted.round, Round(i as u64 + 1));
        assert_eq!(interpreted.blocks.len(), 1);
        assert_eq!(interpreted.blocks[0].node, NodeId(1));
    }
}

#[traced_test]
#[test]
fn test_e2e_equivocation_excluded_everywhere() {
    let (vertices, conflicting) = generate_with_equivocator(4, 5, NodeId(3), 2);

    // Schedule the conflicting duplicate right behind its canonical twin.
    let mut schedule: Vec<BlockGraph> = Vec::with_capacity(vertices.len() + 1);
    for vertex in &vertices {
        schedule.push(vertex.clone());
        if vertex.id().slot() == conflicting.id().slot() {
            schedule.push(conflicting.clone());
        }
    }

    let mut cluster = Cluster::new(4, 2);
    cluster.deliver_in_order(&schedule);

    let canonical = vertices
        .iter()
        .find(|v| v.id().node == NodeId(3) && v.id().round == Round(2))
        .unwrap()
        .id()
        .clone();

    for replica in 0..cluster.len() {
        let stats = cluster.stats(replica);
        assert_eq!(stats.equivocations, 1);

        let outputs = cluster.outputs(replica);
        let round2 = outputs.iter().find(|o| o.round == Round(2)).unwrap();
        assert!(round2.blocks.contains(&canonical));
        assert!(!round2.blocks.contains(conflicting.id()));
    }
    assert_eq!(cluster.outputs(0), cluster.outputs(1));
}

#[traced_test]
#[test]
fn test_e2e_reversed_delivery_converges() {
    let vertices = generate_rounds(4, 5);
    let mut reversed = vertices.clone();
    reversed.reverse();

    let mut cluster = Cluster::new(4, 2);
    cluster.deliver_to(0, &vertices);
    cluster.deliver_to(1, &reversed);

    // Fully reversed delivery parks almost everything in the orphan
    // buffer first; the end state must not differ.
    assert_eq!(cluster.outputs(0), cluster.outputs(1));
    assert_eq!(cluster.stats(1).vertices, 20);
    assert_eq!(cluster.stats(1).orphans_buffered, 0);
}

#[traced_test]
#[test]
fn test_e2e_snapshot_recovery() {
    let vertices = generate_rounds(4, 6);
    let config = Config::new((1..=4).map(NodeId).collect()).unwrap();

    let mut outputs_before = Vec::new();
    let collected = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = collected.clone();
    let mut graph = Graph::new(config.clone(), move |i| sink.lock().push(i));
    for vertex in &vertices[..16] {
        graph.add(vertex.clone());
    }
    outputs_before.extend(collected.lock().iter().cloned());
    assert_eq!(outputs_before.len(), 3);

    // Restart from the snapshot and replay the full history plus the
    // rounds the crashed engine never saw.
    let snapshot = graph.snapshot();
    let replayed = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = replayed.clone();
    let mut restored = Graph::restore(config, GraphConfig::default(), snapshot, move |i| {
        sink.lock().push(i)
    });
    for vertex in &vertices {
        restored.add(vertex.clone());
    }

    // Recovered rounds are not re-emitted; only new progress is.
    let replayed = replayed.lock();
    let rounds: Vec<Round> = replayed.iter().map(|i| i.round).collect();
    assert_eq!(rounds, vec![Round(4), Round(5)]);
    for round in 1..=5u64 {
        assert_eq!(restored.round_phase(Round(round)), Some(Phase::Final));
    }
}
