//! Multi-replica delivery harness.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::debug;

use tessera_bft::{Graph, GraphConfig, GraphStats};
use tessera_types::{BlockGraph, Config, Interpreted, NodeId, Phase, Round};

use crate::proposer::{conflicting_variant, HonestNode};

type Outputs = Arc<Mutex<Vec<Interpreted>>>;

struct Replica {
    graph: Graph,
    outputs: Outputs,
}

/// A set of engine replicas fed the same vertex stream.
///
/// Each replica is an independent [`Graph`] sharing no state with the
/// others; the harness plays the role of the gossip layer.
pub struct Cluster {
    replicas: Vec<Replica>,
}

impl Cluster {
    /// `replicas` engines over participants 1..=n.
    pub fn new(n: u64, replicas: usize) -> Self {
        Self::with_options(n, replicas, GraphConfig::default())
    }

    pub fn with_options(n: u64, replicas: usize, opts: GraphConfig) -> Self {
        let replicas = (0..replicas)
            .map(|_| {
                let config = Config::new((1..=n).map(NodeId).collect())
                    .expect("participant ids are unique");
                let outputs: Outputs = Arc::default();
                let sink = outputs.clone();
                let graph = Graph::with_options(config, opts, move |interpreted| {
                    sink.lock().push(interpreted)
                });
                Replica { graph, outputs }
            })
            .collect();
        Self { replicas }
    }

    /// Deliver the vertices to every replica in the given order.
    pub fn deliver_in_order(&mut self, vertices: &[BlockGraph]) {
        for replica in &mut self.replicas {
            for vertex in vertices {
                replica.graph.add(vertex.clone());
            }
        }
    }

    /// Deliver the vertices to one replica in the given order.
    pub fn deliver_to(&mut self, replica: usize, vertices: &[BlockGraph]) {
        for vertex in vertices {
            self.replicas[replica].graph.add(vertex.clone());
        }
    }

    /// Deliver the same vertex set to every replica, each under its own
    /// seeded shuffle. Orphan buffering inside the engine absorbs the
    /// resulting out-of-causal-order arrivals.
    pub fn deliver_shuffled(&mut self, vertices: &[BlockGraph], seed: u64) {
        for (index, replica) in self.replicas.iter_mut().enumerate() {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64));
            let mut schedule: Vec<BlockGraph> = vertices.to_vec();
            schedule.shuffle(&mut rng);
            debug!(replica = index, vertices = schedule.len(), "delivering shuffled schedule");
            for vertex in schedule {
                replica.graph.add(vertex);
            }
        }
    }

    /// Finalized outputs collected by one replica, in emission order.
    pub fn outputs(&self, replica: usize) -> Vec<Interpreted> {
        self.replicas[replica].outputs.lock().clone()
    }

    pub fn stats(&self, replica: usize) -> GraphStats {
        self.replicas[replica].graph.stats()
    }

    pub fn phase(&self, replica: usize, round: Round) -> Option<Phase> {
        self.replicas[replica].graph.round_phase(round)
    }

    pub fn graph_mut(&mut self, replica: usize) -> &mut Graph {
        &mut self.replicas[replica].graph
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Generate `rounds` rounds of fully cross-referencing proposals from n
/// honest nodes: after each round every node integrates every proposal of
/// that round, so the next round's deps target the whole previous round.
/// Vertices are returned in (round, node) order.
pub fn generate_rounds(n: u64, rounds: u64) -> Vec<BlockGraph> {
    let mut nodes: Vec<HonestNode> = (1..=n).map(|id| HonestNode::new(NodeId(id))).collect();
    let mut vertices = Vec::with_capacity((n * rounds) as usize);

    for _ in 0..rounds {
        let proposals: Vec<BlockGraph> = nodes.iter_mut().map(HonestNode::propose).collect();
        for node in &mut nodes {
            for proposal in &proposals {
                if proposal.id().node != node.id() {
                    node.observe(proposal.id().clone());
                }
            }
        }
        vertices.extend(proposals);
    }
    vertices
}

/// Like [`generate_rounds`], but `equivocator` also produces a conflicting
/// duplicate of its `equivocation_round` proposal. Honest nodes only ever
/// integrate the canonical variant. The conflicting vertex is returned
/// separately so schedules can place it explicitly.
pub fn generate_with_equivocator(
    n: u64,
    rounds: u64,
    equivocator: NodeId,
    equivocation_round: u64,
) -> (Vec<BlockGraph>, BlockGraph) {
    let mut nodes: Vec<HonestNode> = (1..=n).map(|id| HonestNode::new(NodeId(id))).collect();
    let mut vertices = Vec::with_capacity((n * rounds) as usize);
    let mut conflicting = None;

    for round in 1..=rounds {
        let proposals: Vec<BlockGraph> = nodes.iter_mut().map(HonestNode::propose).collect();
        for proposal in &proposals {
            if proposal.id().node == equivocator && round == equivocation_round {
                conflicting = Some(conflicting_variant(proposal));
            }
        }
        for node in &mut nodes {
            for proposal in &proposals {
                if proposal.id().node != node.id() {
                    node.observe(proposal.id().clone());
                }
            }
        }
        vertices.extend(proposals);
    }

    let conflicting = conflicting.expect("equivocation round within generated rounds");
    (vertices, conflicting)
}
