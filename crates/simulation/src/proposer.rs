//! Simulated proposers.

use tessera_types::{BlockGraph, BlockId, Dep, Hash, NodeId, Round};

/// A correct participant's proposal state: its own chain head plus the
/// latest block it has integrated from each peer.
#[derive(Debug, Clone)]
pub struct HonestNode {
    id: NodeId,
    round: u64,
    last_own: Option<BlockId>,
    /// Integrated history, in integration order.
    known: Vec<BlockId>,
    /// Latest and previous head seen per peer.
    heads: std::collections::BTreeMap<NodeId, (BlockId, Option<BlockId>)>,
}

impl HonestNode {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            round: 0,
            last_own: None,
            known: Vec::new(),
            heads: std::collections::BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Integrate a peer block into this node's causal knowledge.
    pub fn observe(&mut self, block: BlockId) {
        if self.known.contains(&block) {
            return;
        }
        self.known.push(block.clone());
        let previous = self.heads.get(&block.node).map(|(head, _)| head.clone());
        self.heads.insert(block.node, (block, previous));
    }

    /// Produce this node's next-round vertex: self-parent to its own
    /// chain, one dep per known peer head, observed history attached.
    pub fn propose(&mut self) -> BlockGraph {
        self.propose_salted(0)
    }

    /// Like [`HonestNode::propose`] but with a content salt, so tests can
    /// force distinct hashes for otherwise identical proposals.
    pub fn propose_salted(&mut self, salt: u8) -> BlockGraph {
        self.round += 1;
        let round = Round(self.round);

        let deps: Vec<Dep> = self
            .heads
            .iter()
            .filter(|(peer, _)| **peer != self.id)
            .map(|(_, (head, previous))| {
                Dep::with_history(head.clone(), self.known.clone(), previous.clone())
            })
            .collect();

        let hash = content_hash(self.id, round, self.last_own.as_ref(), &deps, salt);
        let id = BlockId::new(self.id, round, hash);
        let vertex = BlockGraph::new(id.clone(), self.last_own.clone(), deps);

        self.known.push(id.clone());
        self.last_own = Some(id);
        vertex
    }
}

/// A conflicting duplicate of `vertex`: same slot and edges, different
/// content hash. What a Byzantine proposer would gossip to a second
/// audience.
pub fn conflicting_variant(vertex: &BlockGraph) -> BlockGraph {
    let id = vertex.id();
    let mut hasher = blake3::Hasher::new();
    hasher.update(id.hash.as_bytes());
    hasher.update(&[0xff]);
    let conflicting = BlockId::new(
        id.node,
        id.round,
        Hash::from_bytes(hasher.finalize().as_bytes()),
    );
    BlockGraph::new(conflicting, vertex.prev().cloned(), vertex.deps().to_vec())
}

fn content_hash(
    node: NodeId,
    round: Round,
    prev: Option<&BlockId>,
    deps: &[Dep],
    salt: u8,
) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&node.0.to_le_bytes());
    hasher.update(&round.0.to_le_bytes());
    if let Some(prev) = prev {
        hasher.update(prev.hash.as_bytes());
    }
    for dep in deps {
        hasher.update(dep.target.hash.as_bytes());
    }
    hasher.update(&[salt]);
    Hash::from_bytes(hasher.finalize().as_bytes())
}
