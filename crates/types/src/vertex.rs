//! DAG vertex types.

use crate::BlockId;
use serde::{Deserialize, Serialize};

/// Causal witness record.
///
/// A `Dep` inside node A's vertex states: "when A proposed this block, A
/// had already integrated `target` and everything in `observed`". This
/// standing evidence is the protocol's substitute for an explicit
/// acknowledgement message: enough distinct vertices carrying a dep that
/// (directly or transitively) references a block id amount to that block
/// receiving 2f+1 votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dep {
    /// The peer block the depender newly learned about.
    pub target: BlockId,
    /// Ordered set of block ids the depender had already integrated at
    /// proposal time.
    pub observed: Vec<BlockId>,
    /// The target node's most recent own block known to the depender, if
    /// any.
    pub last_own: Option<BlockId>,
}

impl Dep {
    /// A dep on `target` with no further history.
    pub fn new(target: BlockId) -> Self {
        Self {
            target,
            observed: Vec::new(),
            last_own: None,
        }
    }

    /// A dep on `target` carrying the depender's integrated history.
    pub fn with_history(target: BlockId, observed: Vec<BlockId>, last_own: Option<BlockId>) -> Self {
        Self {
            target,
            observed,
            last_own,
        }
    }
}

/// One vertex of the block DAG: a node's own block, its self-parent, and
/// the deps newly learned when proposing it.
///
/// Immutable once constructed. The sole mutation entry point into the
/// consensus engine is `Graph::add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGraph {
    id: BlockId,
    prev: Option<BlockId>,
    deps: Vec<Dep>,
}

impl BlockGraph {
    /// Build a vertex.
    pub fn new(id: BlockId, prev: Option<BlockId>, deps: Vec<Dep>) -> Self {
        Self { id, prev, deps }
    }

    /// This vertex's own block id.
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// The proposer's previous own block, if this is not its first.
    pub fn prev(&self) -> Option<&BlockId> {
        self.prev.as_ref()
    }

    /// The causal witness records attached to this vertex.
    pub fn deps(&self) -> &[Dep] {
        &self.deps
    }

    /// Every block id this vertex references: the self-parent plus, per
    /// dep, the target, the observed history, and the target's last own
    /// block. Does not include the vertex's own id.
    pub fn references(&self) -> impl Iterator<Item = &BlockId> {
        self.prev.iter().chain(self.deps.iter().flat_map(|d| {
            std::iter::once(&d.target)
                .chain(d.observed.iter())
                .chain(d.last_own.iter())
        }))
    }

    /// The block ids that must already be in the DAG before this vertex
    /// can be counted: the self-parent and each dep target. Observed
    /// history is a claim, not a requirement; it may reach arbitrarily far
    /// back.
    pub fn required(&self) -> impl Iterator<Item = &BlockId> {
        self.prev.iter().chain(self.deps.iter().map(|d| &d.target))
    }
}
