//! Engine output types.

use crate::{BlockId, Hash, NodeId, Round};
use serde::{Deserialize, Serialize};

/// Terminal output of one round of consensus: the finalized, totally
/// ordered block sequence for that round index. Delivered exactly once
/// per round via the engine's callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreted {
    /// The finalized round index.
    pub round: Round,
    /// Finalized blocks, ordered ascending by proposing node id.
    pub blocks: Vec<BlockId>,
}

/// Audit record for a conflicting duplicate proposal.
///
/// Emitted when a node submits two different hashes for the same
/// (node, round) slot. The first-seen proposal stays canonical; the
/// conflicting one is excluded from vote counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivocation {
    /// The offending participant.
    pub node: NodeId,
    /// The slot it equivocated in.
    pub round: Round,
    /// The canonical (first-seen) hash.
    pub canonical: Hash,
    /// The conflicting hash that was excluded.
    pub conflicting: Hash,
}
