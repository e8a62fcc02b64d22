//! Proposal slot identity.

use crate::{Hash, NodeId, Round};
use serde::{Deserialize, Serialize};

/// Identity of one proposal slot: a node's block at one of its rounds.
///
/// Equality and ordering are by (node, round, hash). Field order matters
/// for the derived `Ord`: node first, then round, then hash, which is also
/// the deterministic finalization tie-break.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, std::hash::Hash, Serialize, Deserialize,
)]
pub struct BlockId {
    /// Proposing participant.
    pub node: NodeId,
    /// The node-local proposal sequence number.
    pub round: Round,
    /// Content hash of the proposal. Empty means the id is invalid.
    pub hash: Hash,
}

impl BlockId {
    /// Create a new block id.
    pub fn new(node: NodeId, round: Round, hash: Hash) -> Self {
        Self { node, round, hash }
    }

    /// A block id is valid iff it carries a non-empty content hash.
    pub fn is_valid(&self) -> bool {
        !self.hash.is_empty()
    }

    /// The (node, round) slot this id occupies.
    pub fn slot(&self) -> (NodeId, Round) {
        (self.node, self.round)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{} | {} | {}", self.node, self.round, self.hash)
        } else {
            write!(f, "{} | {}", self.node, self.round)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_valid() {
        let id = BlockId::new(NodeId(3), Round(7), Hash::from_bytes(&[0xab, 0xcd]));
        assert_eq!(id.to_string(), "3 | 7 | abcd");
    }

    #[test]
    fn test_display_invalid() {
        let id = BlockId::new(NodeId(3), Round(7), Hash::empty());
        assert!(!id.is_valid());
        assert_eq!(id.to_string(), "3 | 7");
    }

    #[test]
    fn test_value_equality() {
        let a = BlockId::new(NodeId(1), Round(2), Hash::from_bytes(b"x"));
        let b = BlockId::new(NodeId(1), Round(2), Hash::from_bytes(b"x"));
        let c = BlockId::new(NodeId(1), Round(2), Hash::from_bytes(b"y"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut map = std::collections::HashMap::new();
        map.insert(a, 1u32);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_ordering_node_first() {
        let a = BlockId::new(NodeId(1), Round(9), Hash::from_bytes(b"z"));
        let b = BlockId::new(NodeId(2), Round(1), Hash::from_bytes(b"a"));
        assert!(a < b);
    }
}
