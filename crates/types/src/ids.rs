//! Identifier newtypes.

use serde::{Deserialize, Serialize};

/// Participant identifier.
///
/// Assigned by the (out-of-scope) membership layer. The consensus engine
/// treats it as opaque; ordering is only used for the deterministic
/// finalization tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-node proposal sequence number.
///
/// Monotonically increasing per node, but not necessarily consecutive: a
/// node may skip round indices it never proposed in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Round(pub u64);

impl Round {
    /// The round index that follows this one.
    pub fn next(self) -> Round {
        Round(self.0 + 1)
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-round retry counter, incremented on each completed view change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct View(pub u64);

impl View {
    /// The candidate view a stalled round votes to move to.
    pub fn next(self) -> View {
        View(self.0 + 1)
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
