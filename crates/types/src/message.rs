//! PBFT message and state vocabulary.
//!
//! In this engine the five message kinds are reconstructed from DAG
//! evidence rather than received over a wire: witnessing a block id
//! materializes a `Prepare`, witnessing a prepare quorum materializes a
//! `Commit`, and so on. An implementation adding an explicit transport
//! must preserve the same field shapes and validation.

use crate::{Hash, NodeId, Round, View};
use serde::{Deserialize, Serialize};

/// Tag of a [`ConsensusMessage`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash, Serialize, Deserialize)]
pub enum MessageKind {
    PrePrepare,
    Prepare,
    Commit,
    ViewChange,
    NewView,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::PrePrepare => "PrePrepare",
            MessageKind::Prepare => "Prepare",
            MessageKind::Commit => "Commit",
            MessageKind::ViewChange => "ViewChange",
            MessageKind::NewView => "NewView",
        };
        write!(f, "{}", name)
    }
}

/// The five protocol messages, each carrying the proposal slot it is
/// about: (node, round, view, hash), plus the voting sender where one
/// exists.
///
/// `ViewChange` and `NewView` concern a whole round rather than one
/// proposal; their `node` is the participant whose vote they record (for
/// `NewView`, the one that completed the quorum) and their `hash` is
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage {
    /// A canonical proposal exists for (node, round) at this view.
    PrePrepare {
        node: NodeId,
        round: Round,
        view: View,
        hash: Hash,
    },
    /// `sender` vouches for the proposal identified by (node, round, hash).
    Prepare {
        node: NodeId,
        round: Round,
        view: View,
        hash: Hash,
        sender: NodeId,
    },
    /// `sender` has witnessed a prepare quorum covering this round.
    Commit {
        node: NodeId,
        round: Round,
        view: View,
        hash: Hash,
        sender: NodeId,
    },
    /// `sender` votes to move the stalled round to candidate view `view`.
    ViewChange {
        node: NodeId,
        round: Round,
        view: View,
        hash: Hash,
        sender: NodeId,
    },
    /// A view-change quorum formed; the round resumes at `view`.
    NewView {
        node: NodeId,
        round: Round,
        view: View,
        hash: Hash,
    },
}

impl ConsensusMessage {
    /// The variant tag.
    pub fn kind(&self) -> MessageKind {
        match self {
            ConsensusMessage::PrePrepare { .. } => MessageKind::PrePrepare,
            ConsensusMessage::Prepare { .. } => MessageKind::Prepare,
            ConsensusMessage::Commit { .. } => MessageKind::Commit,
            ConsensusMessage::ViewChange { .. } => MessageKind::ViewChange,
            ConsensusMessage::NewView { .. } => MessageKind::NewView,
        }
    }

    /// The (node, round) bucket this message belongs to.
    pub fn node_round(&self) -> (NodeId, Round) {
        match self {
            ConsensusMessage::PrePrepare { node, round, .. }
            | ConsensusMessage::Prepare { node, round, .. }
            | ConsensusMessage::Commit { node, round, .. }
            | ConsensusMessage::ViewChange { node, round, .. }
            | ConsensusMessage::NewView { node, round, .. } => (*node, *round),
        }
    }

    /// Project a vote down to the `PrePrepare` identity it claims to
    /// support. Used to check that a vote is about the proposal it
    /// purports to back before counting it. Only prepare and commit votes
    /// carry such an identity.
    pub fn pre(&self) -> Option<ConsensusMessage> {
        match self {
            ConsensusMessage::Prepare {
                node,
                round,
                view,
                hash,
                ..
            }
            | ConsensusMessage::Commit {
                node,
                round,
                view,
                hash,
                ..
            } => Some(ConsensusMessage::PrePrepare {
                node: *node,
                round: *round,
                view: *view,
                hash: hash.clone(),
            }),
            ConsensusMessage::PrePrepare { .. }
            | ConsensusMessage::ViewChange { .. }
            | ConsensusMessage::NewView { .. } => None,
        }
    }
}

/// Per-round agreement state.
///
/// The happy path is `Hnv -> PrePrepared -> Prepared -> Final`; `Final`
/// is terminal and idempotent. The orthogonal failure path on a liveness
/// stall is `{Hnv, PrePrepared, Prepared} -> View -> ViewChanged`, after
/// which the round re-arms at the next view back in `Hnv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No canonical proposal seen for this round yet.
    Hnv,
    /// At least one canonical proposal exists.
    PrePrepared,
    /// 2f+1 distinct nodes vouch for the round.
    Prepared,
    /// 2f+1 distinct nodes witnessed the prepare quorum; output emitted.
    Final,
    /// A stall was observed; view-change votes are being collected.
    View,
    /// A view-change quorum formed; the round is about to re-arm.
    ViewChanged,
}

impl Phase {
    /// Final rounds accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Final)
    }

    /// Phases from which the failure path may begin.
    pub fn can_stall(&self) -> bool {
        matches!(self, Phase::Hnv | Phase::PrePrepared | Phase::Prepared)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Hnv => "Hnv",
            Phase::PrePrepared => "PrePrepared",
            Phase::Prepared => "Prepared",
            Phase::Final => "Final",
            Phase::View => "View",
            Phase::ViewChanged => "ViewChanged",
        };
        write!(f, "{}", name)
    }
}
