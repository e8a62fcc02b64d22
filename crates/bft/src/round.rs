//! Per-round agreement records.
//!
//! One [`RoundSlot`] exists per open round index. It holds the record for
//! the round's current view: the prepare/commit [`BitSet`], the canonical
//! proposals, per-proposal support bitmaps, and the view-change vote
//! bitmaps keyed by candidate view. All evidence enters through
//! [`RoundSlot::apply`], an exhaustive match over the five protocol
//! messages.

use tessera_types::{
    BitSet, Bitmap, BlockId, Config, ConsensusMessage, Hash, NodeId, Phase, Round, View,
};
use tracing::debug;

use std::collections::BTreeMap;

/// What happened to an applied message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoteOutcome {
    /// The message was counted (or re-counted idempotently).
    Counted,
    /// A proposal already exists for the slot; nothing changed.
    Duplicate,
    /// A vote arrived for a slot with no canonical proposal.
    NoProposal,
    /// The vote backs a hash other than the canonical proposal.
    ConflictingHash,
}

/// Vote bookkeeping for one (round, view).
#[derive(Debug, Clone)]
pub(crate) struct RoundRecord {
    phase: Phase,
    votes: BitSet,
    /// Canonical proposal hash per proposing node.
    proposals: BTreeMap<NodeId, Hash>,
    /// Ordinals vouching for each canonical proposal.
    support: BTreeMap<NodeId, Bitmap>,
}

impl RoundRecord {
    fn new(width: usize) -> Self {
        Self {
            phase: Phase::Hnv,
            votes: BitSet::new(width),
            proposals: BTreeMap::new(),
            support: BTreeMap::new(),
        }
    }

    pub(crate) fn votes(&self) -> &BitSet {
        &self.votes
    }
}

/// State machine for one round index.
#[derive(Debug, Clone)]
pub(crate) struct RoundSlot {
    round: Round,
    view: View,
    width: usize,
    record: RoundRecord,
    /// View-change votes per candidate view.
    view_votes: BTreeMap<View, Bitmap>,
}

impl RoundSlot {
    pub(crate) fn new(round: Round, width: usize) -> Self {
        Self {
            round,
            view: View(0),
            width,
            record: RoundRecord::new(width),
            view_votes: BTreeMap::new(),
        }
    }

    pub(crate) fn round(&self) -> Round {
        self.round
    }

    pub(crate) fn view(&self) -> View {
        self.view
    }

    pub(crate) fn phase(&self) -> Phase {
        self.record.phase
    }

    pub(crate) fn record(&self) -> &RoundRecord {
        &self.record
    }

    pub(crate) fn proposal(&self, node: NodeId) -> Option<&Hash> {
        self.record.proposals.get(&node)
    }

    /// Canonical (node, hash) proposals currently known for this round.
    pub(crate) fn proposals(&self) -> Vec<(NodeId, Hash)> {
        self.record
            .proposals
            .iter()
            .map(|(node, hash)| (*node, hash.clone()))
            .collect()
    }

    pub(crate) fn view_votes(&self, candidate: View) -> usize {
        self.view_votes.get(&candidate).map_or(0, Bitmap::count)
    }

    /// Apply one protocol message to this round's current record.
    ///
    /// Prepare and commit votes are validated against the canonical
    /// proposal they claim to support via [`ConsensusMessage::pre`]; a
    /// vote for a different hash is excluded.
    pub(crate) fn apply(&mut self, msg: &ConsensusMessage, config: &Config) -> VoteOutcome {
        match msg {
            ConsensusMessage::PrePrepare { node, hash, .. } => {
                if self.record.proposals.contains_key(node) {
                    return VoteOutcome::Duplicate;
                }
                self.record.proposals.insert(*node, hash.clone());
                self.record.support.insert(*node, Bitmap::new(self.width));
                VoteOutcome::Counted
            }

            ConsensusMessage::Prepare { node, sender, .. } => {
                let outcome = self.check_vote(msg, *node);
                if outcome != VoteOutcome::Counted {
                    return outcome;
                }
                if let Some(ord) = config.ordinal(*sender) {
                    if let Some(support) = self.record.support.get_mut(node) {
                        support.set(ord);
                    }
                    self.record.votes.set_prepare(ord);
                }
                VoteOutcome::Counted
            }

            ConsensusMessage::Commit { node, sender, .. } => {
                let outcome = self.check_vote(msg, *node);
                if outcome != VoteOutcome::Counted {
                    return outcome;
                }
                if let Some(ord) = config.ordinal(*sender) {
                    self.record.votes.set_commit(ord);
                }
                VoteOutcome::Counted
            }

            ConsensusMessage::ViewChange { view, sender, .. } => {
                if let Some(ord) = config.ordinal(*sender) {
                    self.view_votes
                        .entry(*view)
                        .or_insert_with(|| Bitmap::new(self.width))
                        .set(ord);
                }
                if self.record.phase.can_stall() {
                    debug!(round = self.round.0, candidate = view.0, "round entered View");
                    self.record.phase = Phase::View;
                }
                VoteOutcome::Counted
            }

            ConsensusMessage::NewView { view, .. } => {
                debug!(round = self.round.0, new_view = view.0, "view change quorum");
                self.record.phase = Phase::ViewChanged;
                VoteOutcome::Counted
            }
        }
    }

    /// Validate a prepare/commit vote against the canonical proposal it
    /// claims to support.
    fn check_vote(&self, msg: &ConsensusMessage, node: NodeId) -> VoteOutcome {
        let Some(canonical) = self.record.proposals.get(&node) else {
            return VoteOutcome::NoProposal;
        };
        let expected = ConsensusMessage::PrePrepare {
            node,
            round: self.round,
            view: self.view,
            hash: canonical.clone(),
        };
        match msg.pre() {
            Some(pre) if pre == expected => VoteOutcome::Counted,
            _ => VoteOutcome::ConflictingHash,
        }
    }

    /// Drive the happy-path state machine as far as current votes allow.
    ///
    /// Returns true when the round just reached `Final`; the caller emits
    /// the output and retires the slot. While the record sits in `View`
    /// or `ViewChanged`, votes keep accumulating but transitions are
    /// suspended until the round re-arms.
    pub(crate) fn evaluate(&mut self, quorum: usize) -> bool {
        loop {
            match self.record.phase {
                Phase::Hnv if !self.record.proposals.is_empty() => {
                    debug!(round = self.round.0, view = self.view.0, "round pre-prepared");
                    self.record.phase = Phase::PrePrepared;
                }
                Phase::PrePrepared if self.record.votes.prepare_count() >= quorum => {
                    debug!(round = self.round.0, view = self.view.0, "round prepared");
                    self.record.phase = Phase::Prepared;
                }
                Phase::Prepared if self.record.votes.commit_count() >= quorum => {
                    self.record.phase = Phase::Final;
                    return true;
                }
                _ => return false,
            }
        }
    }

    /// Finalized content for this round: every canonical proposal vouched
    /// for by at least f+1 distinct nodes, ordered ascending by node id
    /// (the `BTreeMap` iteration order).
    pub(crate) fn finalize_content(&self, f: usize) -> Vec<BlockId> {
        self.record
            .proposals
            .iter()
            .filter(|(node, _)| {
                self.record
                    .support
                    .get(node)
                    .is_some_and(|s| s.count() >= f + 1)
            })
            .map(|(node, hash)| BlockId::new(*node, self.round, hash.clone()))
            .collect()
    }

    /// Re-arm the slot at the next view after a completed view change.
    ///
    /// Proposals and support carry over: they are derived from immutable
    /// DAG evidence, so rebuilding them from scratch would produce the
    /// same bits. Prepare votes are rebuilt from the support bitmaps; the
    /// commit plane starts empty and is refreshed by the engine from its
    /// witness index.
    pub(crate) fn rearm(&mut self, new_view: View) {
        self.view = new_view;
        let mut votes = BitSet::new(self.width);
        for support in self.record.support.values() {
            votes.merge_prepares(support);
        }
        self.record.votes = votes;
        self.record.phase = Phase::Hnv;
        self.view_votes.retain(|candidate, _| *candidate > new_view);
    }
}
