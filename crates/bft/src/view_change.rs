//! View change bookkeeping for liveness.
//!
//! There are no timers here. A round stalls when the DAG itself shows the
//! network moving on without it: a vertex arrives whose round is at least
//! `stall_threshold` ahead of a round still below `Prepared`. The
//! arriving vertex's author is taken as voting to move that round to its
//! next view. At 2f+1 such votes a `NewView` is recorded and the round
//! re-arms one view higher; accumulated DAG evidence is re-counted there,
//! so a round that later gathers quorum still finalizes. Unrelated rounds
//! and other nodes' progress are never blocked by one stalled round.

use tessera_types::{Config, ConsensusMessage, Hash, NodeId, View};
use tracing::info;

use crate::round::RoundSlot;

impl RoundSlot {
    /// Record a stall vote by `voter` for this round's next view.
    ///
    /// Returns the completed view change's new view when this vote closed
    /// the quorum, `None` otherwise. On quorum the slot is re-armed; the
    /// caller refreshes the commit plane and re-evaluates.
    pub(crate) fn record_stall_vote(
        &mut self,
        voter: NodeId,
        config: &Config,
    ) -> Option<View> {
        let candidate = self.view().next();
        let vote = ConsensusMessage::ViewChange {
            node: voter,
            round: self.round(),
            view: candidate,
            hash: Hash::empty(),
            sender: voter,
        };
        self.apply(&vote, config);

        if self.view_votes(candidate) < config.quorum() {
            return None;
        }

        let new_view = ConsensusMessage::NewView {
            node: voter,
            round: self.round(),
            view: candidate,
            hash: Hash::empty(),
        };
        self.apply(&new_view, config);

        info!(
            round = self.round().0,
            new_view = candidate.0,
            "view change applied"
        );
        self.rearm(candidate);
        Some(candidate)
    }

    /// Whether this slot can take part in a view change right now: it is
    /// on the happy path below `Prepared`'s exit, or already collecting
    /// votes.
    pub(crate) fn stall_eligible(&self) -> bool {
        self.phase().can_stall() || self.phase() == tessera_types::Phase::View
    }
}
