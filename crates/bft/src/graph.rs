//! The DAG consensus engine.
//!
//! [`Graph`] ingests [`BlockGraph`] vertices in arbitrary arrival order,
//! from local proposal and remote gossip alike, reconstructs causal order
//! from prev/dep edges, and runs a PBFT-derived agreement per round index
//! with DAG evidence standing in for network round-trips:
//!
//! - Witnessing a block id (directly, or through a dep's observed
//!   history) is that author's implicit `Prepare` for the block's round.
//! - Witnessing round-supporting vertices from 2f+1 distinct authors is
//!   the author's implicit `Commit`: it saw the prepare quorum.
//!
//! A round reaches `Final` when 2f+1 distinct authors commit; the
//! finalized, totally ordered block sequence is delivered through the
//! callback registered at construction. Finality is terminal: replaying
//! already-final evidence is a no-op.

use tessera_types::{
    Bitmap, BlockGraph, BlockId, Config, ConsensusMessage, Equivocation, Hash, Interpreted,
    NodeId, Phase, Round, View,
};
use tracing::{debug, info, warn};

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::pending::OrphanBuffer;
use crate::round::{RoundSlot, VoteOutcome};

/// Callback invoked once per finalized round.
pub type InterpretedCallback = Box<dyn FnMut(Interpreted) + Send>;

/// Optional audit callback for equivocation evidence.
pub type EquivocationCallback = Box<dyn FnMut(Equivocation) + Send>;

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// How many rounds ahead the DAG must have moved before a round below
    /// `Prepared` is considered stalled. Liveness is driven by this
    /// observed activity, never by wall-clock timers.
    pub stall_threshold: u64,

    /// Upper bound on buffered orphan vertices.
    pub max_orphans: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            stall_threshold: 3,
            max_orphans: 1024,
        }
    }
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStats {
    /// Canonical vertices ingested.
    pub vertices: u64,
    /// Exact duplicates ignored.
    pub duplicates: u64,
    /// Structurally invalid vertices rejected.
    pub rejected: u64,
    /// Conflicting duplicates excluded.
    pub equivocations: u64,
    /// Vertices currently parked on a missing dependency.
    pub orphans_buffered: u64,
    /// Completed view changes across all rounds.
    pub view_changes: u64,
    /// Rounds that reached `Final`.
    pub rounds_finalized: u64,
}

/// Restorable finalization state.
///
/// The graph is rebuildable by replaying the full vertex history; a
/// snapshot only short-circuits that by pre-marking rounds final so their
/// output is not emitted again.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphSnapshot {
    finalized: BTreeMap<Round, Vec<BlockId>>,
}

/// Leaderless DAG-BFT consensus engine for one replica.
///
/// Logically single-writer: [`Graph::add`] must not run concurrently with
/// itself. Wrap the engine in [`crate::SharedGraph`] (or any other single
/// lock) when multiple callers feed it. `add` performs no I/O and never
/// blocks; callbacks are dispatched only after every state transition of
/// the call has completed.
pub struct Graph {
    config: Config,
    opts: GraphConfig,

    /// Canonical vertex per (node, round) slot. First seen wins.
    vertices: HashMap<(NodeId, Round), BlockGraph>,

    /// Rounds each canonical vertex witnesses (its own plus every valid
    /// reference's round).
    supports: HashMap<(NodeId, Round), BTreeSet<Round>>,

    /// Per author ordinal: for each open round, the authors of
    /// round-supporting vertices this author has witnessed. Commit
    /// evidence derives from the population counts here.
    witness: Vec<BTreeMap<Round, Bitmap>>,

    /// Open (non-final) round slots.
    rounds: BTreeMap<Round, RoundSlot>,

    /// Finalized output per round, in emission shape.
    finalized: BTreeMap<Round, Vec<BlockId>>,

    /// Vertices waiting for a missing causal parent.
    orphans: OrphanBuffer,

    /// Observed-history claims on block ids not yet ingested, by claiming
    /// author ordinal. Replayed when the id arrives.
    claims: BTreeMap<BlockId, Bitmap>,

    max_round_seen: Round,

    outbox: Vec<Interpreted>,
    equivocation_outbox: Vec<Equivocation>,
    on_interpreted: InterpretedCallback,
    on_equivocation: Option<EquivocationCallback>,

    stats: GraphStats,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.config.num_nodes())
            .field("vertices", &self.vertices.len())
            .field("open_rounds", &self.rounds.len())
            .field("finalized", &self.finalized.len())
            .finish()
    }
}

impl Graph {
    /// Create an engine over a fixed participant set.
    ///
    /// `on_interpreted` receives each finalized round exactly once. It is
    /// called after `add` has finished mutating state; it must not call
    /// back into the same engine synchronously.
    pub fn new(
        config: Config,
        on_interpreted: impl FnMut(Interpreted) + Send + 'static,
    ) -> Self {
        Self::with_options(config, GraphConfig::default(), on_interpreted)
    }

    /// Create an engine with explicit tuning knobs.
    pub fn with_options(
        config: Config,
        opts: GraphConfig,
        on_interpreted: impl FnMut(Interpreted) + Send + 'static,
    ) -> Self {
        let n = config.num_nodes();
        Self {
            config,
            opts,
            vertices: HashMap::new(),
            supports: HashMap::new(),
            witness: vec![BTreeMap::new(); n],
            rounds: BTreeMap::new(),
            finalized: BTreeMap::new(),
            orphans: OrphanBuffer::new(opts.max_orphans),
            claims: BTreeMap::new(),
            max_round_seen: Round(0),
            outbox: Vec::new(),
            equivocation_outbox: Vec::new(),
            on_interpreted: Box::new(on_interpreted),
            on_equivocation: None,
            stats: GraphStats::default(),
        }
    }

    /// Rebuild an engine from a snapshot. Rounds recorded there are
    /// already final; replayed evidence for them is a no-op and their
    /// output is not emitted again.
    pub fn restore(
        config: Config,
        opts: GraphConfig,
        snapshot: GraphSnapshot,
        on_interpreted: impl FnMut(Interpreted) + Send + 'static,
    ) -> Self {
        let mut graph = Self::with_options(config, opts, on_interpreted);
        graph.stats.rounds_finalized = snapshot.finalized.len() as u64;
        if let Some(max) = snapshot.finalized.keys().next_back() {
            graph.max_round_seen = *max;
        }
        graph.finalized = snapshot.finalized;
        graph
    }

    /// Register an audit sink for equivocation evidence.
    pub fn on_equivocation(&mut self, cb: impl FnMut(Equivocation) + Send + 'static) {
        self.on_equivocation = Some(Box::new(cb));
    }

    /// Ingest one DAG vertex.
    ///
    /// Never fails for benign adversarial input: duplicates are ignored,
    /// equivocations are excluded and audited, vertices with missing
    /// causal parents are parked and retried automatically once the
    /// parent arrives. Only structurally invalid input (empty hash,
    /// unknown participant) is rejected, with no state change.
    pub fn add(&mut self, vertex: BlockGraph) {
        let mut work = VecDeque::from([vertex]);
        while let Some(v) = work.pop_front() {
            if let Some(id) = self.ingest(v) {
                work.extend(self.orphans.take(&id));
            }
        }
        self.dispatch();
    }

    fn ingest(&mut self, vertex: BlockGraph) -> Option<BlockId> {
        let id = vertex.id().clone();

        if !id.is_valid() {
            warn!(vertex = %id, "rejecting vertex with empty hash");
            self.stats.rejected += 1;
            return None;
        }
        let Some(author_ord) = self.config.ordinal(id.node) else {
            warn!(vertex = %id, "rejecting vertex from unknown participant");
            self.stats.rejected += 1;
            return None;
        };

        if let Some(existing) = self.vertices.get(&id.slot()) {
            if existing.id().hash == id.hash {
                debug!(vertex = %id, "duplicate vertex ignored");
                self.stats.duplicates += 1;
            } else {
                warn!(node = %id.node, round = id.round.0, "equivocation detected");
                self.stats.equivocations += 1;
                self.equivocation_outbox.push(Equivocation {
                    node: id.node,
                    round: id.round,
                    canonical: existing.id().hash.clone(),
                    conflicting: id.hash.clone(),
                });
            }
            return None;
        }

        // The self-parent and every dep target must be in the DAG before
        // this vertex can be counted.
        let missing = vertex
            .required()
            .find(|r| {
                r.is_valid()
                    && self.config.contains(r.node)
                    && !self.vertices.contains_key(&r.slot())
            })
            .cloned();
        if let Some(missing) = missing {
            self.orphans.insert(missing, vertex);
            return None;
        }

        debug!(vertex = %id, "vertex ingested");
        self.stats.vertices += 1;
        if id.round > self.max_round_seen {
            self.max_round_seen = id.round;
        }

        let mut own_supports: BTreeSet<Round> = BTreeSet::new();
        own_supports.insert(id.round);
        let mut refs: BTreeSet<BlockId> = BTreeSet::new();
        for r in vertex.references() {
            if !r.is_valid() {
                debug!(vertex = %id, reference = %r, "skipping invalid reference");
                continue;
            }
            if !self.config.contains(r.node) {
                debug!(vertex = %id, reference = %r, "skipping reference to unknown participant");
                continue;
            }
            own_supports.insert(r.round);
            refs.insert(r.clone());
        }
        self.vertices.insert(id.slot(), vertex);
        self.supports.insert(id.slot(), own_supports.clone());

        let mut touched = own_supports.clone();

        // This vertex is its own slot's implicit PrePrepare, plus a
        // prepare vote by its author.
        self.apply_proposal(&id);
        self.apply_prepare(&id, id.node);
        self.note_witness(author_ord, author_ord, &own_supports);

        for reference in &refs {
            match self.vertices.get(&reference.slot()) {
                Some(canonical) => {
                    let matches = canonical.id().hash == reference.hash;
                    self.apply_prepare(reference, id.node);
                    let Some(supporter_ord) = self.config.ordinal(reference.node) else {
                        continue;
                    };
                    if matches {
                        if let Some(supported) = self.supports.get(&reference.slot()).cloned() {
                            touched.extend(supported.iter().copied());
                            self.note_witness(author_ord, supporter_ord, &supported);
                        }
                    }
                }
                None => {
                    // A claim about history we have not seen; count it
                    // once the block arrives. Claims on finalized rounds
                    // can no longer change anything.
                    if self.finalized.contains_key(&reference.round) {
                        continue;
                    }
                    self.claims
                        .entry(reference.clone())
                        .or_insert_with(|| Bitmap::new(self.config.num_nodes()))
                        .set(author_ord);
                }
            }
        }

        // Replay claims other authors made about this block before it
        // arrived.
        if let Some(claimants) = self.claims.remove(&id) {
            for claimant_ord in claimants.set_indices() {
                if let Some(claimant) = self.config.node_at(claimant_ord) {
                    self.apply_prepare(&id, claimant);
                    self.note_witness(claimant_ord, author_ord, &own_supports);
                }
            }
        }

        for round in touched {
            if self.finalized.contains_key(&round) {
                continue;
            }
            self.refresh_commits(round);
            self.evaluate_round(round);
        }

        self.scan_stalls(id.node, id.round);

        Some(id)
    }

    /// Record that `observer` has witnessed a vertex by `supporter` that
    /// supports each of `rounds`.
    fn note_witness(&mut self, observer: usize, supporter: usize, rounds: &BTreeSet<Round>) {
        let n = self.config.num_nodes();
        for round in rounds {
            if self.finalized.contains_key(round) {
                continue;
            }
            self.witness[observer]
                .entry(*round)
                .or_insert_with(|| Bitmap::new(n))
                .set(supporter);
        }
    }

    /// Install the canonical proposal for a slot.
    fn apply_proposal(&mut self, id: &BlockId) {
        if self.finalized.contains_key(&id.round) {
            return;
        }
        let width = self.config.num_nodes();
        let slot = self
            .rounds
            .entry(id.round)
            .or_insert_with(|| RoundSlot::new(id.round, width));
        let msg = ConsensusMessage::PrePrepare {
            node: id.node,
            round: id.round,
            view: slot.view(),
            hash: id.hash.clone(),
        };
        slot.apply(&msg, &self.config);
    }

    /// Count `sender`'s implicit prepare vote for the referenced block.
    fn apply_prepare(&mut self, target: &BlockId, sender: NodeId) {
        if self.finalized.contains_key(&target.round) {
            return;
        }
        let Some(slot) = self.rounds.get_mut(&target.round) else {
            return;
        };
        let msg = ConsensusMessage::Prepare {
            node: target.node,
            round: target.round,
            view: slot.view(),
            hash: target.hash.clone(),
            sender,
        };
        match slot.apply(&msg, &self.config) {
            VoteOutcome::ConflictingHash => {
                debug!(target = %target, sender = %sender, "vote for non-canonical hash excluded");
            }
            VoteOutcome::NoProposal => {
                debug!(target = %target, sender = %sender, "vote without proposal ignored");
            }
            VoteOutcome::Counted | VoteOutcome::Duplicate => {}
        }
    }

    /// Materialize commit votes for every author whose witness index now
    /// covers a prepare quorum for `round`.
    fn refresh_commits(&mut self, round: Round) {
        let quorum = self.config.quorum();
        let Some(slot) = self.rounds.get(&round) else {
            return;
        };
        let view = slot.view();
        let proposals = slot.proposals();

        let committers: Vec<NodeId> = (0..self.config.num_nodes())
            .filter(|ord| {
                self.witness[*ord]
                    .get(&round)
                    .is_some_and(|seen| seen.count() >= quorum)
            })
            .filter_map(|ord| self.config.node_at(ord))
            .collect();
        if committers.is_empty() {
            return;
        }

        let Some(slot) = self.rounds.get_mut(&round) else {
            return;
        };
        for sender in committers {
            for (node, hash) in &proposals {
                let msg = ConsensusMessage::Commit {
                    node: *node,
                    round,
                    view,
                    hash: hash.clone(),
                    sender,
                };
                slot.apply(&msg, &self.config);
            }
        }
    }

    /// Drive a round's state machine; on `Final`, emit its output and
    /// retire the slot.
    fn evaluate_round(&mut self, round: Round) {
        let quorum = self.config.quorum();
        let f = self.config.f();
        let Some(slot) = self.rounds.get_mut(&round) else {
            return;
        };
        if !slot.evaluate(quorum) {
            return;
        }

        let blocks = slot.finalize_content(f);
        info!(
            round = round.0,
            view = slot.view().0,
            blocks = blocks.len(),
            "round finalized"
        );
        self.rounds.remove(&round);
        self.finalized.insert(round, blocks.clone());
        self.stats.rounds_finalized += 1;
        for per_author in &mut self.witness {
            per_author.remove(&round);
        }
        self.claims.retain(|id, _| id.round != round);
        self.outbox.push(Interpreted { round, blocks });
    }

    /// Cast stall votes for every open round the DAG has visibly moved
    /// past, on behalf of the author whose vertex demonstrated the
    /// movement.
    fn scan_stalls(&mut self, author: NodeId, observed_round: Round) {
        let threshold = self.opts.stall_threshold;
        let stalled: Vec<Round> = self
            .rounds
            .iter()
            .filter(|(round, slot)| {
                round.0 + threshold <= observed_round.0 && slot.stall_eligible()
            })
            .map(|(round, _)| *round)
            .collect();

        for round in stalled {
            let completed = match self.rounds.get_mut(&round) {
                Some(slot) => slot.record_stall_vote(author, &self.config),
                None => None,
            };
            if completed.is_some() {
                self.stats.view_changes += 1;
                self.refresh_commits(round);
                self.evaluate_round(round);
            }
        }
    }

    /// Deliver queued outputs. All state transitions for the current
    /// `add` are complete before this runs.
    fn dispatch(&mut self) {
        for notice in std::mem::take(&mut self.equivocation_outbox) {
            if let Some(cb) = self.on_equivocation.as_mut() {
                cb(notice);
            }
        }
        for out in std::mem::take(&mut self.outbox) {
            (self.on_interpreted)(out);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════════

    /// The participant set this engine runs over.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Engine statistics.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            orphans_buffered: self.orphans.len() as u64,
            ..self.stats
        }
    }

    /// Current phase of a round, if the engine has any state for it.
    pub fn round_phase(&self, round: Round) -> Option<Phase> {
        if self.finalized.contains_key(&round) {
            return Some(Phase::Final);
        }
        self.rounds.get(&round).map(RoundSlot::phase)
    }

    /// Current view of an open round.
    pub fn current_view(&self, round: Round) -> Option<View> {
        self.rounds.get(&round).map(RoundSlot::view)
    }

    /// Distinct prepare votes counted for an open round.
    pub fn prepare_count(&self, round: Round) -> usize {
        self.rounds
            .get(&round)
            .map_or(0, |slot| slot.record().votes().prepare_count())
    }

    /// Distinct commit votes counted for an open round.
    pub fn commit_count(&self, round: Round) -> usize {
        self.rounds
            .get(&round)
            .map_or(0, |slot| slot.record().votes().commit_count())
    }

    /// Canonical hash proposed by `node` at `round`, if known and the
    /// round is still open.
    pub fn proposal(&self, node: NodeId, round: Round) -> Option<&Hash> {
        self.rounds.get(&round).and_then(|slot| slot.proposal(node))
    }

    /// The canonical vertex at a slot.
    pub fn vertex(&self, node: NodeId, round: Round) -> Option<&BlockGraph> {
        self.vertices.get(&(node, round))
    }

    /// Whether a block id matches the canonical vertex at its slot.
    pub fn contains(&self, id: &BlockId) -> bool {
        self.vertices
            .get(&id.slot())
            .is_some_and(|v| v.id().hash == id.hash)
    }

    /// Finalized output for a round, if it reached `Final`.
    pub fn interpreted(&self, round: Round) -> Option<&[BlockId]> {
        self.finalized.get(&round).map(Vec::as_slice)
    }

    /// Highest round index seen on any ingested vertex.
    pub fn max_round_seen(&self) -> Round {
        self.max_round_seen
    }

    /// Restorable finalization state.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            finalized: self.finalized.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_types::Dep;
    use tracing_test::traced_test;

    type Outputs = Arc<parking_lot::Mutex<Vec<Interpreted>>>;

    fn collector() -> (Outputs, impl FnMut(Interpreted) + Send + 'static) {
        let outputs: Outputs = Arc::default();
        let sink = outputs.clone();
        (outputs, move |interpreted| sink.lock().push(interpreted))
    }

    fn cfg(n: u64) -> Config {
        Config::new((1..=n).map(NodeId).collect()).unwrap()
    }

    fn bid(node: u64, round: u64) -> BlockId {
        BlockId::new(
            NodeId(node),
            Round(round),
            Hash::from_bytes(&[node as u8, round as u8]),
        )
    }

    /// A fully cross-referencing vertex: prev chains to the node's own
    /// previous block, deps target every peer's previous-round block and
    /// carry the full observed history.
    fn happy_vertex(node: u64, round: u64, n: u64) -> BlockGraph {
        if round == 1 {
            return BlockGraph::new(bid(node, 1), None, vec![]);
        }
        let observed: Vec<BlockId> = (1..round)
            .flat_map(|r| (1..=n).map(move |j| bid(j, r)))
            .collect();
        let deps = (1..=n)
            .filter(|j| *j != node)
            .map(|j| {
                Dep::with_history(
                    bid(j, round - 1),
                    observed.clone(),
                    (round > 2).then(|| bid(j, round - 2)),
                )
            })
            .collect();
        BlockGraph::new(bid(node, round), Some(bid(node, round - 1)), deps)
    }

    #[traced_test]
    #[test]
    fn test_single_node_chain_finalizes_each_round() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(1), sink);

        for round in 1..=4u64 {
            graph.add(happy_vertex(1, round, 1));
        }

        let outputs = outputs.lock();
        assert_eq!(outputs.len(), 4);
        for (i, interpreted) in outputs.iter().enumerate() {
            let round = i as u64 + 1;
            assert_eq!(interpreted.round, Round(round));
            assert_eq!(interpreted.blocks, vec![bid(1, round)]);
            assert_eq!(graph.round_phase(Round(round)), Some(Phase::Final));
        }
    }

    #[test]
    fn test_rejects_structurally_invalid_input() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        let empty_hash = BlockId::new(NodeId(1), Round(1), Hash::empty());
        graph.add(BlockGraph::new(empty_hash, None, vec![]));

        let unknown = BlockId::new(NodeId(99), Round(1), Hash::from_bytes(b"x"));
        graph.add(BlockGraph::new(unknown, None, vec![]));

        assert_eq!(graph.stats().rejected, 2);
        assert_eq!(graph.stats().vertices, 0);
        assert_eq!(graph.round_phase(Round(1)), None);
        assert!(outputs.lock().is_empty());
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        graph.add(happy_vertex(1, 1, 4));
        let before_prepares = graph.prepare_count(Round(1));
        graph.add(happy_vertex(1, 1, 4));

        assert_eq!(graph.stats().vertices, 1);
        assert_eq!(graph.stats().duplicates, 1);
        assert_eq!(graph.prepare_count(Round(1)), before_prepares);
        assert!(outputs.lock().is_empty());
    }

    #[traced_test]
    #[test]
    fn test_equivocation_excluded_from_counting() {
        let (_outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);
        let notices: Arc<parking_lot::Mutex<Vec<Equivocation>>> = Arc::default();
        let audit = notices.clone();
        graph.on_equivocation(move |notice| audit.lock().push(notice));

        graph.add(happy_vertex(3, 1, 4));
        let prepares = graph.prepare_count(Round(1));
        let commits = graph.commit_count(Round(1));

        let conflicting = BlockId::new(NodeId(3), Round(1), Hash::from_bytes(b"other"));
        graph.add(BlockGraph::new(conflicting, None, vec![]));

        assert_eq!(graph.stats().equivocations, 1);
        assert_eq!(graph.prepare_count(Round(1)), prepares);
        assert_eq!(graph.commit_count(Round(1)), commits);
        // First seen stays canonical.
        assert!(graph.contains(&bid(3, 1)));

        let notices = notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].node, NodeId(3));
        assert_eq!(notices[0].round, Round(1));
        assert_eq!(notices[0].canonical, bid(3, 1).hash);
        assert_eq!(notices[0].conflicting, Hash::from_bytes(b"other"));
    }

    #[test]
    fn test_orphan_buffered_and_reprocessed() {
        let (_outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        // Self-parent missing.
        graph.add(happy_vertex(1, 2, 4));
        assert!(graph.vertex(NodeId(1), Round(2)).is_none());
        assert_eq!(graph.stats().orphans_buffered, 1);

        // Dep target missing too: round-2 vertices need every round-1 block.
        graph.add(happy_vertex(1, 1, 4));
        assert!(graph.vertex(NodeId(1), Round(1)).is_some());
        // Still parked: peers' round-1 blocks are absent.
        assert!(graph.vertex(NodeId(1), Round(2)).is_none());

        for node in 2..=4u64 {
            graph.add(happy_vertex(node, 1, 4));
        }
        // The parked vertex was re-submitted automatically.
        assert!(graph.vertex(NodeId(1), Round(2)).is_some());
        assert_eq!(graph.stats().orphans_buffered, 0);
    }

    #[test]
    fn test_two_node_dep_corroboration() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(2), sink);

        // Node 2's round-1 block, then node 1's round-2 vertex carrying it
        // as a dep. With n=2, f=0 and quorum is trivial.
        graph.add(BlockGraph::new(bid(2, 1), None, vec![]));
        graph.add(BlockGraph::new(
            bid(1, 2),
            None,
            vec![Dep::with_history(bid(2, 1), vec![bid(2, 1)], None)],
        ));

        let phase = graph.round_phase(Round(1)).unwrap();
        assert!(
            phase == Phase::PrePrepared || phase == Phase::Prepared || phase == Phase::Final,
            "round 1 should be at least PrePrepared, got {phase}"
        );
        let outputs = outputs.lock();
        assert_eq!(outputs[0].round, Round(1));
        assert_eq!(outputs[0].blocks, vec![bid(2, 1)]);
    }

    #[test]
    fn test_corroborating_deps_advance_phase() {
        let (_outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        graph.add(happy_vertex(3, 1, 4));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::PrePrepared));
        assert_eq!(graph.prepare_count(Round(1)), 1);

        // Two later vertices from other nodes reference node 3's block.
        let witness = |node: u64| {
            BlockGraph::new(
                bid(node, 2),
                None,
                vec![Dep::with_history(bid(3, 1), vec![bid(3, 1)], None)],
            )
        };
        graph.add(witness(1));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::PrePrepared));
        assert_eq!(graph.prepare_count(Round(1)), 2);

        graph.add(witness(2));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::Prepared));
        assert_eq!(graph.prepare_count(Round(1)), 3);
    }

    #[traced_test]
    #[test]
    fn test_four_node_happy_path_total_order() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        for round in 1..=4u64 {
            for node in 1..=4u64 {
                graph.add(happy_vertex(node, round, 4));
            }
        }

        let outputs = outputs.lock();
        // Commit evidence for round r comes from round r+1 vertices, so
        // rounds 1..=3 finalize and round 4 stays open.
        assert_eq!(outputs.len(), 3);
        for (i, interpreted) in outputs.iter().enumerate() {
            let round = i as u64 + 1;
            assert_eq!(interpreted.round, Round(round));
            let expected: Vec<BlockId> = (1..=4).map(|node| bid(node, round)).collect();
            assert_eq!(interpreted.blocks, expected);
        }
        assert_eq!(graph.round_phase(Round(4)), Some(Phase::Prepared));
        assert_eq!(graph.stats().view_changes, 0);
        assert_eq!(graph.stats().rounds_finalized, 3);
    }

    #[test]
    fn test_quorum_counts_monotonic() {
        let (_outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        let mut high_water: std::collections::HashMap<Round, (usize, usize)> =
            std::collections::HashMap::new();
        for round in 1..=3u64 {
            for node in 1..=4u64 {
                graph.add(happy_vertex(node, round, 4));
                for tracked in 1..=3u64 {
                    let tracked = Round(tracked);
                    if graph.round_phase(tracked) == Some(Phase::Final) {
                        continue;
                    }
                    let now = (graph.prepare_count(tracked), graph.commit_count(tracked));
                    let best = high_water.entry(tracked).or_insert((0, 0));
                    assert!(now.0 >= best.0, "prepare count regressed for {tracked:?}");
                    assert!(now.1 >= best.1, "commit count regressed for {tracked:?}");
                    *best = now;
                }
            }
        }
    }

    #[traced_test]
    #[test]
    fn test_stalled_round_view_changes_without_blocking_others() {
        let (_outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        // Node 1 proposes round 1; nobody ever references it.
        graph.add(BlockGraph::new(bid(1, 1), None, vec![]));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::PrePrepared));

        // Nodes 2 and 3 surface far-ahead activity: stall votes, no quorum.
        graph.add(BlockGraph::new(bid(2, 4), None, vec![]));
        graph.add(BlockGraph::new(bid(3, 4), None, vec![]));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::View));
        assert_eq!(graph.current_view(Round(1)), Some(View(0)));

        // Third distinct author completes the 2f+1 view-change quorum.
        graph.add(BlockGraph::new(bid(4, 4), None, vec![]));
        assert_eq!(graph.stats().view_changes, 1);
        assert_eq!(graph.current_view(Round(1)), Some(View(1)));
        assert_eq!(graph.round_phase(Round(1)), Some(Phase::PrePrepared));

        // The stalled round never blocked round 4.
        assert_eq!(graph.round_phase(Round(4)), Some(Phase::Prepared));
    }

    #[traced_test]
    #[test]
    fn test_stalled_round_finalizes_after_late_evidence() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);

        graph.add(BlockGraph::new(bid(1, 1), None, vec![]));
        for node in 2..=4u64 {
            graph.add(BlockGraph::new(bid(node, 4), None, vec![]));
        }
        assert_eq!(graph.stats().view_changes, 1);

        // Late evidence: nodes 2..4 reference node 1's block at round 5,
        // then cross-reference each other at round 6 so every author
        // witnesses a prepare quorum for round 1.
        for node in 2..=4u64 {
            graph.add(BlockGraph::new(
                bid(node, 5),
                Some(bid(node, 4)),
                vec![Dep::with_history(bid(1, 1), vec![bid(1, 1)], None)],
            ));
        }
        for node in 2..=4u64 {
            let deps = (2..=4u64)
                .filter(|peer| *peer != node)
                .map(|peer| Dep::with_history(bid(peer, 5), vec![bid(1, 1)], None))
                .collect();
            graph.add(BlockGraph::new(bid(node, 6), Some(bid(node, 5)), deps));
        }

        assert_eq!(graph.round_phase(Round(1)), Some(Phase::Final));
        let outputs = outputs.lock();
        let round1 = outputs.iter().find(|o| o.round == Round(1)).unwrap();
        assert_eq!(round1.blocks, vec![bid(1, 1)]);
        assert!(graph.stats().view_changes >= 1);
    }

    #[test]
    fn test_snapshot_restore_suppresses_reemission() {
        let (outputs, sink) = collector();
        let mut graph = Graph::new(cfg(4), sink);
        for round in 1..=4u64 {
            for node in 1..=4u64 {
                graph.add(happy_vertex(node, round, 4));
            }
        }
        assert_eq!(outputs.lock().len(), 3);
        let snapshot = graph.snapshot();

        let (replay_outputs, replay_sink) = collector();
        let mut restored =
            Graph::restore(cfg(4), GraphConfig::default(), snapshot, replay_sink);
        for round in 1..=4u64 {
            for node in 1..=4u64 {
                restored.add(happy_vertex(node, round, 4));
            }
        }

        // Replayed evidence for recovered rounds is a no-op.
        assert!(replay_outputs.lock().is_empty());
        assert_eq!(restored.stats().rounds_finalized, 3);
        for round in 1..=3u64 {
            assert_eq!(restored.round_phase(Round(round)), Some(Phase::Final));
            assert_eq!(
                restored.interpreted(Round(round)),
                graph.interpreted(Round(round))
            );
        }
    }

    #[test]
    fn test_orphan_buffer_respects_cap() {
        let (_outputs, sink) = collector();
        let opts = GraphConfig {
            stall_threshold: 3,
            max_orphans: 2,
        };
        let mut graph = Graph::with_options(cfg(4), opts, sink);

        for round in 2..=5u64 {
            graph.add(happy_vertex(1, round, 4));
        }
        assert!(graph.stats().orphans_buffered <= 2);
    }
}
