//! Leaderless DAG-BFT consensus engine.
//!
//! This crate converts causally-linked block proposals gossiped by n
//! participants into a single global total order of finalized blocks,
//! tolerating up to f Byzantine or crashed participants (n >= 3f+1),
//! without synchronized rounds or a designated leader.
//!
//! # Architecture
//!
//! The engine is a synchronous state machine around one entry point:
//!
//! ```text
//! BlockGraph vertices → Graph::add() → Interpreted callbacks
//! ```
//!
//! There is no transport here. Each vertex carries, besides the block
//! itself, `Dep` records stating what its author had already integrated;
//! the engine mines those records for the votes an explicit PBFT exchange
//! would have produced:
//!
//! - Referencing a block id is a **prepare** vote for its round.
//! - Having witnessed round-supporting vertices from 2f+1 distinct
//!   authors is a **commit** vote: that author saw the prepare quorum.
//!
//! Per round the familiar ladder runs `Hnv → PrePrepared → Prepared →
//! Final`, with finalized output delivered once through a callback.
//!
//! # Liveness
//!
//! There are no timers. A round that falls `stall_threshold` rounds
//! behind the DAG's visible progress collects view-change votes from the
//! authors demonstrating that progress; at 2f+1 votes the round re-arms
//! one view higher and re-counts its accumulated evidence. A stalled
//! round never blocks any other round.
//!
//! # Failure semantics
//!
//! Nothing the network can send is fatal. Duplicates are ignored,
//! equivocations are excluded from counting (and surfaced to an optional
//! audit callback), vertices with missing parents are parked and retried
//! automatically. The only user-visible failure mode is a round that
//! never reaches `Final`.

mod graph;
mod pending;
mod round;
mod shared;
mod view_change;

pub use graph::{
    EquivocationCallback, Graph, GraphConfig, GraphSnapshot, GraphStats, InterpretedCallback,
};
pub use shared::SharedGraph;
