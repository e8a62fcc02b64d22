//! Deterministic simulation harness for the Tessera consensus engine.
//!
//! Builds fleets of honest (and optionally equivocating) proposers, turns
//! their causal knowledge into [`tessera_types::BlockGraph`] vertices, and
//! feeds identical vertex sets to multiple engine replicas under seeded
//! delivery schedules. Everything is synchronous and reproducible: the
//! same seed always produces the same schedule.

mod proposer;
mod runner;

pub use proposer::{HonestNode, conflicting_variant};
pub use runner::{Cluster, generate_rounds, generate_with_equivocator};
