//! Core types for Tessera consensus.
//!
//! This crate provides the foundational types used throughout the consensus
//! implementation:
//!
//! - **Identifiers**: [`NodeId`], [`Round`], [`View`], [`Hash`], [`BlockId`]
//! - **DAG vertices**: [`Dep`], [`BlockGraph`]
//! - **Quorum bookkeeping**: [`Bitmap`], [`BitSet`]
//! - **Protocol vocabulary**: [`ConsensusMessage`], [`MessageKind`], [`Phase`]
//! - **Configuration and output**: [`Config`], [`Interpreted`], [`Equivocation`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. All types
//! are plain values: no I/O, no interior mutability, no globals.

mod bitset;
mod block_id;
mod config;
mod hash;
mod ids;
mod interpreted;
mod message;
mod vertex;

pub use bitset::{BitSet, Bitmap};
pub use block_id::BlockId;
pub use config::{Config, ConfigError};
pub use hash::Hash;
pub use ids::{NodeId, Round, View};
pub use interpreted::{Equivocation, Interpreted};
pub use message::{ConsensusMessage, MessageKind, Phase};
pub use vertex::{BlockGraph, Dep};
