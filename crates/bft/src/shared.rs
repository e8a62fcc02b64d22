//! Shared-engine wrapper.

use parking_lot::Mutex;
use std::sync::Arc;

use tessera_types::{BlockGraph, Phase, Round};

use crate::graph::{Graph, GraphSnapshot, GraphStats};

/// Clonable handle serializing all access to one [`Graph`].
///
/// The engine is logically single-writer; this wrapper is the simplest
/// way to satisfy that when the local proposer and the gossip receiver
/// live on different threads. Lock scope is one `add` at a time, so
/// callbacks fire with the lock held: an `on_interpreted` callback must
/// hand off to a queue rather than call back into the same handle.
#[derive(Clone)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    /// Wrap an engine.
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    /// Serialized [`Graph::add`].
    pub fn add(&self, vertex: BlockGraph) {
        self.inner.lock().add(vertex);
    }

    /// Engine statistics.
    pub fn stats(&self) -> GraphStats {
        self.inner.lock().stats()
    }

    /// Current phase of a round.
    pub fn round_phase(&self, round: Round) -> Option<Phase> {
        self.inner.lock().round_phase(round)
    }

    /// Restorable finalization state.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run `f` with the locked engine.
    pub fn with<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.inner.lock())
    }
}
