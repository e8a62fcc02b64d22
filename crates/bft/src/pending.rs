//! Orphan buffering.
//!
//! A vertex whose self-parent or dep target has not been ingested yet is
//! not an error: it is parked here, keyed by the first missing block id,
//! and re-submitted automatically when that block arrives. The buffer is
//! bounded; over the cap the bucket with the smallest missing id is
//! evicted, which keeps eviction deterministic across replicas.

use tessera_types::{BlockGraph, BlockId};
use tracing::{debug, warn};

use std::collections::BTreeMap;

#[derive(Debug)]
pub(crate) struct OrphanBuffer {
    by_missing: BTreeMap<BlockId, Vec<BlockGraph>>,
    total: usize,
    cap: usize,
}

impl OrphanBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            by_missing: BTreeMap::new(),
            total: 0,
            cap,
        }
    }

    /// Number of buffered vertices.
    pub(crate) fn len(&self) -> usize {
        self.total
    }

    /// Park `vertex` until `missing` arrives.
    pub(crate) fn insert(&mut self, missing: BlockId, vertex: BlockGraph) {
        let bucket = self.by_missing.entry(missing.clone()).or_default();
        if bucket.iter().any(|v| v.id() == vertex.id()) {
            debug!(vertex = %vertex.id(), "orphan already buffered");
            return;
        }
        debug!(vertex = %vertex.id(), missing = %missing, "buffering orphan");
        bucket.push(vertex);
        self.total += 1;

        if self.total > self.cap {
            // The just-filled bucket is spared so fresh arrivals are not
            // dropped on the spot.
            let victim = self
                .by_missing
                .keys()
                .find(|k| **k != missing)
                .cloned()
                .or_else(|| self.by_missing.keys().next().cloned());
            if let Some(victim) = victim {
                if let Some(dropped) = self.by_missing.remove(&victim) {
                    self.total -= dropped.len();
                    warn!(
                        missing = %victim,
                        dropped = dropped.len(),
                        "orphan buffer full, evicting oldest bucket"
                    );
                }
            }
        }
    }

    /// Release every vertex that was waiting for `arrived`'s slot.
    ///
    /// Matching is by (node, round), not by exact hash: once a canonical
    /// vertex occupies the slot, a parked vertex that named a conflicting
    /// hash can still be re-submitted, where its votes for the excluded
    /// branch will be rejected rather than waited on forever.
    pub(crate) fn take(&mut self, arrived: &BlockId) -> Vec<BlockGraph> {
        let keys: Vec<BlockId> = self
            .by_missing
            .keys()
            .filter(|k| k.slot() == arrived.slot())
            .cloned()
            .collect();
        let mut released = Vec::new();
        for key in keys {
            if let Some(bucket) = self.by_missing.remove(&key) {
                self.total -= bucket.len();
                released.extend(bucket);
            }
        }
        released
    }
}
