//! Fixed-width bit-vectors for quorum counting.
//!
//! Votes are tracked per node *ordinal* (the node's position in
//! [`crate::Config`]), not per raw [`crate::NodeId`]. Callers map ids to
//! ordinals before touching these types. Keeping the planes as explicit
//! arrays of words keeps population counts O(words) rather than O(n).

use serde::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

/// Fixed-width bit-vector over node ordinals.
///
/// Out-of-range indexes: `set` is a no-op and `get` returns false. The
/// width is fixed at construction; `ceil(len / 64)` words are allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// Create an all-zero bitmap over `len` ordinals.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// Number of ordinals this bitmap covers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Set bit `index`. Idempotent; out-of-range is a no-op.
    pub fn set(&mut self, index: usize) {
        if index < self.len {
            self.words[index / WORD_BITS] |= 1 << (index % WORD_BITS);
        }
    }

    /// Test bit `index`. Out-of-range reads as false.
    pub fn get(&self, index: usize) -> bool {
        if index < self.len {
            self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
        } else {
            false
        }
    }

    /// Population count.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Merge another bitmap of the same width into this one.
    pub fn union_with(&mut self, other: &Bitmap) {
        for (w, o) in self.words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
    }

    /// Iterate the set ordinals in ascending order.
    pub fn set_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|i| self.get(*i))
    }
}

/// Prepare/commit vote planes for one round record.
///
/// Both planes are [`Bitmap`]s of the same width; `clone` yields an
/// independent deep copy sharing no storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitSet {
    prepares: Bitmap,
    commits: Bitmap,
}

impl BitSet {
    /// Create all-zero prepare and commit planes over `len` ordinals.
    pub fn new(len: usize) -> Self {
        Self {
            prepares: Bitmap::new(len),
            commits: Bitmap::new(len),
        }
    }

    /// Record a prepare vote by ordinal `index`.
    pub fn set_prepare(&mut self, index: usize) {
        self.prepares.set(index);
    }

    /// Record a commit vote by ordinal `index`.
    pub fn set_commit(&mut self, index: usize) {
        self.commits.set(index);
    }

    /// Has ordinal `index` prepared?
    pub fn has_prepare(&self, index: usize) -> bool {
        self.prepares.get(index)
    }

    /// Has ordinal `index` committed?
    pub fn has_commit(&self, index: usize) -> bool {
        self.commits.get(index)
    }

    /// Number of distinct prepare votes.
    pub fn prepare_count(&self) -> usize {
        self.prepares.count()
    }

    /// Number of distinct commit votes.
    pub fn commit_count(&self) -> usize {
        self.commits.count()
    }

    /// The prepare plane.
    pub fn prepares(&self) -> &Bitmap {
        &self.prepares
    }

    /// The commit plane.
    pub fn commits(&self) -> &Bitmap {
        &self.commits
    }

    /// Merge prepare votes from a per-proposal support bitmap.
    pub fn merge_prepares(&mut self, support: &Bitmap) {
        self.prepares.union_with(support);
    }
}
