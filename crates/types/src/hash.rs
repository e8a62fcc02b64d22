//! Content hash wrapper.

use serde::{Deserialize, Serialize};

/// Content hash of a block proposal.
///
/// The engine never computes hashes itself; they are produced by the
/// out-of-scope cryptography layer and carried here as opaque bytes. An
/// empty hash marks an invalid [`crate::BlockId`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Wrap raw hash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// The empty hash. Marks a [`crate::BlockId`] as invalid.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True iff this hash carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering of the full hash.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix keeps log lines readable.
        let hex = self.to_hex();
        if hex.len() > 8 {
            write!(f, "Hash({}..)", &hex[..8])
        } else {
            write!(f, "Hash({})", hex)
        }
    }
}
