//! Candidate blocks proposed by cycle verifiers.

use crate::{Hash, VerifierId};
use serde::{Deserialize, Serialize};

/// Immutable view of one proposed block.
///
/// The wire format, transactions and signature bytes live with the transport
/// layer; the freezing core only needs the fields below. The chain score is
/// not stored here because it depends on a reference height and is computed
/// by a `BlockScorer` collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBlock {
    /// Height of this block.
    pub height: u64,
    /// Hash of this block.
    pub hash: Hash,
    /// Hash of the block at `height - 1` this block extends.
    pub previous_hash: Hash,
    /// Verifier that produced the block.
    pub verifier: VerifierId,
    /// When the verifier signed the block (milliseconds since epoch).
    pub verification_timestamp: u64,
    /// Declared hash of the balance list after applying this block.
    pub balance_list_hash: Hash,
    /// Blockchain version tag. Versions never go backwards.
    pub blockchain_version: u16,
    /// Result of the transport's signature check.
    ///
    /// Never taken from the wire: decoded blocks start out unverified and the
    /// transport sets this after checking the signature.
    #[serde(skip)]
    pub signature_valid: bool,
}

impl CandidateBlock {
    /// True if `self` directly extends `parent`.
    pub fn extends(&self, parent: &CandidateBlock) -> bool {
        self.height == parent.height + 1 && self.previous_hash == parent.hash
    }
}
