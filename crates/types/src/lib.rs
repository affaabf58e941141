//! Core types for the proof-of-diversity freezing core.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - **Primitives**: [`Hash`], [`VerifierId`]
//! - **Blocks**: [`CandidateBlock`] and its [`ChainScore`] ordering
//! - **Votes**: [`BlockVote`], [`CurrentVote`]
//! - **Fetch messages**: [`MissingBlockRequest`], [`MissingBlockResponse`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod block;
mod hash;
mod identifiers;
mod network;
mod score;
mod vote;

pub use block::CandidateBlock;
pub use hash::{Hash, HexError};
pub use identifiers::VerifierId;
pub use network::NetworkMessage;
pub use score::ChainScore;
pub use vote::{BlockVote, CurrentVote, MissingBlockRequest, MissingBlockResponse};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a test VerifierId from a seed byte.
    pub fn test_verifier(seed: u8) -> VerifierId {
        VerifierId([seed; 32])
    }

    /// Deterministic block hash for a (height, seed) pair.
    pub fn test_hash(height: u64, seed: u8) -> Hash {
        let mut bytes = height.to_be_bytes().to_vec();
        bytes.push(seed);
        Hash::from_bytes(&bytes)
    }

    /// Balance-list hash a test block declares. Collaborator fakes compute the
    /// same value so the block is admitted.
    pub fn test_balance_list_hash(block_hash: &Hash) -> Hash {
        let mut bytes = b"balance:".to_vec();
        bytes.extend_from_slice(block_hash.as_bytes());
        Hash::from_bytes(&bytes)
    }

    /// Create a signature-valid test block at `height` produced by verifier `seed`.
    ///
    /// The previous hash is zero and the verification timestamp is
    /// `height * 7000` so consecutive heights respect the minimum interval.
    pub fn test_block(height: u64, seed: u8) -> CandidateBlock {
        let hash = test_hash(height, seed);
        CandidateBlock {
            height,
            hash,
            previous_hash: Hash::ZERO,
            verifier: test_verifier(seed),
            verification_timestamp: height * 7_000,
            balance_list_hash: test_balance_list_hash(&hash),
            blockchain_version: 1,
            signature_valid: true,
        }
    }

    /// Create a test block extending `parent`.
    pub fn test_child(parent: &CandidateBlock, seed: u8) -> CandidateBlock {
        let mut block = test_block(parent.height + 1, seed);
        block.previous_hash = parent.hash;
        block.verification_timestamp = parent.verification_timestamp + 7_000;
        block
    }
}
