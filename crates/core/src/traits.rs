//! Collaborator traits.
//!
//! The freezing core queries chain state, balance lists, scoring and the vote
//! tally through these traits. Production wires real implementations; tests
//! and the simulation use in-memory ones.

use diversity_types::{BlockVote, CandidateBlock, ChainScore, CurrentVote, Hash, VerifierId};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors returned by the chain when committing a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("block at height {height} does not follow frozen edge {frozen_edge}")]
    NotNextHeight { height: u64, frozen_edge: u64 },

    #[error("block {hash} rejected: {reason}")]
    Rejected { hash: Hash, reason: String },

    #[error("chain storage error: {0}")]
    Storage(String),
}

/// Errors from durable vote storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed vote record: {0}")]
    Malformed(String),
}

/// Read access to the frozen chain and cycle membership, plus the single
/// write the freezing core performs: committing a block.
pub trait ChainView: Send + Sync {
    /// Height of the most recently frozen block.
    fn frozen_edge_height(&self) -> u64;

    /// Blockchain version of the frozen edge block.
    fn frozen_edge_blockchain_version(&self) -> u16;

    /// Highest height at which candidates are accepted.
    ///
    /// `strict` excludes the allowance made for blocks that are still being
    /// produced when the cycle is stalled.
    fn open_edge_height(&self, strict: bool) -> u64;

    /// Lowest height with guaranteed local history. `None` when the node has
    /// no retained history at all.
    fn retention_edge_height(&self) -> Option<u64>;

    /// Number of verifiers in the current cycle.
    fn current_cycle_length(&self) -> usize;

    /// True while the chain is still in its bootstrap cycle.
    fn in_genesis_cycle(&self) -> bool;

    /// Size of the voting mesh used during the Genesis cycle.
    fn genesis_voting_mesh_size(&self) -> usize;

    /// True if `verifier` belongs to the current cycle.
    fn verifier_in_current_cycle(&self, verifier: &VerifierId) -> bool;

    /// True if this node's verifier belongs to the current cycle.
    fn local_verifier_in_cycle(&self) -> bool;

    /// Verification timestamp of the frozen block at `height`, if it is
    /// retained and its hash matches.
    fn frozen_block_verification_timestamp(&self, height: u64, hash: &Hash) -> Option<u64>;

    /// Irreversibly commit `block`, advancing the frozen edge by one.
    fn freeze_block(&self, block: &CandidateBlock) -> Result<(), ChainError>;
}

/// Computes balance lists for candidates.
pub trait BalanceListProvider: Send + Sync {
    /// Hash of the balance list after applying `block`, or `None` if the
    /// list cannot be computed yet (its predecessor is not known).
    fn balance_list_hash_for_block(&self, block: &CandidateBlock) -> Option<Hash>;
}

/// Scores candidates. Lower scores are preferred during voting.
pub trait BlockScorer: Send + Sync {
    /// Score of `block` relative to `reference_height`.
    ///
    /// `consensus_choice` is true when the candidate is already backed by a
    /// majority of the cycle, which relaxes some eligibility rules.
    fn chain_score(
        &self,
        block: &CandidateBlock,
        reference_height: u64,
        consensus_choice: bool,
    ) -> ChainScore;

    /// Earliest wall-clock time (ms) at which this node may vote for `block`.
    fn minimum_vote_timestamp(&self, block: &CandidateBlock, consensus_choice: bool) -> u64;
}

/// Tally of votes cast by cycle members.
pub trait VoteTally: Send + Sync {
    /// Record a vote. A later vote from the same voter at the same height
    /// replaces the earlier one.
    fn register_vote(&self, vote: &BlockVote);

    /// Hash with the most votes at `height` and its vote count.
    fn leading_hash_for_height(&self, height: u64) -> Option<(Hash, usize)>;

    /// Total number of votes at `height`.
    fn number_of_votes_at_height(&self, height: u64) -> usize;

    /// Heights with at least one vote, ascending.
    fn heights_with_votes(&self) -> Vec<u64>;

    /// Distinct hashes with at least one vote at `height`.
    fn hashes_for_height(&self, height: u64) -> Vec<Hash>;

    /// Hash `voter` voted for at `height`.
    fn vote_for_identifier_at_height(&self, voter: &VerifierId, height: u64) -> Option<Hash>;

    /// Drop all votes at or below `height`.
    fn prune_at_or_below(&self, height: u64);
}

/// Durable storage for this node's current vote.
pub trait VoteStorage: Send + Sync {
    /// Load the persisted vote. Missing or unreadable records yield `None`.
    fn load_current_vote(&self) -> Option<CurrentVote>;

    /// Persist `vote`, replacing any earlier record.
    fn store_current_vote(&self, vote: &CurrentVote) -> Result<(), StorageError>;
}

/// Wall-clock source in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}
