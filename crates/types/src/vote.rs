//! Votes and the fetch messages used to resolve voted-for blocks.

use crate::{CandidateBlock, Hash, NetworkMessage, VerifierId};
use serde::{Deserialize, Serialize};

/// A verifier's vote for which candidate should be frozen at a height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVote {
    /// Height being voted on.
    pub height: u64,
    /// Hash of the chosen candidate.
    pub hash: Hash,
    /// Verifier casting the vote.
    pub voter: VerifierId,
    /// When the vote was cast (milliseconds since epoch).
    pub timestamp: u64,
}

impl NetworkMessage for BlockVote {
    fn message_type_id() -> &'static str {
        "block.vote"
    }
}

/// This node's own current vote.
///
/// Persisted so a restarted node keeps voting for what it already broadcast
/// instead of re-deciding from an empty tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentVote {
    /// Height voted on.
    pub height: u64,
    /// Hash voted for.
    pub hash: Hash,
    /// When the vote was cast. Zero when loaded from storage.
    pub timestamp: u64,
}

/// Request a block by hash from a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingBlockRequest {
    /// Height of the missing block.
    pub height: u64,
    /// Hash of the missing block.
    pub hash: Hash,
}

impl NetworkMessage for MissingBlockRequest {
    fn message_type_id() -> &'static str {
        "block.missing.request"
    }
}

/// Peer's answer to a [`MissingBlockRequest`]. `None` if the peer lacks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBlockResponse {
    /// The requested block, if the peer had it.
    pub block: Option<CandidateBlock>,
}

impl NetworkMessage for MissingBlockResponse {
    fn message_type_id() -> &'static str {
        "block.missing.response"
    }
}
