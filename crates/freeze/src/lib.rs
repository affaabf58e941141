//! Block freezing state machine.
//!
//! This crate decides which candidate block becomes canonical at each
//! height and when to commit ("freeze") it. There is no leader: each node
//! votes, counts the cycle's votes, and freezes independently once the
//! count is high enough.
//!
//! # Architecture
//!
//! - `Event::BlockReceived` → admission into the unfrozen pool
//! - `Event::BlockVoteReceived` → the vote tally
//! - `Event::ConsensusTimer` → vote, freeze, recover, clean up
//!
//! Network I/O is performed by the runner via returned `Action`s.
//!
//! # Terminology
//!
//! - **Frozen edge**: Height of the most recently frozen block. Freezing is
//!   irreversible and only ever advances the edge by one.
//!
//! - **Cycle**: The ordered set of verifiers currently producing blocks. Its
//!   length is the voting pool outside the Genesis cycle.
//!
//! - **Chain score**: Collaborator-computed fitness of a candidate relative to
//!   a reference height. Lower is better.
//!
//! - **Disconnected block**: A signature-valid candidate whose balance list
//!   can't be computed yet because its predecessor is not known. Held near
//!   the frozen edge until the chain catches up.
//!
//! # Safety
//!
//! - A block is frozen only when its vote count strictly exceeds the
//!   threshold, and only if it is held in the unfrozen pool.
//!
//! - Chain recovery requires two consecutive heights past the recovery
//!   threshold and every block back to the frozen edge; any missing link
//!   aborts the attempt with nothing frozen.
//!
//! # Liveness
//!
//! - The freeze threshold relaxes by one vote per minute since the leading
//!   block was verified, down to a simple majority of the cycle.
//!
//! - Once most of the cycle has voted, a node follows the leading hash
//!   instead of its own preference.

mod config;
mod decision;
mod overrides;
mod pool;
mod recovery;
mod state;
mod stats;
mod tally;
mod threshold;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::FreezeConfig;
pub use decision::{decide_vote, FallbackVote, UndeterminedReason, VoteDecision, VoteInputs};
pub use overrides::Overrides;
pub use pool::{BlocksAtHeight, DisconnectedBlockPool, Eviction, UnfrozenBlockPool};
pub use recovery::{find_passing_pair, resolve_chain, PassingHeight};
pub use state::{FreezeCollaborators, FreezeState, INITIAL_VOTE_DESCRIPTION};
pub use stats::FreezeStats;
pub use tally::BlockVoteTally;
pub use threshold::{
    base_threshold, freeze_threshold, recovery_threshold, voting_pool_size, ThresholdInputs,
};
