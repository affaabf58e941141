//! Action types for the freezing state machine.

use diversity_types::{BlockVote, MissingBlockRequest};

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Network
    // ═══════════════════════════════════════════════════════════════════════
    /// Broadcast this node's vote to every verifier.
    BroadcastVote { vote: BlockVote },

    /// Ask a random peer for a block the tally references but we don't have.
    ///
    /// The runner delivers the answer back as [`crate::Event::MissingBlockReceived`].
    FetchMissingBlock { request: MissingBlockRequest },
}

impl Action {
    /// Short name for logging and metrics labels.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::BroadcastVote { .. } => "BroadcastVote",
            Action::FetchMissingBlock { .. } => "FetchMissingBlock",
        }
    }
}
