//! Event types for the freezing state machine.

use diversity_types::{BlockVote, CandidateBlock, Hash, MissingBlockRequest, MissingBlockResponse};

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Results of work the node delegated (block fetches).
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,

    /// Operator commands (overrides).
    Client = 3,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// Periodic consensus tick. Drives vote updates, freezing, recovery,
    /// maintenance and missing-block requests.
    ConsensusTimer,

    // ═══════════════════════════════════════════════════════════════════════
    // Network (priority: Network)
    // ═══════════════════════════════════════════════════════════════════════
    /// A candidate block arrived from a verifier.
    ///
    /// The transport has already checked the signature and recorded the
    /// result in `block.signature_valid`.
    BlockReceived { block: CandidateBlock },

    /// A peer's vote arrived.
    BlockVoteReceived { vote: BlockVote },

    // ═══════════════════════════════════════════════════════════════════════
    // Async callbacks (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// Answer to an [`crate::Action::FetchMissingBlock`].
    MissingBlockReceived {
        request: MissingBlockRequest,
        response: MissingBlockResponse,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Operator commands (priority: Client)
    // ═══════════════════════════════════════════════════════════════════════
    /// Force the vote at `height` to `hash`. A zero hash removes the override.
    HashOverrideRequested { height: u64, hash: Hash },

    /// Replace the freeze threshold at `height`. Zero removes the override;
    /// values of 100 or more are ignored.
    ThresholdOverrideRequested { height: u64, percent: u8 },
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::MissingBlockReceived { .. } => EventPriority::Internal,
            Event::ConsensusTimer => EventPriority::Timer,
            Event::BlockReceived { .. } | Event::BlockVoteReceived { .. } => {
                EventPriority::Network
            }
            Event::HashOverrideRequested { .. } | Event::ThresholdOverrideRequested { .. } => {
                EventPriority::Client
            }
        }
    }

    /// Short name for logging and metrics labels.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ConsensusTimer => "ConsensusTimer",
            Event::BlockReceived { .. } => "BlockReceived",
            Event::BlockVoteReceived { .. } => "BlockVoteReceived",
            Event::MissingBlockReceived { .. } => "MissingBlockReceived",
            Event::HashOverrideRequested { .. } => "HashOverrideRequested",
            Event::ThresholdOverrideRequested { .. } => "ThresholdOverrideRequested",
        }
    }
}
