//! Freezing configuration.

use diversity_types::VerifierId;
use serde::Deserialize;

/// Consensus constants for admission, voting and freezing.
///
/// Deserializes from the `[freeze]` table of the node config; any missing
/// key takes its default. Identities are not read from this table: the node
/// config parses them from hex and sets them directly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    /// Maximum candidates held per height before eviction kicks in.
    pub max_candidates_per_height: usize,

    /// Maximum disconnected candidates held per height.
    pub max_disconnected_per_height: usize,

    /// Disconnected candidates are only held up to this many heights past the
    /// frozen edge.
    pub max_disconnected_distance: u64,

    /// Minimum gap between a block's verification timestamp and its
    /// predecessor's.
    pub minimum_verification_interval_ms: u64,

    /// How far ahead of the local clock a verification timestamp may be.
    pub max_timestamp_rush_ms: u64,

    /// Minimum gap between two votes from this node.
    pub minimum_vote_interval_ms: u64,

    /// Slack added to `minimum_vote_interval_ms` for clock and network jitter.
    pub vote_interval_jitter_ms: u64,

    /// A leading hash without a majority is adopted once its minimum vote
    /// timestamp is this far in the past.
    pub leading_vote_grace_ms: u64,

    /// Each elapsed step since the leading block's verification lowers the
    /// freeze threshold by one vote.
    pub threshold_relaxation_step_ms: u64,

    /// This node's verifier identity. Used as the voter on local votes.
    #[serde(skip)]
    pub local_identifier: VerifierId,

    /// Trusted verifier whose vote is adopted while this node has no
    /// retained history.
    #[serde(skip)]
    pub fallback_vote_source: Option<VerifierId>,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            max_candidates_per_height: 10,
            max_disconnected_per_height: 2,
            max_disconnected_distance: 300,
            minimum_verification_interval_ms: 1_500,
            max_timestamp_rush_ms: 5_000,
            minimum_vote_interval_ms: 5_000,
            vote_interval_jitter_ms: 200,
            leading_vote_grace_ms: 10_000,
            threshold_relaxation_step_ms: 60_000,
            local_identifier: VerifierId::default(),
            fallback_vote_source: None,
        }
    }
}

impl FreezeConfig {
    /// Create a default config for the given local verifier.
    pub fn for_verifier(local_identifier: VerifierId) -> Self {
        Self {
            local_identifier,
            ..Self::default()
        }
    }

    /// Set the fallback vote source.
    pub fn with_fallback_vote_source(mut self, source: VerifierId) -> Self {
        self.fallback_vote_source = Some(source);
        self
    }

    /// Time that must pass after a vote before the next one.
    pub fn vote_spacing_ms(&self) -> u64 {
        self.minimum_vote_interval_ms + self.vote_interval_jitter_ms
    }
}
