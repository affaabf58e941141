//! Vote decision.
//!
//! Choosing what to vote for is a pure function of a snapshot of the node's
//! state. `FreezeState::update_vote` takes the snapshot, calls
//! [`decide_vote`] and then performs the side effects (casting, persisting).

use crate::FreezeConfig;
use diversity_core::BlockScorer;
use diversity_types::{CandidateBlock, CurrentVote, Hash};
use std::fmt;
use tracing::trace;

/// What the fallback vote source has to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackVote {
    /// No fallback source is configured.
    NotConfigured,
    /// A source is configured but has not voted at this height.
    Unavailable,
    /// The source's vote at this height.
    Vote(Hash),
}

/// Snapshot of everything the decision depends on.
#[derive(Debug, Clone)]
pub struct VoteInputs<'a> {
    /// Height being voted on (frozen edge + 1).
    pub height: u64,
    /// Reference height for chain scores.
    pub frozen_edge: u64,
    pub now: u64,
    /// Candidates held at `height`.
    pub candidates: &'a [CandidateBlock],
    pub hash_override: Option<Hash>,
    pub in_genesis_cycle: bool,
    pub cycle_length: usize,
    pub votes_at_height: usize,
    /// Leading hash in the tally and its vote count.
    pub leading: Option<(Hash, usize)>,
    /// This node's current vote, already cleared if it targets another height.
    pub current_vote: Option<CurrentVote>,
    pub retention_edge_available: bool,
    pub fallback: FallbackVote,
    /// No decision has been made since startup.
    pub first_decision: bool,
}

/// Why no vote was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeterminedReason {
    NoCandidates,
    NoEligibleCandidate,
    FallbackUnavailable,
}

impl fmt::Display for UndeterminedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndeterminedReason::NoCandidates => f.write_str("no candidates"),
            UndeterminedReason::NoEligibleCandidate => f.write_str("no eligible candidate"),
            UndeterminedReason::FallbackUnavailable => f.write_str("fallback unavailable"),
        }
    }
}

/// Outcome of [`decide_vote`], tagged with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    Override(Hash),
    Genesis(Hash),
    Leading(Hash),
    /// Keep the vote already cast at this height. `recent_restart` is set
    /// on the first decision after startup, when the vote can only have come
    /// from storage.
    CarriedForward { hash: Hash, recent_restart: bool },
    IndependentLowest(Hash),
    Fallback(Hash),
    Undetermined(UndeterminedReason),
}

impl VoteDecision {
    /// The hash to vote for, if one was determined.
    pub fn hash(&self) -> Option<Hash> {
        match *self {
            VoteDecision::Override(hash)
            | VoteDecision::Genesis(hash)
            | VoteDecision::Leading(hash)
            | VoteDecision::CarriedForward { hash, .. }
            | VoteDecision::IndependentLowest(hash)
            | VoteDecision::Fallback(hash) => Some(hash),
            VoteDecision::Undetermined(_) => None,
        }
    }

    /// Short name for logging and metrics labels.
    pub fn label(&self) -> &'static str {
        match self {
            VoteDecision::Override(_) => "override",
            VoteDecision::Genesis(_) => "genesis",
            VoteDecision::Leading(_) => "leading",
            VoteDecision::CarriedForward { .. } => "carried_forward",
            VoteDecision::IndependentLowest(_) => "lowest_scored",
            VoteDecision::Fallback(_) => "fallback",
            VoteDecision::Undetermined(_) => "undetermined",
        }
    }
}

impl fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDecision::Override(hash) => write!(f, "override; {}", hash),
            VoteDecision::Genesis(hash) => write!(f, "Genesis cycle; lowest-scored; {}", hash),
            VoteDecision::Leading(hash) => write!(f, "leading; {}", hash),
            VoteDecision::CarriedForward {
                hash,
                recent_restart: true,
            } => write!(f, "current vote; recent restart; {}", hash),
            VoteDecision::CarriedForward { hash, .. } => write!(f, "current vote; {}", hash),
            VoteDecision::IndependentLowest(hash) => write!(f, "lowest-scored; {}", hash),
            VoteDecision::Fallback(hash) => write!(f, "fallback; {}", hash),
            VoteDecision::Undetermined(reason) => write!(f, "undetermined; {}", reason),
        }
    }
}

/// Decide which candidate to vote for. The first rule that yields a hash wins:
///
/// 1. an operator override for this height
/// 2. in the Genesis cycle, the lowest-scored candidate
/// 3. once more than three quarters of the pool has voted, the leading hash,
///    if its block is held and its minimum vote timestamp allows it
/// 4. the vote already cast at this height
/// 5. the lowest-scored candidate, once its minimum vote timestamp has passed
/// 6. with no retained history, the fallback source's vote
///
/// Score ties go to the lowest hash.
pub fn decide_vote(inputs: &VoteInputs<'_>, scorer: &dyn BlockScorer, config: &FreezeConfig) -> VoteDecision {
    if let Some(hash) = inputs.hash_override {
        return VoteDecision::Override(hash);
    }

    if inputs.in_genesis_cycle {
        return lowest_scored(inputs.candidates.iter(), scorer, inputs.frozen_edge)
            .map(|block| VoteDecision::Genesis(block.hash))
            .unwrap_or(VoteDecision::Undetermined(UndeterminedReason::NoCandidates));
    }

    if let Some(hash) = leading_vote(inputs, scorer, config) {
        return VoteDecision::Leading(hash);
    }

    if let Some(vote) = inputs.current_vote {
        return VoteDecision::CarriedForward {
            hash: vote.hash,
            recent_restart: inputs.first_decision,
        };
    }

    // Never settle for a worse block while the best one is still waiting.
    if let Some(block) = lowest_scored(inputs.candidates.iter(), scorer, inputs.frozen_edge) {
        if scorer.minimum_vote_timestamp(block, false) <= inputs.now {
            return VoteDecision::IndependentLowest(block.hash);
        }
        trace!(
            height = inputs.height,
            block_hash = %block.hash,
            "Lowest-scored block not yet votable"
        );
    }

    if !inputs.retention_edge_available {
        match inputs.fallback {
            FallbackVote::Vote(hash) => return VoteDecision::Fallback(hash),
            FallbackVote::Unavailable => {
                return VoteDecision::Undetermined(UndeterminedReason::FallbackUnavailable)
            }
            FallbackVote::NotConfigured => {}
        }
    }

    VoteDecision::Undetermined(UndeterminedReason::NoEligibleCandidate)
}

/// Leading-hash rule. Applies once the tally holds more than three quarters
/// of the pool's votes.
fn leading_vote(inputs: &VoteInputs<'_>, scorer: &dyn BlockScorer, config: &FreezeConfig) -> Option<Hash> {
    let pool = inputs.cycle_length;
    if inputs.votes_at_height <= pool * 3 / 4 {
        trace!(
            height = inputs.height,
            votes = inputs.votes_at_height,
            pool,
            "Insufficient vote count to follow leading hash"
        );
        return None;
    }

    let (leading_hash, count) = inputs.leading?;
    let Some(block) = inputs.candidates.iter().find(|b| b.hash == leading_hash) else {
        trace!(height = inputs.height, leading = %leading_hash, "Leading block not held");
        return None;
    };

    let consensus_choice = count > pool / 2;
    let minimum_vote_timestamp = scorer.minimum_vote_timestamp(block, consensus_choice);
    let grace_cutoff = inputs.now.saturating_sub(config.leading_vote_grace_ms);
    if (consensus_choice && minimum_vote_timestamp <= inputs.now) || minimum_vote_timestamp < grace_cutoff {
        Some(leading_hash)
    } else {
        trace!(
            height = inputs.height,
            leading = %leading_hash,
            score = %scorer.chain_score(block, inputs.frozen_edge, consensus_choice),
            "Leading block not yet votable"
        );
        None
    }
}

fn lowest_scored<'a>(
    candidates: impl Iterator<Item = &'a CandidateBlock>,
    scorer: &dyn BlockScorer,
    reference_height: u64,
) -> Option<&'a CandidateBlock> {
    candidates.min_by_key(|block| (scorer.chain_score(block, reference_height, false), block.hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestScorer;
    use diversity_types::test_utils::{test_block, test_verifier};

    const NOW: u64 = 1_000_000;

    fn inputs(candidates: &[CandidateBlock]) -> VoteInputs<'_> {
        VoteInputs {
            height: 100,
            frozen_edge: 99,
            now: NOW,
            candidates,
            hash_override: None,
            in_genesis_cycle: false,
            cycle_length: 10,
            votes_at_height: 0,
            leading: None,
            current_vote: None,
            retention_edge_available: true,
            fallback: FallbackVote::NotConfigured,
            first_decision: false,
        }
    }

    /// Three candidates scored [50, 10, 30].
    fn scored_candidates(scorer: &TestScorer) -> Vec<CandidateBlock> {
        let blocks: Vec<CandidateBlock> = (1..=3).map(|seed| test_block(100, seed)).collect();
        scorer.set_score(blocks[0].hash, 50);
        scorer.set_score(blocks[1].hash, 10);
        scorer.set_score(blocks[2].hash, 30);
        blocks
    }

    #[test]
    fn test_override_wins() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let mut i = inputs(&blocks);
        i.hash_override = Some(blocks[0].hash);
        i.in_genesis_cycle = true;

        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Override(blocks[0].hash)
        );
    }

    #[test]
    fn test_genesis_picks_lowest_score_regardless_of_timestamp() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        scorer.set_minimum_vote_timestamp(blocks[1].hash, u64::MAX);
        let mut i = inputs(&blocks);
        i.in_genesis_cycle = true;

        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Genesis(blocks[1].hash)
        );
    }

    #[test]
    fn test_score_ties_go_to_lowest_hash() {
        let scorer = TestScorer::new();
        let blocks: Vec<CandidateBlock> = (1..=4).map(|seed| test_block(100, seed)).collect();
        let mut i = inputs(&blocks);
        i.in_genesis_cycle = true;

        let lowest = blocks.iter().map(|b| b.hash).min().unwrap();
        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Genesis(lowest)
        );
    }

    #[test]
    fn test_follows_leading_hash_once_eligible() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let leading = blocks[1].hash;
        // Not votable until NOW; the others are votable already.
        scorer.set_minimum_vote_timestamp(leading, NOW + 1);
        let mut i = inputs(&blocks);
        i.votes_at_height = 8;
        i.leading = Some((leading, 6));

        // Before eligibility the leading rule does not apply, and the leader
        // is also the lowest-scored block, so nothing is votable yet.
        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Undetermined(UndeterminedReason::NoEligibleCandidate)
        );

        scorer.set_minimum_vote_timestamp(leading, NOW);
        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Leading(leading)
        );
    }

    #[test]
    fn test_leading_needs_three_quarters_of_pool() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let mut i = inputs(&blocks);
        // 7 votes of a pool of 10 is not more than 10 * 3 / 4 = 7.
        i.votes_at_height = 7;
        i.leading = Some((blocks[0].hash, 7));

        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::IndependentLowest(blocks[1].hash)
        );
    }

    #[test]
    fn test_minority_leader_adopted_after_grace() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let leading = blocks[0].hash;
        let mut i = inputs(&blocks);
        i.votes_at_height = 9;
        // 4 of 10 is not a majority.
        i.leading = Some((leading, 4));

        scorer.set_minimum_vote_timestamp(leading, NOW - 10_000);
        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::IndependentLowest(blocks[1].hash)
        );

        scorer.set_minimum_vote_timestamp(leading, NOW - 10_001);
        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::Leading(leading)
        );
    }

    #[test]
    fn test_leading_block_must_be_held() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let mut i = inputs(&blocks);
        i.votes_at_height = 9;
        i.leading = Some((test_block(100, 42).hash, 9));

        assert_eq!(
            decide_vote(&i, &scorer, &FreezeConfig::default()),
            VoteDecision::IndependentLowest(blocks[1].hash)
        );
    }

    #[test]
    fn test_current_vote_carried_forward() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        let mut i = inputs(&blocks);
        i.current_vote = Some(CurrentVote {
            height: 100,
            hash: blocks[2].hash,
            timestamp: 0,
        });
        i.first_decision = true;

        let decision = decide_vote(&i, &scorer, &FreezeConfig::default());
        assert_eq!(
            decision,
            VoteDecision::CarriedForward {
                hash: blocks[2].hash,
                recent_restart: true
            }
        );
        assert!(decision.to_string().contains("recent restart"));

        // Later decisions keep the vote without the restart note.
        i.first_decision = false;
        let decision = decide_vote(&i, &scorer, &FreezeConfig::default());
        assert_eq!(decision.to_string(), format!("current vote; {}", blocks[2].hash));
    }

    #[test]
    fn test_independent_waits_for_lowest_scored() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        scorer.set_minimum_vote_timestamp(blocks[1].hash, NOW + 1);

        // Score 30 is votable, but score 10 is the one worth waiting for.
        assert_eq!(
            decide_vote(&inputs(&blocks), &scorer, &FreezeConfig::default()),
            VoteDecision::Undetermined(UndeterminedReason::NoEligibleCandidate)
        );

        scorer.set_minimum_vote_timestamp(blocks[1].hash, NOW);
        assert_eq!(
            decide_vote(&inputs(&blocks), &scorer, &FreezeConfig::default()),
            VoteDecision::IndependentLowest(blocks[1].hash)
        );
    }

    #[test]
    fn test_fallback_only_without_retention_edge() {
        let scorer = TestScorer::new();
        let blocks = scored_candidates(&scorer);
        for block in &blocks {
            scorer.set_minimum_vote_timestamp(block.hash, u64::MAX);
        }
        let fallback_hash = blocks[0].hash;
        let config = FreezeConfig::default().with_fallback_vote_source(test_verifier(9));

        let mut i = inputs(&blocks);
        i.fallback = FallbackVote::Vote(fallback_hash);
        assert_eq!(
            decide_vote(&i, &scorer, &config),
            VoteDecision::Undetermined(UndeterminedReason::NoEligibleCandidate)
        );

        i.retention_edge_available = false;
        assert_eq!(decide_vote(&i, &scorer, &config), VoteDecision::Fallback(fallback_hash));

        i.fallback = FallbackVote::Unavailable;
        assert_eq!(
            decide_vote(&i, &scorer, &config),
            VoteDecision::Undetermined(UndeterminedReason::FallbackUnavailable)
        );
    }

    #[test]
    fn test_description_text() {
        let hash = test_block(100, 1).hash;
        assert_eq!(
            VoteDecision::Leading(hash).to_string(),
            format!("leading; {}", hash)
        );
        assert_eq!(
            VoteDecision::Undetermined(UndeterminedReason::NoEligibleCandidate).to_string(),
            "undetermined; no eligible candidate"
        );
    }
}
