//! One simulated verifier and the scorer the cycle shares.

use crate::NodeIndex;
use diversity_core::BlockScorer;
use diversity_freeze::test_utils::{ManualClock, MemoryVoteStorage, TestBalanceLists, TestChain};
use diversity_freeze::{BlockVoteTally, FreezeCollaborators, FreezeConfig, FreezeState};
use diversity_types::test_utils::test_balance_list_hash;
use diversity_types::{CandidateBlock, ChainScore, Hash, MissingBlockRequest, VerifierId};
use std::sync::Arc;
use tracing::debug;

// ═══════════════════════════════════════════════════════════════════════════
// Scoring
// ═══════════════════════════════════════════════════════════════════════════

/// Round-robin scorer.
///
/// The verifier at position `height % n` in the cycle scores 0 at `height`,
/// the next one 1, and so on. A block becomes votable `vote_delay_ms` per
/// score point after its verification timestamp, so the designated
/// producer's block is always preferred when it arrives in time.
#[derive(Debug, Clone)]
pub struct SimScorer {
    cycle: Vec<VerifierId>,
    vote_delay_ms: u64,
}

impl SimScorer {
    pub fn new(cycle: Vec<VerifierId>, vote_delay_ms: u64) -> Self {
        Self {
            cycle,
            vote_delay_ms,
        }
    }

    /// Position of `block`'s producer relative to the designated producer
    /// for its height. `None` for producers outside the cycle.
    pub fn rank(&self, block: &CandidateBlock) -> Option<u64> {
        let n = self.cycle.len() as u64;
        let index = self.cycle.iter().position(|v| *v == block.verifier)? as u64;
        Some((index + n - block.height % n) % n)
    }
}

impl BlockScorer for SimScorer {
    fn chain_score(
        &self,
        block: &CandidateBlock,
        _reference_height: u64,
        _consensus_choice: bool,
    ) -> ChainScore {
        self.rank(block)
            .map_or(ChainScore::INELIGIBLE, |rank| ChainScore(rank as i64))
    }

    fn minimum_vote_timestamp(&self, block: &CandidateBlock, consensus_choice: bool) -> u64 {
        if consensus_choice {
            return block.verification_timestamp;
        }
        let rank = self.rank(block).unwrap_or(self.cycle.len() as u64);
        block.verification_timestamp + rank * self.vote_delay_ms
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Node
// ═══════════════════════════════════════════════════════════════════════════

/// A simulated verifier.
///
/// The chain, vote storage and clock outlive the state machine so
/// [`SimNode::restart`] models a process restart: frozen blocks and the
/// persisted vote survive, the pools and the tally do not.
pub struct SimNode {
    index: NodeIndex,
    verifier: VerifierId,
    config: FreezeConfig,
    state: FreezeState,
    chain: Arc<TestChain>,
    balance_lists: Arc<TestBalanceLists>,
    scorer: Arc<SimScorer>,
    storage: Arc<MemoryVoteStorage>,
    clock: Arc<ManualClock>,
    /// Highest height this node has produced a block for.
    produced_through: u64,
}

impl SimNode {
    pub fn new(
        index: NodeIndex,
        config: FreezeConfig,
        genesis: CandidateBlock,
        cycle: Vec<VerifierId>,
        scorer: Arc<SimScorer>,
    ) -> Self {
        let verifier = config.local_identifier;
        let produced_through = genesis.height;
        let chain = Arc::new(TestChain::new(verifier, genesis, cycle));
        let balance_lists = Arc::new(TestBalanceLists::connected_to(chain.clone()));
        let storage = Arc::new(MemoryVoteStorage::new());
        let clock = Arc::new(ManualClock::new(0));
        let state = Self::build_state(&config, &chain, &balance_lists, &scorer, &storage, &clock);

        Self {
            index,
            verifier,
            config,
            state,
            chain,
            balance_lists,
            scorer,
            storage,
            clock,
            produced_through,
        }
    }

    fn build_state(
        config: &FreezeConfig,
        chain: &Arc<TestChain>,
        balance_lists: &Arc<TestBalanceLists>,
        scorer: &Arc<SimScorer>,
        storage: &Arc<MemoryVoteStorage>,
        clock: &Arc<ManualClock>,
    ) -> FreezeState {
        FreezeState::new(
            config.clone(),
            FreezeCollaborators {
                chain: chain.clone(),
                balance_lists: balance_lists.clone(),
                scorer: scorer.clone(),
                tally: Arc::new(BlockVoteTally::new()),
                storage: storage.clone(),
                clock: clock.clone(),
            },
        )
    }

    /// Replace the state machine, keeping the chain, storage and clock.
    pub fn restart(&mut self) {
        debug!(node = self.index, "Restarting node");
        self.state = Self::build_state(
            &self.config,
            &self.chain,
            &self.balance_lists,
            &self.scorer,
            &self.storage,
            &self.clock,
        );
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn verifier(&self) -> VerifierId {
        self.verifier
    }

    pub fn state(&self) -> &FreezeState {
        &self.state
    }

    pub fn chain(&self) -> &TestChain {
        &self.chain
    }

    pub fn storage(&self) -> &MemoryVoteStorage {
        &self.storage
    }

    pub fn frozen_edge(&self) -> u64 {
        self.chain.frozen_edge().height
    }

    /// Move this node's clock to `now_ms`.
    pub fn set_time(&self, now_ms: u64) {
        self.clock.set(now_ms);
    }

    /// Produce a block at frozen edge + 1 if this node is the designated
    /// producer or its backup, hasn't produced at that height yet, and
    /// `block_interval_ms` has passed since the edge was verified.
    pub fn produce_block(
        &mut self,
        now_ms: u64,
        cycle_length: u64,
        block_interval_ms: u64,
    ) -> Option<CandidateBlock> {
        let parent = self.chain.frozen_edge();
        let height = parent.height + 1;
        if self.produced_through >= height || cycle_length == 0 {
            return None;
        }

        let index = u64::from(self.index);
        let designated = height % cycle_length;
        let backup = (height + 1) % cycle_length;
        if index != designated && index != backup {
            return None;
        }
        if now_ms < parent.verification_timestamp + block_interval_ms {
            return None;
        }

        let mut preimage = parent.hash.as_bytes().to_vec();
        preimage.extend_from_slice(&height.to_be_bytes());
        preimage.extend_from_slice(self.verifier.as_bytes());
        let hash = Hash::from_bytes(&preimage);

        self.produced_through = height;
        Some(CandidateBlock {
            height,
            hash,
            previous_hash: parent.hash,
            verifier: self.verifier,
            verification_timestamp: now_ms,
            balance_list_hash: test_balance_list_hash(&hash),
            blockchain_version: parent.blockchain_version,
            signature_valid: true,
        })
    }

    /// Answer a peer's missing-block request from the unfrozen pool or the
    /// frozen chain.
    pub fn serve_block(&self, request: &MissingBlockRequest) -> Option<CandidateBlock> {
        self.state
            .unfrozen_block_at_height(request.height, &request.hash)
            .or_else(|| {
                self.chain
                    .frozen_block(request.height)
                    .filter(|block| block.hash == request.hash)
            })
    }

    /// Blocks a peer whose frozen edge is `peer_edge` needs to catch up:
    /// up to `limit` frozen blocks above it, then the candidates at this
    /// node's frozen edge + 1.
    pub fn catch_up_blocks(&self, peer_edge: u64, limit: u64) -> Vec<CandidateBlock> {
        let edge = self.frozen_edge();
        let last = edge.min(peer_edge.saturating_add(limit));
        let mut blocks: Vec<CandidateBlock> = (peer_edge + 1..=last)
            .filter_map(|height| self.chain.frozen_block(height))
            .collect();
        if last == edge {
            blocks.extend(self.state.unfrozen_blocks_at_height(edge + 1));
        }
        blocks
    }
}

impl std::fmt::Debug for SimNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNode")
            .field("index", &self.index)
            .field("verifier", &self.verifier)
            .field("frozen_edge", &self.frozen_edge())
            .field("produced_through", &self.produced_through)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_core::ChainView;
    use diversity_types::test_utils::test_verifier;

    fn genesis() -> CandidateBlock {
        let hash = Hash::from_bytes(b"genesis");
        CandidateBlock {
            height: 0,
            hash,
            previous_hash: Hash::ZERO,
            verifier: test_verifier(1),
            verification_timestamp: 0,
            balance_list_hash: test_balance_list_hash(&hash),
            blockchain_version: 1,
            signature_valid: true,
        }
    }

    fn cycle() -> Vec<VerifierId> {
        (1..=5).map(test_verifier).collect()
    }

    fn node(index: NodeIndex) -> SimNode {
        let cycle = cycle();
        let scorer = Arc::new(SimScorer::new(cycle.clone(), 1_000));
        SimNode::new(
            index,
            FreezeConfig::for_verifier(cycle[index as usize]),
            genesis(),
            cycle,
            scorer,
        )
    }

    #[test]
    fn test_scorer_ranks_relative_to_height() {
        let scorer = SimScorer::new(cycle(), 1_000);
        let mut block = genesis();
        block.height = 7;
        block.verification_timestamp = 10_000;

        block.verifier = test_verifier(3); // index 2 == 7 % 5
        assert_eq!(scorer.chain_score(&block, 6, false), ChainScore(0));
        assert_eq!(scorer.minimum_vote_timestamp(&block, false), 10_000);

        block.verifier = test_verifier(4);
        assert_eq!(scorer.chain_score(&block, 6, false), ChainScore(1));
        assert_eq!(scorer.minimum_vote_timestamp(&block, false), 11_000);
        assert_eq!(scorer.minimum_vote_timestamp(&block, true), 10_000);

        block.verifier = test_verifier(99);
        assert_eq!(scorer.chain_score(&block, 6, false), ChainScore::INELIGIBLE);
    }

    #[test]
    fn test_only_designated_and_backup_produce() {
        // Height 1: designated index 1, backup index 2.
        let mut producers = Vec::new();
        for index in 0..5 {
            if node(index).produce_block(5_000, 5, 2_000).is_some() {
                producers.push(index);
            }
        }
        assert_eq!(producers, vec![1, 2]);
    }

    #[test]
    fn test_produces_once_per_height_after_interval() {
        let mut node = node(1);
        assert!(node.produce_block(1_999, 5, 2_000).is_none());

        let block = node.produce_block(2_000, 5, 2_000).unwrap();
        assert_eq!(block.height, 1);
        assert_eq!(block.previous_hash, genesis().hash);
        assert_eq!(block.verification_timestamp, 2_000);
        assert!(node.produce_block(3_000, 5, 2_000).is_none());
    }

    #[test]
    fn test_restart_keeps_chain_and_vote() {
        let mut node = node(1);
        node.set_time(2_000);
        let block = node.produce_block(2_000, 5, 2_000).unwrap();
        assert!(node.state().register_block(block.clone()));

        node.set_time(10_000);
        node.state().update_vote();
        assert_eq!(node.state().current_vote().map(|v| v.hash), Some(block.hash));

        node.restart();
        assert!(node.state().unfrozen_blocks_at_height(1).is_empty());
        assert_eq!(node.state().current_vote().map(|v| v.hash), Some(block.hash));
        assert_eq!(node.chain().frozen_edge_height(), 0);
    }

    #[test]
    fn test_serves_and_catches_up_from_chain() {
        let node = node(0);
        let request = MissingBlockRequest {
            height: 0,
            hash: genesis().hash,
        };
        assert_eq!(node.serve_block(&request), Some(genesis()));
        assert!(node
            .serve_block(&MissingBlockRequest {
                height: 0,
                hash: Hash::ZERO
            })
            .is_none());

        // Nothing above the edge yet.
        assert!(node.catch_up_blocks(0, 100).is_empty());
    }
}
