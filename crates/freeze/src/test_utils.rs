//! In-memory collaborators for tests and the simulation.

use diversity_core::{
    BalanceListProvider, BlockScorer, ChainError, ChainView, Clock, StorageError, VoteStorage,
};
use diversity_types::test_utils::test_balance_list_hash;
use diversity_types::{CandidateBlock, ChainScore, CurrentVote, Hash, VerifierId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Chain
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct TestChainInner {
    frozen: BTreeMap<u64, CandidateBlock>,
    cycle: BTreeSet<VerifierId>,
    in_genesis_cycle: bool,
    genesis_mesh_size: usize,
    local: VerifierId,
    retention_edge: Option<u64>,
    open_edge_distance: u64,
    reject_freezes: bool,
}

/// Chain fake: a map of frozen blocks plus settable cycle state.
///
/// The local verifier is in the cycle exactly when the cycle set holds it.
///
/// `freeze_block` enforces that each frozen block extends the frozen edge,
/// so a test fails loudly if the freezing core ever commits out of order.
#[derive(Debug)]
pub struct TestChain {
    inner: RwLock<TestChainInner>,
}

impl TestChain {
    /// Create a chain whose frozen edge is `edge`, with the given cycle, as
    /// seen by verifier `local`.
    pub fn new(
        local: VerifierId,
        edge: CandidateBlock,
        cycle: impl IntoIterator<Item = VerifierId>,
    ) -> Self {
        let cycle: BTreeSet<VerifierId> = cycle.into_iter().collect();
        let mut frozen = BTreeMap::new();
        let retention_edge = Some(edge.height);
        frozen.insert(edge.height, edge);
        Self {
            inner: RwLock::new(TestChainInner {
                genesis_mesh_size: cycle.len(),
                frozen,
                cycle,
                in_genesis_cycle: false,
                local,
                retention_edge,
                open_edge_distance: 1_000,
                reject_freezes: false,
            }),
        }
    }

    pub fn set_in_genesis_cycle(&self, value: bool) {
        self.inner.write().in_genesis_cycle = value;
    }

    pub fn set_genesis_mesh_size(&self, size: usize) {
        self.inner.write().genesis_mesh_size = size;
    }

    pub fn set_retention_edge(&self, edge: Option<u64>) {
        self.inner.write().retention_edge = edge;
    }

    pub fn set_open_edge_distance(&self, distance: u64) {
        self.inner.write().open_edge_distance = distance;
    }

    /// Make every `freeze_block` call fail.
    pub fn set_reject_freezes(&self, value: bool) {
        self.inner.write().reject_freezes = value;
    }

    /// Replace the cycle. The frozen chain is untouched.
    pub fn set_cycle(&self, cycle: impl IntoIterator<Item = VerifierId>) {
        self.inner.write().cycle = cycle.into_iter().collect();
    }

    pub fn frozen_block(&self, height: u64) -> Option<CandidateBlock> {
        self.inner.read().frozen.get(&height).cloned()
    }

    pub fn frozen_edge(&self) -> CandidateBlock {
        let inner = self.inner.read();
        inner
            .frozen
            .values()
            .next_back()
            .cloned()
            .expect("chain always holds its starting edge")
    }

    /// Hashes of every frozen block, ascending by height.
    pub fn frozen_hashes(&self) -> Vec<(u64, Hash)> {
        self.inner
            .read()
            .frozen
            .iter()
            .map(|(height, block)| (*height, block.hash))
            .collect()
    }
}

impl ChainView for TestChain {
    fn frozen_edge_height(&self) -> u64 {
        self.inner.read().frozen.keys().next_back().copied().unwrap_or(0)
    }

    fn frozen_edge_blockchain_version(&self) -> u16 {
        self.inner
            .read()
            .frozen
            .values()
            .next_back()
            .map_or(0, |b| b.blockchain_version)
    }

    fn open_edge_height(&self, _strict: bool) -> u64 {
        self.frozen_edge_height() + self.inner.read().open_edge_distance
    }

    fn retention_edge_height(&self) -> Option<u64> {
        self.inner.read().retention_edge
    }

    fn current_cycle_length(&self) -> usize {
        self.inner.read().cycle.len()
    }

    fn in_genesis_cycle(&self) -> bool {
        self.inner.read().in_genesis_cycle
    }

    fn genesis_voting_mesh_size(&self) -> usize {
        self.inner.read().genesis_mesh_size
    }

    fn verifier_in_current_cycle(&self, verifier: &VerifierId) -> bool {
        self.inner.read().cycle.contains(verifier)
    }

    fn local_verifier_in_cycle(&self) -> bool {
        let inner = self.inner.read();
        inner.cycle.contains(&inner.local)
    }

    fn frozen_block_verification_timestamp(&self, height: u64, hash: &Hash) -> Option<u64> {
        self.inner
            .read()
            .frozen
            .get(&height)
            .filter(|block| block.hash == *hash)
            .map(|block| block.verification_timestamp)
    }

    fn freeze_block(&self, block: &CandidateBlock) -> Result<(), ChainError> {
        let mut inner = self.inner.write();
        if inner.reject_freezes {
            return Err(ChainError::Storage("freezes disabled".to_string()));
        }
        let (edge_height, edge_hash) = inner
            .frozen
            .iter()
            .next_back()
            .map(|(height, edge)| (*height, edge.hash))
            .unwrap_or((0, Hash::ZERO));
        if block.height != edge_height + 1 {
            return Err(ChainError::NotNextHeight {
                height: block.height,
                frozen_edge: edge_height,
            });
        }
        if block.previous_hash != edge_hash {
            return Err(ChainError::Rejected {
                hash: block.hash,
                reason: "does not extend frozen edge".to_string(),
            });
        }
        inner.frozen.insert(block.height, block.clone());
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Balance lists
// ═══════════════════════════════════════════════════════════════════════════

/// Balance-list fake. Computes [`test_balance_list_hash`] for every block
/// unless the block is marked unavailable or, when tied to a chain, its
/// predecessor is not the frozen edge.
#[derive(Debug, Default)]
pub struct TestBalanceLists {
    chain: Option<Arc<TestChain>>,
    unavailable: RwLock<HashSet<Hash>>,
}

impl TestBalanceLists {
    /// Every block's balance list is computable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only blocks directly above the frozen edge are computable.
    pub fn connected_to(chain: Arc<TestChain>) -> Self {
        Self {
            chain: Some(chain),
            unavailable: RwLock::new(HashSet::new()),
        }
    }

    pub fn mark_unavailable(&self, hash: Hash) {
        self.unavailable.write().insert(hash);
    }

    pub fn mark_available(&self, hash: &Hash) {
        self.unavailable.write().remove(hash);
    }
}

impl BalanceListProvider for TestBalanceLists {
    fn balance_list_hash_for_block(&self, block: &CandidateBlock) -> Option<Hash> {
        if self.unavailable.read().contains(&block.hash) {
            return None;
        }
        if let Some(chain) = &self.chain {
            if block.height != chain.frozen_edge_height() + 1 {
                return None;
            }
        }
        Some(test_balance_list_hash(&block.hash))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Scoring
// ═══════════════════════════════════════════════════════════════════════════

/// Scorer fake with per-hash scores and minimum vote timestamps.
///
/// Unset scores default to zero and unset vote timestamps to zero (votable
/// immediately).
#[derive(Debug, Default)]
pub struct TestScorer {
    scores: RwLock<HashMap<Hash, ChainScore>>,
    vote_timestamps: RwLock<HashMap<Hash, u64>>,
}

impl TestScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&self, hash: Hash, score: i64) {
        self.scores.write().insert(hash, ChainScore(score));
    }

    pub fn set_chain_score(&self, hash: Hash, score: ChainScore) {
        self.scores.write().insert(hash, score);
    }

    pub fn set_minimum_vote_timestamp(&self, hash: Hash, timestamp: u64) {
        self.vote_timestamps.write().insert(hash, timestamp);
    }
}

impl BlockScorer for TestScorer {
    fn chain_score(&self, block: &CandidateBlock, _reference_height: u64, _consensus_choice: bool) -> ChainScore {
        self.scores
            .read()
            .get(&block.hash)
            .copied()
            .unwrap_or(ChainScore(0))
    }

    fn minimum_vote_timestamp(&self, block: &CandidateBlock, _consensus_choice: bool) -> u64 {
        self.vote_timestamps
            .read()
            .get(&block.hash)
            .copied()
            .unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Vote storage
// ═══════════════════════════════════════════════════════════════════════════

/// Vote storage held in memory. Can be told to fail writes.
#[derive(Debug, Default)]
pub struct MemoryVoteStorage {
    vote: Mutex<Option<CurrentVote>>,
    writes: AtomicU64,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryVoteStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously persisted vote.
    pub fn with_vote(height: u64, hash: Hash) -> Self {
        let storage = Self::default();
        *storage.vote.lock() = Some(CurrentVote {
            height,
            hash,
            timestamp: 0,
        });
        storage
    }

    pub fn stored(&self) -> Option<CurrentVote> {
        *self.vote.lock()
    }

    /// Number of successful writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, value: bool) {
        self.fail_writes.store(value, Ordering::SeqCst);
    }
}

impl VoteStorage for MemoryVoteStorage {
    fn load_current_vote(&self) -> Option<CurrentVote> {
        *self.vote.lock()
    }

    fn store_current_vote(&self, vote: &CurrentVote) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        // Only height and hash are durable.
        *self.vote.lock() = Some(CurrentVote {
            timestamp: 0,
            ..*vote
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
