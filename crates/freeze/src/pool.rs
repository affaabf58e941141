//! Candidate block pools.
//!
//! Both pools map `height → (hash → block)`. Maps are ordered so iteration
//! (and therefore every tie-break built on it) is deterministic.

use diversity_types::{CandidateBlock, Hash};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Candidates at one height, keyed by hash.
pub type BlocksAtHeight = BTreeMap<Hash, CandidateBlock>;

/// Outcome of the eviction check that follows an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// The height is within its bound (or eviction does not apply).
    None,
    /// This candidate was removed.
    Evicted(Hash),
    /// The eviction target is the leading hash in the tally, so it was kept
    /// and the height is temporarily over its bound.
    SkippedLeading(Hash),
}

/// Signature-valid, balance-checked candidates above the frozen edge.
#[derive(Debug, Default)]
pub struct UnfrozenBlockPool {
    blocks: RwLock<BTreeMap<u64, BlocksAtHeight>>,
}

impl UnfrozenBlockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a candidate with this hash is held at `height`.
    pub fn contains(&self, height: u64, hash: &Hash) -> bool {
        self.blocks
            .read()
            .get(&height)
            .is_some_and(|at_height| at_height.contains_key(hash))
    }

    /// Look up a candidate.
    pub fn get(&self, height: u64, hash: &Hash) -> Option<CandidateBlock> {
        self.blocks
            .read()
            .get(&height)
            .and_then(|at_height| at_height.get(hash))
            .cloned()
    }

    /// Insert `block`, then let `select` decide whether to evict.
    ///
    /// `select` sees the newly inserted block and every candidate at its
    /// height (including the new one) and runs under the pool's write lock,
    /// so the per-height bound holds under concurrent inserts. Returns `None`
    /// if a candidate with the same hash was already present.
    pub fn insert_with<F>(&self, block: CandidateBlock, select: F) -> Option<Eviction>
    where
        F: FnOnce(&CandidateBlock, &BlocksAtHeight) -> Eviction,
    {
        let mut blocks = self.blocks.write();
        let at_height = blocks.entry(block.height).or_default();
        if at_height.contains_key(&block.hash) {
            return None;
        }
        at_height.insert(block.hash, block.clone());

        let eviction = select(&block, at_height);
        if let Eviction::Evicted(hash) = eviction {
            at_height.remove(&hash);
        }
        Some(eviction)
    }

    /// Heights with at least one candidate, ascending.
    pub fn heights(&self) -> Vec<u64> {
        self.blocks
            .read()
            .iter()
            .filter(|(_, at_height)| !at_height.is_empty())
            .map(|(height, _)| *height)
            .collect()
    }

    pub fn count_at(&self, height: u64) -> usize {
        self.blocks.read().get(&height).map_or(0, BTreeMap::len)
    }

    /// Candidates at `height`, ordered by hash.
    pub fn blocks_at(&self, height: u64) -> Vec<CandidateBlock> {
        self.blocks
            .read()
            .get(&height)
            .map(|at_height| at_height.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every candidate, ordered by height then hash.
    pub fn all(&self) -> Vec<CandidateBlock> {
        self.blocks
            .read()
            .values()
            .flat_map(|at_height| at_height.values().cloned())
            .collect()
    }

    /// Total number of candidates across all heights.
    pub fn len(&self) -> usize {
        self.blocks.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every height at or below `height`.
    pub fn prune_at_or_below(&self, height: u64) {
        let mut blocks = self.blocks.write();
        *blocks = blocks.split_off(&height.saturating_add(1));
    }

    pub fn clear(&self) {
        self.blocks.write().clear();
    }
}

/// Candidates whose balance list could not be computed yet.
///
/// Held so they need not be fetched again once the chain catches up to them.
#[derive(Debug, Default)]
pub struct DisconnectedBlockPool {
    blocks: RwLock<BTreeMap<u64, BlocksAtHeight>>,
}

impl DisconnectedBlockPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `block` if its height holds fewer than `cap` entries.
    ///
    /// Returns true if the block is now held (including when it already was).
    pub fn insert(&self, block: CandidateBlock, cap: usize) -> bool {
        let mut blocks = self.blocks.write();
        if let Some(at_height) = blocks.get(&block.height) {
            if at_height.contains_key(&block.hash) {
                return true;
            }
            if at_height.len() >= cap {
                return false;
            }
        }
        if cap == 0 {
            return false;
        }
        blocks
            .entry(block.height)
            .or_default()
            .insert(block.hash, block);
        true
    }

    pub fn get(&self, height: u64, hash: &Hash) -> Option<CandidateBlock> {
        self.blocks
            .read()
            .get(&height)
            .and_then(|at_height| at_height.get(hash))
            .cloned()
    }

    /// Remove and return every block at `height`.
    pub fn take_height(&self, height: u64) -> Vec<CandidateBlock> {
        self.blocks
            .write()
            .remove(&height)
            .map(|at_height| at_height.into_values().collect())
            .unwrap_or_default()
    }

    pub fn count_at(&self, height: u64) -> usize {
        self.blocks.read().get(&height).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every height at or below `height`.
    pub fn prune_at_or_below(&self, height: u64) {
        let mut blocks = self.blocks.write();
        *blocks = blocks.split_off(&height.saturating_add(1));
    }
}
