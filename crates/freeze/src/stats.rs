//! Freezing statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Freezing statistics for monitoring.
///
/// All counters increase monotonically over the life of a `FreezeState`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FreezeStats {
    /// Candidates admitted to the unfrozen pool.
    pub blocks_registered: u64,
    /// Candidates refused admission.
    pub blocks_rejected: u64,
    /// Candidates parked in the disconnected pool.
    pub disconnected_stored: u64,
    /// Candidates evicted to keep a height within its bound.
    pub evictions: u64,
    /// Evictions skipped because the target was the leading hash.
    pub evictions_skipped: u64,
    /// Votes cast by this node.
    pub votes_cast: u64,
    /// Blocks frozen, by either mechanism.
    pub blocks_frozen: u64,
    /// Chain recoveries that froze at least one block.
    pub chain_recoveries: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub blocks_registered: AtomicU64,
    pub blocks_rejected: AtomicU64,
    pub disconnected_stored: AtomicU64,
    pub evictions: AtomicU64,
    pub evictions_skipped: AtomicU64,
    pub votes_cast: AtomicU64,
    pub blocks_frozen: AtomicU64,
    pub chain_recoveries: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FreezeStats {
        FreezeStats {
            blocks_registered: self.blocks_registered.load(Ordering::Relaxed),
            blocks_rejected: self.blocks_rejected.load(Ordering::Relaxed),
            disconnected_stored: self.disconnected_stored.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            evictions_skipped: self.evictions_skipped.load(Ordering::Relaxed),
            votes_cast: self.votes_cast.load(Ordering::Relaxed),
            blocks_frozen: self.blocks_frozen.load(Ordering::Relaxed),
            chain_recoveries: self.chain_recoveries.load(Ordering::Relaxed),
        }
    }
}
