//! Operator overrides for stalled heights.

use diversity_types::Hash;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Sparse per-height overrides of the freeze threshold and of this node's vote.
#[derive(Debug, Default)]
pub struct Overrides {
    thresholds: RwLock<BTreeMap<u64, u8>>,
    hashes: RwLock<BTreeMap<u64, Hash>>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold at `height` to `percent` of the voting pool.
    ///
    /// Zero removes the override; 100 or more is ignored. Returns true if the
    /// overrides changed.
    pub fn set_threshold(&self, height: u64, percent: u8) -> bool {
        match percent {
            0 => self.thresholds.write().remove(&height).is_some(),
            1..=99 => {
                self.thresholds.write().insert(height, percent);
                true
            }
            _ => false,
        }
    }

    /// Force the vote at `height`. An all-zero hash removes the override.
    pub fn set_hash(&self, height: u64, hash: Hash) {
        if hash.is_zero() {
            self.hashes.write().remove(&height);
        } else {
            self.hashes.write().insert(height, hash);
        }
    }

    pub fn threshold(&self, height: u64) -> Option<u8> {
        self.thresholds.read().get(&height).copied()
    }

    pub fn hash(&self, height: u64) -> Option<Hash> {
        self.hashes.read().get(&height).copied()
    }

    pub fn thresholds(&self) -> BTreeMap<u64, u8> {
        self.thresholds.read().clone()
    }

    pub fn hashes(&self) -> BTreeMap<u64, Hash> {
        self.hashes.read().clone()
    }

    /// Drop every override at or below `height`.
    pub fn prune_at_or_below(&self, height: u64) {
        let keep_from = height.saturating_add(1);
        let mut thresholds = self.thresholds.write();
        *thresholds = thresholds.split_off(&keep_from);
        drop(thresholds);
        let mut hashes = self.hashes.write();
        *hashes = hashes.split_off(&keep_from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_types::test_utils::test_hash;

    #[test]
    fn test_threshold_override_bounds() {
        let overrides = Overrides::new();

        assert!(overrides.set_threshold(10, 60));
        assert_eq!(overrides.threshold(10), Some(60));

        assert!(!overrides.set_threshold(10, 100));
        assert!(!overrides.set_threshold(10, 250));
        assert_eq!(overrides.threshold(10), Some(60));

        assert!(overrides.set_threshold(10, 0));
        assert_eq!(overrides.threshold(10), None);
    }

    #[test]
    fn test_zero_hash_clears_override() {
        let overrides = Overrides::new();
        let hash = test_hash(10, 1);

        overrides.set_hash(10, hash);
        assert_eq!(overrides.hash(10), Some(hash));

        overrides.set_hash(10, Hash::ZERO);
        assert_eq!(overrides.hash(10), None);
    }

    #[test]
    fn test_prune_at_or_below() {
        let overrides = Overrides::new();
        for height in 1..=4 {
            overrides.set_threshold(height, 60);
            overrides.set_hash(height, test_hash(height, 1));
        }

        overrides.prune_at_or_below(2);

        assert_eq!(overrides.thresholds().keys().copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(overrides.hashes().keys().copied().collect::<Vec<_>>(), vec![3, 4]);
    }
}
