//! Chain recovery.
//!
//! Used when this node has fallen behind: instead of freezing one height at a
//! time, find two consecutive heights the cycle has clearly agreed on and
//! freeze the whole stretch from the frozen edge up to the second of them.

use diversity_types::{CandidateBlock, Hash};

/// A height whose leading hash passed the recovery threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassingHeight {
    pub height: u64,
    pub hash: Hash,
}

/// Scan `heights` (ascending) for two consecutive passing heights where the
/// second's leading block extends the first's leading hash.
///
/// `leading` returns the tally's leading hash and vote count at a height;
/// `resolve` looks a block up in the unfrozen or disconnected pool. Only
/// heights strictly above `frozen_edge` are considered. A passing height
/// that does not complete a pair becomes the new first passing height.
pub fn find_passing_pair<L, R>(
    heights: &[u64],
    frozen_edge: u64,
    threshold: usize,
    leading: L,
    resolve: R,
) -> Option<(PassingHeight, PassingHeight)>
where
    L: Fn(u64) -> Option<(Hash, usize)>,
    R: Fn(u64, &Hash) -> Option<CandidateBlock>,
{
    let mut first: Option<PassingHeight> = None;
    for &height in heights.iter().filter(|&&h| h > frozen_edge) {
        let Some((hash, votes)) = leading(height) else {
            continue;
        };
        if votes <= threshold {
            continue;
        }

        let passing = PassingHeight { height, hash };
        if let Some(prev) = first {
            if height == prev.height + 1
                && resolve(height, &hash).is_some_and(|block| block.previous_hash == prev.hash)
            {
                return Some((prev, passing));
            }
        }
        first = Some(passing);
    }
    None
}

/// Resolve every block from `frozen_edge + 1` to `tip`, walking back along
/// previous hashes. Returns them ascending, or `None` if any link is missing.
pub fn resolve_chain<R>(frozen_edge: u64, tip: &PassingHeight, resolve: R) -> Option<Vec<CandidateBlock>>
where
    R: Fn(u64, &Hash) -> Option<CandidateBlock>,
{
    let mut blocks = Vec::new();
    let mut hash = tip.hash;
    for height in (frozen_edge.saturating_add(1)..=tip.height).rev() {
        let block = resolve(height, &hash)?;
        hash = block.previous_hash;
        blocks.push(block);
    }
    blocks.reverse();
    Some(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_types::test_utils::{test_block, test_child};
    use std::collections::HashMap;

    struct Fixture {
        votes: HashMap<u64, (Hash, usize)>,
        blocks: HashMap<(u64, Hash), CandidateBlock>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                votes: HashMap::new(),
                blocks: HashMap::new(),
            }
        }

        fn add(&mut self, block: &CandidateBlock, votes: usize) {
            self.votes.insert(block.height, (block.hash, votes));
            self.blocks.insert((block.height, block.hash), block.clone());
        }

        fn heights(&self) -> Vec<u64> {
            let mut heights: Vec<u64> = self.votes.keys().copied().collect();
            heights.sort();
            heights
        }

        fn leading(&self, height: u64) -> Option<(Hash, usize)> {
            self.votes.get(&height).copied()
        }

        fn resolve(&self, height: u64, hash: &Hash) -> Option<CandidateBlock> {
            self.blocks.get(&(height, *hash)).cloned()
        }
    }

    #[test]
    fn test_finds_consecutive_pair() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        let b302 = test_child(&b301, 2);
        f.add(&b301, 80);
        f.add(&b302, 80);

        let (first, second) = find_passing_pair(
            &f.heights(),
            300,
            75,
            |h| f.leading(h),
            |h, hash| f.resolve(h, hash),
        )
        .unwrap();

        assert_eq!(first.height, 301);
        assert_eq!(second.height, 302);
        assert_eq!(second.hash, b302.hash);
    }

    #[test]
    fn test_requires_strictly_more_than_threshold() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        let b302 = test_child(&b301, 2);
        f.add(&b301, 75);
        f.add(&b302, 80);

        let pair = find_passing_pair(&f.heights(), 300, 75, |h| f.leading(h), |h, hash| f.resolve(h, hash));
        assert!(pair.is_none());
    }

    #[test]
    fn test_requires_link_between_pair() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        // Not a child of b301.
        let b302 = test_block(302, 2);
        f.add(&b301, 80);
        f.add(&b302, 80);

        let pair = find_passing_pair(&f.heights(), 300, 75, |h| f.leading(h), |h, hash| f.resolve(h, hash));
        assert!(pair.is_none());
    }

    #[test]
    fn test_unlinked_passing_height_restarts_pair() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        let b302 = test_block(302, 2);
        let b303 = test_child(&b302, 3);
        f.add(&b301, 80);
        f.add(&b302, 80);
        f.add(&b303, 80);

        let (first, second) =
            find_passing_pair(&f.heights(), 300, 75, |h| f.leading(h), |h, hash| f.resolve(h, hash)).unwrap();
        assert_eq!((first.height, second.height), (302, 303));
    }

    #[test]
    fn test_ignores_heights_at_or_below_frozen_edge() {
        let mut f = Fixture::new();
        let b300 = test_block(300, 1);
        let b301 = test_child(&b300, 2);
        f.add(&b300, 80);
        f.add(&b301, 80);

        let pair = find_passing_pair(&f.heights(), 300, 75, |h| f.leading(h), |h, hash| f.resolve(h, hash));
        assert!(pair.is_none());
    }

    #[test]
    fn test_resolve_chain_ascending() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        let b302 = test_child(&b301, 2);
        f.add(&b301, 80);
        f.add(&b302, 80);

        let tip = PassingHeight {
            height: 302,
            hash: b302.hash,
        };
        let chain = resolve_chain(300, &tip, |h, hash| f.resolve(h, hash)).unwrap();

        assert_eq!(chain, vec![b301, b302]);
    }

    #[test]
    fn test_resolve_chain_aborts_on_missing_link() {
        let mut f = Fixture::new();
        let b301 = test_block(301, 1);
        let b302 = test_child(&b301, 2);
        f.add(&b302, 80);

        let tip = PassingHeight {
            height: 302,
            hash: b302.hash,
        };
        assert!(resolve_chain(300, &tip, |h, hash| f.resolve(h, hash)).is_none());
    }
}
