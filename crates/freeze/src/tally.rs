//! In-memory vote tally.
//!
//! Tracks the latest vote of each verifier at each height and answers the
//! counting queries the freezing core makes.

use diversity_core::VoteTally;
use diversity_types::{BlockVote, Hash, VerifierId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::trace;

/// Votes grouped by height, one per voter.
#[derive(Debug, Default)]
pub struct BlockVoteTally {
    votes: RwLock<BTreeMap<u64, BTreeMap<VerifierId, BlockVote>>>,
}

impl BlockVoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vote counts per hash at `height`, ordered by hash.
    pub fn counts_at_height(&self, height: u64) -> BTreeMap<Hash, usize> {
        let votes = self.votes.read();
        let mut counts = BTreeMap::new();
        if let Some(at_height) = votes.get(&height) {
            for vote in at_height.values() {
                *counts.entry(vote.hash).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl VoteTally for BlockVoteTally {
    fn register_vote(&self, vote: &BlockVote) {
        let mut votes = self.votes.write();
        let at_height = votes.entry(vote.height).or_default();
        match at_height.get(&vote.voter) {
            // Out-of-order delivery must not roll a voter back to an older choice.
            Some(existing) if existing.timestamp > vote.timestamp => {
                trace!(
                    height = vote.height,
                    voter = %vote.voter,
                    "Ignoring stale vote"
                );
            }
            _ => {
                at_height.insert(vote.voter, vote.clone());
            }
        }
    }

    /// Ties go to the lowest hash.
    fn leading_hash_for_height(&self, height: u64) -> Option<(Hash, usize)> {
        let mut leading: Option<(Hash, usize)> = None;
        for (hash, count) in self.counts_at_height(height) {
            if leading.map_or(true, |(_, best)| count > best) {
                leading = Some((hash, count));
            }
        }
        leading
    }

    fn number_of_votes_at_height(&self, height: u64) -> usize {
        self.votes.read().get(&height).map_or(0, BTreeMap::len)
    }

    fn heights_with_votes(&self) -> Vec<u64> {
        self.votes
            .read()
            .iter()
            .filter(|(_, at_height)| !at_height.is_empty())
            .map(|(height, _)| *height)
            .collect()
    }

    fn hashes_for_height(&self, height: u64) -> Vec<Hash> {
        self.counts_at_height(height).into_keys().collect()
    }

    fn vote_for_identifier_at_height(&self, voter: &VerifierId, height: u64) -> Option<Hash> {
        self.votes
            .read()
            .get(&height)
            .and_then(|at_height| at_height.get(voter))
            .map(|vote| vote.hash)
    }

    fn prune_at_or_below(&self, height: u64) {
        let mut votes = self.votes.write();
        *votes = votes.split_off(&height.saturating_add(1));
    }
}
