//! Freezing state machine.
//!
//! Owns the candidate pools, overrides and this node's vote, and drives the
//! admission → vote → freeze → maintenance cycle against the collaborator
//! traits from `diversity-core`.

use crate::decision::{decide_vote, FallbackVote, VoteDecision, VoteInputs};
use crate::overrides::Overrides;
use crate::pool::{DisconnectedBlockPool, Eviction, UnfrozenBlockPool};
use crate::recovery::{find_passing_pair, resolve_chain};
use crate::stats::{FreezeStats, StatsCounters};
use crate::threshold::{freeze_threshold, recovery_threshold, voting_pool_size, ThresholdInputs};
use crate::FreezeConfig;
use diversity_core::{
    Action, BalanceListProvider, BlockScorer, ChainView, Clock, Event, VoteStorage, VoteTally,
};
use diversity_types::{
    BlockVote, CandidateBlock, CurrentVote, Hash, MissingBlockRequest, MissingBlockResponse,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// Vote description before the first decision.
pub const INITIAL_VOTE_DESCRIPTION: &str = "*** not yet voted ***";

/// The parts of the node the freezing state machine talks to.
#[derive(Clone)]
pub struct FreezeCollaborators {
    pub chain: Arc<dyn ChainView>,
    pub balance_lists: Arc<dyn BalanceListProvider>,
    pub scorer: Arc<dyn BlockScorer>,
    pub tally: Arc<dyn VoteTally>,
    pub storage: Arc<dyn VoteStorage>,
    pub clock: Arc<dyn Clock>,
}

/// Freezing state machine.
///
/// Every entry point takes `&self`; pools, overrides and vote state sit
/// behind their own locks. Freezing and maintenance are additionally
/// serialized by `freeze_lock` so two callers can never commit the same
/// height.
///
/// # Tick Flow
///
/// 1. **Update vote** → decide and cast a vote for frozen edge + 1
/// 2. **Freeze block** → commit frozen edge + 1 if its leading hash passes the threshold
/// 3. **Freeze chain** → if (2) made no progress, try recovery
/// 4. **Maintenance** → after any freeze, prune and reconnect disconnected blocks
/// 5. **Missing blocks** → request voted-for blocks we don't hold
pub struct FreezeState {
    // ═══════════════════════════════════════════════════════════════════════════
    // Configuration & collaborators
    // ═══════════════════════════════════════════════════════════════════════════
    config: FreezeConfig,
    chain: Arc<dyn ChainView>,
    balance_lists: Arc<dyn BalanceListProvider>,
    scorer: Arc<dyn BlockScorer>,
    tally: Arc<dyn VoteTally>,
    storage: Arc<dyn VoteStorage>,
    clock: Arc<dyn Clock>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Candidate pools
    // ═══════════════════════════════════════════════════════════════════════════
    unfrozen: UnfrozenBlockPool,
    disconnected: DisconnectedBlockPool,
    overrides: Overrides,

    // ═══════════════════════════════════════════════════════════════════════════
    // Vote state
    // ═══════════════════════════════════════════════════════════════════════════
    /// This node's current vote. Persisted whenever its hash changes.
    current_vote: Mutex<Option<CurrentVote>>,

    /// When this node last cast a vote. Reset to zero after a freeze so the
    /// next height can be voted on immediately.
    last_vote_timestamp: AtomicU64,

    /// Human-readable summary of the last vote decision.
    vote_description: RwLock<String>,

    // ═══════════════════════════════════════════════════════════════════════════
    // Freezing
    // ═══════════════════════════════════════════════════════════════════════════
    freeze_lock: Mutex<()>,
    stats: StatsCounters,
}

impl std::fmt::Debug for FreezeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeState")
            .field("local_identifier", &self.config.local_identifier)
            .field("frozen_edge", &self.chain.frozen_edge_height())
            .field("unfrozen_blocks", &self.unfrozen.len())
            .field("disconnected_blocks", &self.disconnected.len())
            .field("current_vote", &*self.current_vote.lock())
            .finish()
    }
}

impl FreezeState {
    /// Create a freezing state machine.
    ///
    /// The current vote is restored from `collaborators.storage` so a
    /// restarted node keeps the vote it already broadcast.
    pub fn new(config: FreezeConfig, collaborators: FreezeCollaborators) -> Self {
        let current_vote = collaborators.storage.load_current_vote();
        if let Some(vote) = &current_vote {
            info!(
                height = vote.height,
                block_hash = %vote.hash,
                "Restored current vote"
            );
        }

        Self {
            config,
            chain: collaborators.chain,
            balance_lists: collaborators.balance_lists,
            scorer: collaborators.scorer,
            tally: collaborators.tally,
            storage: collaborators.storage,
            clock: collaborators.clock,
            unfrozen: UnfrozenBlockPool::new(),
            disconnected: DisconnectedBlockPool::new(),
            overrides: Overrides::new(),
            current_vote: Mutex::new(current_vote),
            last_vote_timestamp: AtomicU64::new(0),
            vote_description: RwLock::new(INITIAL_VOTE_DESCRIPTION.to_string()),
            freeze_lock: Mutex::new(()),
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &FreezeConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Event handling
    // ═══════════════════════════════════════════════════════════════════════════

    /// Process one event and return the actions the runner must perform.
    pub fn handle(&self, event: &Event) -> Vec<Action> {
        match event {
            Event::ConsensusTimer => self.on_consensus_tick(),
            Event::BlockReceived { block } => {
                self.register_block(block.clone());
                vec![]
            }
            Event::BlockVoteReceived { vote } => {
                self.on_block_vote(vote);
                vec![]
            }
            Event::MissingBlockReceived { request, response } => {
                self.on_missing_block_response(request, response);
                vec![]
            }
            Event::HashOverrideRequested { height, hash } => {
                self.set_hash_override(*height, *hash);
                vec![]
            }
            Event::ThresholdOverrideRequested { height, percent } => {
                self.set_threshold_override(*height, *percent);
                vec![]
            }
        }
    }

    /// Run one pass of the driver sequence.
    pub fn on_consensus_tick(&self) -> Vec<Action> {
        let mut actions = self.update_vote();

        let mut progressed = self.attempt_to_freeze_block();
        if !progressed {
            progressed = self.attempt_to_freeze_chain();
        }
        if progressed {
            self.perform_maintenance();
            self.register_disconnected_blocks();
        }

        actions.extend(self.request_missing_blocks());
        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Admission
    // ═══════════════════════════════════════════════════════════════════════════

    /// Offer a candidate block. Returns true if it was newly admitted to the
    /// unfrozen pool.
    ///
    /// Blocks whose balance list cannot be computed yet may be parked in the
    /// disconnected pool instead; that is not an admission.
    #[instrument(level = "trace", skip_all, fields(height = block.height, block_hash = %block.hash))]
    pub fn register_block(&self, block: CandidateBlock) -> bool {
        let frozen_edge = self.chain.frozen_edge_height();
        if block.height <= frozen_edge {
            trace!(frozen_edge, "Ignoring block at or below frozen edge");
            return false;
        }
        if !block.signature_valid {
            debug!("Rejecting block with invalid signature");
            StatsCounters::bump(&self.stats.blocks_rejected);
            return false;
        }
        let open_edge = self.chain.open_edge_height(true);
        if block.height > open_edge {
            debug!(open_edge, "Rejecting block beyond open edge");
            StatsCounters::bump(&self.stats.blocks_rejected);
            return false;
        }
        if self.unfrozen.contains(block.height, &block.hash) {
            trace!("Block already registered");
            return false;
        }

        if let Err(reason) = self.validate_verification_timestamp(&block) {
            debug!(%reason, "Rejecting block");
            StatsCounters::bump(&self.stats.blocks_rejected);
            return false;
        }

        let frozen_version = self.chain.frozen_edge_blockchain_version();
        if block.blockchain_version < frozen_version {
            debug!(
                version = block.blockchain_version,
                frozen_version, "Rejecting blockchain version downgrade"
            );
            StatsCounters::bump(&self.stats.blocks_rejected);
            return false;
        }

        match self.balance_lists.balance_list_hash_for_block(&block) {
            Some(computed) if computed == block.balance_list_hash => {
                self.insert_unfrozen(block, frozen_edge)
            }
            Some(computed) => {
                debug!(
                    declared = %block.balance_list_hash,
                    computed = %computed,
                    "Rejecting block with mismatched balance list"
                );
                StatsCounters::bump(&self.stats.blocks_rejected);
                false
            }
            None => {
                self.store_disconnected(block, frozen_edge);
                false
            }
        }
    }

    /// Check the block's verification timestamp against its predecessor and
    /// the local clock.
    fn validate_verification_timestamp(&self, block: &CandidateBlock) -> Result<(), String> {
        let previous_height = block.height - 1;
        let previous_timestamp = self
            .unfrozen
            .get(previous_height, &block.previous_hash)
            .map(|previous| previous.verification_timestamp)
            .or_else(|| {
                self.chain
                    .frozen_block_verification_timestamp(previous_height, &block.previous_hash)
            });

        if let Some(previous_timestamp) = previous_timestamp {
            let earliest = previous_timestamp + self.config.minimum_verification_interval_ms;
            if block.verification_timestamp < earliest {
                return Err(format!(
                    "verification timestamp {} less than {} after previous block",
                    block.verification_timestamp, self.config.minimum_verification_interval_ms
                ));
            }
        }

        let now = self.clock.now_ms();
        if block.verification_timestamp > now + self.config.max_timestamp_rush_ms {
            return Err(format!(
                "verification timestamp {} too far ahead of local clock {}",
                block.verification_timestamp, now
            ));
        }

        Ok(())
    }

    fn insert_unfrozen(&self, block: CandidateBlock, frozen_edge: u64) -> bool {
        let height = block.height;
        let in_genesis = self.chain.in_genesis_cycle();
        let cap = self.config.max_candidates_per_height;

        let outcome = self.unfrozen.insert_with(block, |new_block, at_height| {
            if at_height.len() <= cap || in_genesis {
                return Eviction::None;
            }

            // The new block is the initial target and is only displaced by a
            // strictly higher score, so a stream of equally bad blocks can't
            // churn the pool.
            let mut target = new_block;
            let mut highest = self.scorer.chain_score(new_block, frozen_edge, false);
            for candidate in at_height.values() {
                let score = self.scorer.chain_score(candidate, frozen_edge, false);
                if score > highest {
                    highest = score;
                    target = candidate;
                }
            }

            match self.tally.leading_hash_for_height(height) {
                Some((leading, _)) if leading == target.hash => Eviction::SkippedLeading(target.hash),
                _ => Eviction::Evicted(target.hash),
            }
        });

        match outcome {
            None => false,
            Some(eviction) => {
                StatsCounters::bump(&self.stats.blocks_registered);
                match eviction {
                    Eviction::None => {}
                    Eviction::Evicted(hash) => {
                        StatsCounters::bump(&self.stats.evictions);
                        debug!(height, evicted = %hash, "Evicted highest-scored block");
                    }
                    Eviction::SkippedLeading(hash) => {
                        StatsCounters::bump(&self.stats.evictions_skipped);
                        warn!(
                            height,
                            block_hash = %hash,
                            count = self.unfrozen.count_at(height),
                            "Keeping extra block at height: eviction target is the leading hash"
                        );
                    }
                }
                trace!(height, "Registered block");
                true
            }
        }
    }

    fn store_disconnected(&self, block: CandidateBlock, frozen_edge: u64) {
        let height = block.height;
        let in_range =
            height > frozen_edge + 1 && height <= frozen_edge + self.config.max_disconnected_distance;
        if !in_range || !self.chain.verifier_in_current_cycle(&block.verifier) {
            trace!(height, "Balance list unavailable; dropping block");
            return;
        }

        let hash = block.hash;
        if self
            .disconnected
            .insert(block, self.config.max_disconnected_per_height)
        {
            StatsCounters::bump(&self.stats.disconnected_stored);
            debug!(height, block_hash = %hash, "Stored disconnected block");
        }
    }

    /// Record a peer's vote in the tally.
    ///
    /// Only votes from current cycle members count, except during the Genesis
    /// cycle, and only for unfrozen heights no further above the frozen edge
    /// than a disconnected block may be held.
    pub fn on_block_vote(&self, vote: &BlockVote) {
        let frozen_edge = self.chain.frozen_edge_height();
        if vote.height <= frozen_edge {
            trace!(height = vote.height, "Ignoring vote at or below frozen edge");
            return;
        }
        if vote.height - frozen_edge > self.config.max_disconnected_distance {
            trace!(
                height = vote.height,
                frozen_edge,
                "Ignoring vote too far above frozen edge"
            );
            return;
        }
        if !self.chain.in_genesis_cycle() && !self.chain.verifier_in_current_cycle(&vote.voter) {
            trace!(voter = %vote.voter, "Ignoring vote from verifier outside cycle");
            return;
        }
        self.tally.register_vote(vote);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Voting
    // ═══════════════════════════════════════════════════════════════════════════

    /// Decide and cast this node's vote for frozen edge + 1.
    ///
    /// Does nothing if no candidates are held at that height or the last vote
    /// was too recent.
    pub fn update_vote(&self) -> Vec<Action> {
        let frozen_edge = self.chain.frozen_edge_height();
        let height = frozen_edge + 1;
        let candidates = self.unfrozen.blocks_at(height);
        if candidates.is_empty() {
            return vec![];
        }

        let now = self.clock.now_ms();
        let last_vote = self.last_vote_timestamp.load(Ordering::SeqCst);
        if last_vote >= now.saturating_sub(self.config.vote_spacing_ms()) {
            return vec![];
        }

        let current_vote = {
            let mut current = self.current_vote.lock();
            if current.is_some_and(|vote| vote.height != height) {
                *current = None;
            }
            *current
        };

        let fallback = match &self.config.fallback_vote_source {
            None => FallbackVote::NotConfigured,
            Some(source) => self
                .tally
                .vote_for_identifier_at_height(source, height)
                .map_or(FallbackVote::Unavailable, FallbackVote::Vote),
        };

        let inputs = VoteInputs {
            height,
            frozen_edge,
            now,
            candidates: &candidates,
            hash_override: self.overrides.hash(height),
            in_genesis_cycle: self.chain.in_genesis_cycle(),
            cycle_length: self.chain.current_cycle_length(),
            votes_at_height: self.tally.number_of_votes_at_height(height),
            leading: self.tally.leading_hash_for_height(height),
            current_vote,
            retention_edge_available: self.chain.retention_edge_height().is_some(),
            fallback,
            first_decision: *self.vote_description.read() == INITIAL_VOTE_DESCRIPTION,
        };
        let decision = decide_vote(&inputs, self.scorer.as_ref(), &self.config);
        *self.vote_description.write() = format!("h={}; {}", height, decision);

        let Some(hash) = decision.hash() else {
            debug!(height, %decision, "No vote determined");
            return vec![];
        };

        let actions = self.cast_vote(height, hash);
        self.replace_current_vote(height, hash, now, &decision);
        actions
    }

    /// Replace and persist the current vote if its hash changed.
    fn replace_current_vote(&self, height: u64, hash: Hash, now: u64, decision: &VoteDecision) {
        let changed = {
            let mut current = self.current_vote.lock();
            if current.map_or(true, |vote| vote.hash != hash) {
                let vote = CurrentVote {
                    height,
                    hash,
                    timestamp: now,
                };
                *current = Some(vote);
                Some(vote)
            } else {
                None
            }
        };

        if let Some(vote) = changed {
            info!(
                height,
                block_hash = %hash,
                rule = decision.label(),
                "Vote changed"
            );
            if let Err(e) = self.storage.store_current_vote(&vote) {
                warn!(height, error = %e, "Failed to persist current vote");
            }
        }
    }

    /// Cast a vote. It is tallied and broadcast only if this node may vote:
    /// a current cycle member, or anyone during the Genesis cycle.
    pub fn cast_vote(&self, height: u64, hash: Hash) -> Vec<Action> {
        let now = self.clock.now_ms();
        self.last_vote_timestamp.store(now, Ordering::SeqCst);
        StatsCounters::bump(&self.stats.votes_cast);

        if !self.chain.local_verifier_in_cycle() && !self.chain.in_genesis_cycle() {
            trace!(height, block_hash = %hash, "Not in cycle; vote kept local");
            return vec![];
        }

        let vote = BlockVote {
            height,
            hash,
            voter: self.config.local_identifier,
            timestamp: now,
        };
        self.tally.register_vote(&vote);
        trace!(height, block_hash = %hash, "Broadcasting vote");
        vec![Action::BroadcastVote { vote }]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Freezing
    // ═══════════════════════════════════════════════════════════════════════════

    /// Freeze frozen edge + 1 if its leading hash has enough votes.
    pub fn attempt_to_freeze_block(&self) -> bool {
        let _guard = self.freeze_lock.lock();

        let frozen_edge = self.chain.frozen_edge_height();
        let height = frozen_edge + 1;
        let Some((leading_hash, votes)) = self.tally.leading_hash_for_height(height) else {
            return false;
        };

        let in_genesis_cycle = self.chain.in_genesis_cycle();
        let cycle_length = self.chain.current_cycle_length();
        let voting_pool = voting_pool_size(
            in_genesis_cycle,
            self.chain.genesis_voting_mesh_size(),
            cycle_length,
        );

        let leading_block = self.unfrozen.get(height, &leading_hash);
        if leading_block.is_none() && !in_genesis_cycle {
            debug!(height, leading = %leading_hash, "Leading block not held");
        }

        let now = self.clock.now_ms();
        let threshold = freeze_threshold(
            &ThresholdInputs {
                voting_pool,
                cycle_length,
                in_genesis_cycle,
                elapsed_since_verification_ms: leading_block
                    .as_ref()
                    .map(|block| now.saturating_sub(block.verification_timestamp)),
                override_percent: self.overrides.threshold(height),
            },
            &self.config,
        );

        if votes <= threshold {
            if in_genesis_cycle {
                debug!(
                    height,
                    votes,
                    threshold,
                    mesh_size = voting_pool,
                    "Unable to freeze"
                );
            }
            return false;
        }

        let Some(block) = leading_block else {
            return false;
        };
        match self.chain.freeze_block(&block) {
            Ok(()) => {
                StatsCounters::bump(&self.stats.blocks_frozen);
                info!(
                    height,
                    block_hash = %block.hash,
                    votes,
                    threshold,
                    "Froze block"
                );
                true
            }
            Err(e) => {
                warn!(height, block_hash = %block.hash, error = %e, "Failed to freeze block");
                false
            }
        }
    }

    /// Recovery: freeze a stretch of chain once two consecutive heights past
    /// the frozen edge have passed the recovery threshold.
    ///
    /// Returns true if at least one block was frozen.
    pub fn attempt_to_freeze_chain(&self) -> bool {
        let _guard = self.freeze_lock.lock();

        let frozen_edge = self.chain.frozen_edge_height();
        let voting_pool = voting_pool_size(
            self.chain.in_genesis_cycle(),
            self.chain.genesis_voting_mesh_size(),
            self.chain.current_cycle_length(),
        );
        let threshold = recovery_threshold(voting_pool);

        let heights = self.tally.heights_with_votes();
        let Some((first, second)) = find_passing_pair(
            &heights,
            frozen_edge,
            threshold,
            |height| self.tally.leading_hash_for_height(height),
            |height, hash| self.unverified_block_at_height(height, hash),
        ) else {
            return false;
        };

        let Some(blocks) = resolve_chain(frozen_edge, &second, |height, hash| {
            self.unverified_block_at_height(height, hash)
        }) else {
            debug!(
                frozen_edge,
                first = first.height,
                second = second.height,
                "Chain recovery aborted: missing block"
            );
            return false;
        };

        let mut frozen = 0usize;
        for block in &blocks {
            if let Err(e) = self.chain.freeze_block(block) {
                warn!(
                    height = block.height,
                    block_hash = %block.hash,
                    error = %e,
                    "Chain recovery stopped: failed to freeze block"
                );
                break;
            }
            StatsCounters::bump(&self.stats.blocks_frozen);
            info!(height = block.height, block_hash = %block.hash, "Froze chain block");
            frozen += 1;
        }

        if frozen > 0 {
            StatsCounters::bump(&self.stats.chain_recoveries);
        }
        frozen > 0
    }

    /// Clean up after a freeze.
    pub fn perform_maintenance(&self) {
        let _guard = self.freeze_lock.lock();

        self.last_vote_timestamp.store(0, Ordering::SeqCst);

        let frozen_edge = self.chain.frozen_edge_height();
        self.unfrozen.prune_at_or_below(frozen_edge);
        self.disconnected.prune_at_or_below(frozen_edge);
        self.overrides.prune_at_or_below(frozen_edge);
        self.tally.prune_at_or_below(frozen_edge);
        trace!(frozen_edge, "Maintenance complete");
    }

    /// Move disconnected blocks at frozen edge + 1 through admission.
    ///
    /// Returns the number admitted.
    pub fn register_disconnected_blocks(&self) -> usize {
        let height = self.chain.frozen_edge_height() + 1;
        let blocks = self.disconnected.take_height(height);
        if blocks.is_empty() {
            return 0;
        }

        let offered = blocks.len();
        let registered = blocks
            .into_iter()
            .filter(|block| self.register_block(block.clone()))
            .count();
        debug!(height, offered, registered, "Reconnected disconnected blocks");
        registered
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Missing blocks
    // ═══════════════════════════════════════════════════════════════════════════

    /// Request every block voted for at frozen edge + 1 that we don't hold.
    pub fn request_missing_blocks(&self) -> Vec<Action> {
        let height = self.chain.frozen_edge_height() + 1;
        self.tally
            .hashes_for_height(height)
            .into_iter()
            .filter(|hash| !self.unfrozen.contains(height, hash))
            .map(|hash| {
                debug!(height, block_hash = %hash, "Requesting missing block");
                Action::FetchMissingBlock {
                    request: MissingBlockRequest { height, hash },
                }
            })
            .collect()
    }

    /// Admit a fetched block if it is the one requested.
    pub fn on_missing_block_response(
        &self,
        request: &MissingBlockRequest,
        response: &MissingBlockResponse,
    ) -> bool {
        match &response.block {
            Some(block) if block.hash == request.hash && block.height == request.height => {
                debug!(height = block.height, block_hash = %block.hash, "Got missing block");
                self.register_block(block.clone())
            }
            Some(block) => {
                debug!(
                    requested = %request.hash,
                    received = %block.hash,
                    "Ignoring missing block response with wrong hash"
                );
                false
            }
            None => {
                trace!(height = request.height, "Peer did not have missing block");
                false
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Overrides
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the freeze threshold at `height` to `percent` of the voting pool.
    /// Zero clears; 100 or more is ignored.
    pub fn set_threshold_override(&self, height: u64, percent: u8) {
        if self.overrides.set_threshold(height, percent) {
            info!(height, percent, "Threshold override updated");
        } else {
            debug!(height, percent, "Threshold override ignored");
        }
    }

    /// Force this node's vote at `height`. A zero hash clears.
    pub fn set_hash_override(&self, height: u64, hash: Hash) {
        self.overrides.set_hash(height, hash);
        info!(height, block_hash = %hash, "Hash override updated");
    }

    pub fn threshold_overrides(&self) -> BTreeMap<u64, u8> {
        self.overrides.thresholds()
    }

    pub fn hash_overrides(&self) -> BTreeMap<u64, Hash> {
        self.overrides.hashes()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn unfrozen_block_heights(&self) -> Vec<u64> {
        self.unfrozen.heights()
    }

    pub fn number_of_blocks_at_height(&self, height: u64) -> usize {
        self.unfrozen.count_at(height)
    }

    pub fn all_unfrozen_blocks(&self) -> Vec<CandidateBlock> {
        self.unfrozen.all()
    }

    pub fn unfrozen_blocks_at_height(&self, height: u64) -> Vec<CandidateBlock> {
        self.unfrozen.blocks_at(height)
    }

    pub fn unfrozen_block_at_height(&self, height: u64, hash: &Hash) -> Option<CandidateBlock> {
        self.unfrozen.get(height, hash)
    }

    /// Look in the unfrozen pool, then the disconnected pool.
    ///
    /// Disconnected blocks have not had their balance list checked. Only use
    /// this where the cycle has already agreed on the block.
    pub fn unverified_block_at_height(&self, height: u64, hash: &Hash) -> Option<CandidateBlock> {
        self.unfrozen
            .get(height, hash)
            .or_else(|| self.disconnected.get(height, hash))
    }

    pub fn number_of_disconnected_blocks(&self) -> usize {
        self.disconnected.len()
    }

    /// Drop every unfrozen candidate.
    pub fn purge(&self) {
        self.unfrozen.clear();
    }

    pub fn vote_description(&self) -> String {
        self.vote_description.read().clone()
    }

    pub fn current_vote(&self) -> Option<CurrentVote> {
        *self.current_vote.lock()
    }

    pub fn stats(&self) -> FreezeStats {
        self.stats.snapshot()
    }
}
