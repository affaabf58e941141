//! Deterministic simulation runner.
//!
//! Each verifier has its own chain, vote storage and clock. The runner owns
//! everything that happens between verifiers: it produces blocks on the
//! producers' behalf, carries votes and fetches across the simulated network,
//! and delivers catch-up blocks to verifiers that fell behind.

use crate::event_queue::EventKey;
use crate::network::{Delivery, NetworkConfig, SimulatedNetwork};
use crate::node::{SimNode, SimScorer};
use crate::NodeIndex;
use diversity_core::{Action, Event};
use diversity_freeze::FreezeConfig;
use diversity_types::test_utils::{test_balance_list_hash, test_verifier};
use diversity_types::{
    BlockVote, CandidateBlock, Hash, MissingBlockRequest, MissingBlockResponse, VerifierId,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Timing and consensus parameters for a simulation.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub network: NetworkConfig,

    /// Period of each verifier's consensus tick.
    pub tick_interval: Duration,

    /// Minimum time between a block's verification and its successor's.
    pub block_interval_ms: u64,

    /// Extra delay, per score point, before a non-preferred block is votable.
    pub vote_delay_ms: u64,

    /// Maximum frozen blocks handed to a lagging verifier per catch-up.
    pub catch_up_limit: u64,

    /// Freezing constants shared by every verifier. The local identifier is
    /// filled in per verifier.
    pub freeze: FreezeConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            tick_interval: Duration::from_millis(500),
            block_interval_ms: 2_000,
            vote_delay_ms: 1_000,
            catch_up_limit: 100,
            freeze: FreezeConfig::default(),
        }
    }
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages sent (successfully scheduled for delivery).
    pub messages_sent: u64,
    /// Messages dropped due to network partition.
    pub messages_dropped_partition: u64,
    /// Messages dropped due to packet loss.
    pub messages_dropped_loss: u64,
    /// Blocks produced across all verifiers.
    pub blocks_produced: u64,
    /// Blocks handed to lagging verifiers.
    pub blocks_synced: u64,
    /// Missing-block fetches issued.
    pub fetches_issued: u64,
    /// Verifier restarts.
    pub restarts: u64,
}

impl SimulationStats {
    /// Total messages dropped (partition + packet loss).
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_dropped_loss
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same seed, produces identical results every run.
pub struct SimulationRunner {
    config: SimulationConfig,

    /// All verifiers, indexed by NodeIndex.
    nodes: Vec<SimNode>,

    /// Maps a vote's voter back to the verifier that cast it.
    voters: HashMap<VerifierId, NodeIndex>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    network: SimulatedNetwork,

    /// RNG for network conditions and fetch peer choice (seeded for determinism).
    rng: ChaCha8Rng,

    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with default timing over the given network.
    pub fn new(network_config: NetworkConfig, seed: u64) -> Self {
        Self::with_config(
            SimulationConfig {
                network: network_config,
                ..SimulationConfig::default()
            },
            seed,
        )
    }

    pub fn with_config(config: SimulationConfig, seed: u64) -> Self {
        let network = SimulatedNetwork::new(config.network.clone());
        let rng = ChaCha8Rng::seed_from_u64(seed);

        let cycle: Vec<VerifierId> = network
            .verifiers()
            .map(|index| test_verifier((index + 1) as u8))
            .collect();
        let scorer = Arc::new(SimScorer::new(cycle.clone(), config.vote_delay_ms));
        let genesis = genesis_block(cycle.first().copied().unwrap_or_default());

        let nodes: Vec<SimNode> = cycle
            .iter()
            .enumerate()
            .map(|(index, verifier)| {
                let mut freeze = config.freeze.clone();
                freeze.local_identifier = *verifier;
                SimNode::new(
                    index as NodeIndex,
                    freeze,
                    genesis.clone(),
                    cycle.clone(),
                    scorer.clone(),
                )
            })
            .collect();
        let voters = nodes
            .iter()
            .map(|node| (node.verifier(), node.index()))
            .collect();

        Self {
            config,
            nodes,
            voters,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network,
            rng,
            stats: SimulationStats::default(),
        }
    }

    /// Schedule the first consensus tick of every verifier, staggered across
    /// one tick interval.
    pub fn initialize(&mut self) {
        let count = self.nodes.len() as u32;
        if count == 0 {
            return;
        }
        let stagger = self.config.tick_interval / count;
        for index in 0..count {
            let first_tick = self.now + self.config.tick_interval + stagger * index;
            self.schedule_event(index, first_tick, Event::ConsensusTimer);
        }
        info!(
            verifiers = count,
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Initialized simulation"
        );
    }

    /// Schedule an event for a node at a specific time (operator commands,
    /// hand-crafted blocks).
    pub fn schedule_initial_event(&mut self, node: NodeIndex, time: Duration, event: Event) {
        self.schedule_event(node, time, event);
    }

    /// Run simulation until no more events or time limit reached.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(
            end_time_secs = end_time.as_secs_f64(),
            "Running simulation step"
        );

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(
                    remaining_events = self.event_queue.len(),
                    "Time limit reached"
                );
                break;
            }

            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;
            let node_index = key.node_index;

            trace!(
                time = ?self.now,
                node = node_index,
                event = event.type_name(),
                "Processing event"
            );

            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            if let Event::BlockVoteReceived { vote } = &event {
                self.catch_up_if_behind(node_index, vote);
            }

            let now_ms = self.now_ms();
            let actions = {
                let node = &self.nodes[node_index as usize];
                node.set_time(now_ms);
                node.state().handle(&event)
            };
            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(node_index, action);
            }

            if matches!(event, Event::ConsensusTimer) {
                let next_tick = self.now + self.config.tick_interval;
                self.schedule_event(node_index, next_tick, Event::ConsensusTimer);
                self.maybe_produce_block(node_index);
            }
        }

        self.now = self.now.max(end_time);

        trace!(
            events_processed = self.stats.events_processed,
            actions_generated = self.stats.actions_generated,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    /// Process an action from a node.
    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::BroadcastVote { vote } => {
                for to in self.network.verifiers() {
                    if to != from {
                        self.try_deliver_message(
                            from,
                            to,
                            Event::BlockVoteReceived { vote: vote.clone() },
                        );
                    }
                }
            }

            Action::FetchMissingBlock { request } => {
                self.fetch_from_random_peer(from, request);
            }
        }
    }

    /// Ask one random peer for a block. The answer comes back after a round
    /// trip; either leg can be lost.
    fn fetch_from_random_peer(&mut self, from: NodeIndex, request: MissingBlockRequest) {
        self.stats.fetches_issued += 1;
        let peers: Vec<NodeIndex> = self
            .network
            .verifiers()
            .filter(|peer| *peer != from)
            .collect();
        if peers.is_empty() {
            return;
        }
        let peer = peers[self.rng.gen_range(0..peers.len())];

        let Some(outbound) = self.route(from, peer) else {
            return;
        };
        let block = self.nodes[peer as usize].serve_block(&request);
        let Some(inbound) = self.route(peer, from) else {
            return;
        };

        trace!(
            node = from,
            peer = peer,
            height = request.height,
            found = block.is_some(),
            "Fetch answered"
        );
        let event = Event::MissingBlockReceived {
            request,
            response: MissingBlockResponse { block },
        };
        let delivery_time = self.now + outbound + inbound;
        self.schedule_event(from, delivery_time, event);
    }

    /// Hand a lagging node the voter's chain when the vote is for a height
    /// past the node's frozen edge + 1.
    fn catch_up_if_behind(&mut self, node: NodeIndex, vote: &BlockVote) {
        let frozen_edge = self.nodes[node as usize].frozen_edge();
        if vote.height <= frozen_edge + 1 {
            return;
        }
        let Some(&source) = self.voters.get(&vote.voter) else {
            return;
        };
        if source == node {
            return;
        }

        let blocks = self.nodes[source as usize]
            .catch_up_blocks(frozen_edge, self.config.catch_up_limit);
        if blocks.is_empty() {
            return;
        }
        debug!(
            node = node,
            source = source,
            frozen_edge,
            blocks = blocks.len(),
            "Delivering catch-up blocks"
        );
        self.stats.blocks_synced += blocks.len() as u64;
        for block in blocks {
            self.schedule_event(node, self.now, Event::BlockReceived { block });
        }
    }

    /// Let a node produce its next block after a tick and gossip it.
    fn maybe_produce_block(&mut self, node: NodeIndex) {
        let now_ms = self.now_ms();
        let cycle_length = self.nodes.len() as u64;
        let block_interval_ms = self.config.block_interval_ms;
        let Some(block) =
            self.nodes[node as usize].produce_block(now_ms, cycle_length, block_interval_ms)
        else {
            return;
        };

        debug!(
            node = node,
            height = block.height,
            block_hash = %block.hash,
            "Produced block"
        );
        self.stats.blocks_produced += 1;

        self.schedule_event(
            node,
            self.now,
            Event::BlockReceived {
                block: block.clone(),
            },
        );
        for to in self.network.verifiers() {
            if to != node {
                self.try_deliver_message(
                    node,
                    to,
                    Event::BlockReceived {
                        block: block.clone(),
                    },
                );
            }
        }
    }

    /// Schedule an event.
    fn schedule_event(&mut self, node: NodeIndex, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Latency for a message from `from` to `to`, or `None` if it is dropped.
    /// Updates the drop stats.
    fn route(&mut self, from: NodeIndex, to: NodeIndex) -> Option<Duration> {
        match self.network.route(from, to, &mut self.rng) {
            Delivery::After(latency) => Some(latency),
            Delivery::Cut => {
                self.stats.messages_dropped_partition += 1;
                trace!(from = from, to = to, "Message dropped due to partition");
                None
            }
            Delivery::Lost => {
                self.stats.messages_dropped_loss += 1;
                trace!(from = from, to = to, "Message dropped due to packet loss");
                None
            }
        }
    }

    /// Try to deliver a message, accounting for partitions and packet loss.
    fn try_deliver_message(&mut self, from: NodeIndex, to: NodeIndex, event: Event) {
        let Some(latency) = self.route(from, to) else {
            return;
        };
        let delivery_time = self.now + latency;
        self.schedule_event(to, delivery_time, event);
        self.stats.messages_sent += 1;
    }

    fn now_ms(&self) -> u64 {
        self.now.as_millis() as u64
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Fault injection
    // ═══════════════════════════════════════════════════════════════════════

    /// Restart a node: its pools and tally are lost, its frozen chain and
    /// persisted vote survive.
    pub fn restart_node(&mut self, node: NodeIndex) {
        if let Some(sim_node) = self.nodes.get_mut(node as usize) {
            sim_node.restart();
            self.stats.restarts += 1;
            info!(node = node, frozen_edge = sim_node.frozen_edge(), "Restarted node");
        }
    }

    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════

    pub fn node(&self, index: NodeIndex) -> Option<&SimNode> {
        self.nodes.get(index as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Frozen edge height of a node (0 for unknown nodes).
    pub fn frozen_edge(&self, index: NodeIndex) -> u64 {
        self.node(index).map_or(0, SimNode::frozen_edge)
    }

    /// Every frozen (height, hash) of a node, ascending.
    pub fn frozen_hashes(&self, index: NodeIndex) -> Vec<(u64, Hash)> {
        self.node(index)
            .map(|node| node.chain().frozen_hashes())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

impl std::fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("now", &self.now)
            .field("nodes", &self.nodes.len())
            .field("queued_events", &self.event_queue.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// The block every verifier starts from as its frozen edge.
fn genesis_block(producer: VerifierId) -> CandidateBlock {
    let hash = Hash::from_bytes(b"diversity-simulation-genesis");
    CandidateBlock {
        height: 0,
        hash,
        previous_hash: Hash::ZERO,
        verifier: producer,
        verification_timestamp: 0,
        balance_list_hash: test_balance_list_hash(&hash),
        blockchain_version: 1,
        signature_valid: true,
    }
}
