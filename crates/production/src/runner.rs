//! Production runner implementation.

use crate::config::{ConfigError, DriverConfig, NodeConfig};
use crate::fetch::{MissingBlockFetcher, PeerTransport};
use crate::metrics;
use crate::vote_file::FileVoteStorage;
use diversity_core::{
    Action, BalanceListProvider, BlockScorer, ChainView, Clock, Event, SystemClock, VoteStorage,
    VoteTally,
};
use diversity_freeze::{BlockVoteTally, FreezeCollaborators, FreezeConfig, FreezeState, FreezeStats};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{span, Level};

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Handle for shutting down a running [`FreezeRunner`].
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Builder for constructing a [`FreezeRunner`].
///
/// Required fields:
/// - `chain` - Frozen chain and cycle membership
/// - `balance_lists` - Balance-list computation for admission
/// - `scorer` - Chain scores and minimum vote timestamps
/// - `storage` - Durable current vote
/// - `transport` - Vote broadcast and missing-block fetch
///
/// Optional fields:
/// - `freeze_config` - Defaults to [`FreezeConfig::default`]
/// - `driver_config` - Defaults to [`DriverConfig::default`]
/// - `tally` - Defaults to an empty [`BlockVoteTally`]
/// - `clock` - Defaults to [`SystemClock`]
/// - `metrics_enabled` - Defaults to false
///
/// [`FreezeRunnerBuilder::node_config`] fills the configs, the vote file and
/// the metrics switch from a loaded [`NodeConfig`].
#[derive(Default)]
pub struct FreezeRunnerBuilder {
    freeze_config: Option<FreezeConfig>,
    driver_config: Option<DriverConfig>,
    chain: Option<Arc<dyn ChainView>>,
    balance_lists: Option<Arc<dyn BalanceListProvider>>,
    scorer: Option<Arc<dyn BlockScorer>>,
    tally: Option<Arc<dyn VoteTally>>,
    storage: Option<Arc<dyn VoteStorage>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn PeerTransport>>,
    metrics_enabled: bool,
}

impl FreezeRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a node config: freeze and driver settings, the vote file under
    /// `node.data_dir` and the metrics switch.
    pub fn node_config(mut self, config: &NodeConfig) -> Result<Self, ConfigError> {
        self.freeze_config = Some(config.freeze_config()?);
        self.driver_config = Some(config.driver.clone());
        self.storage = Some(Arc::new(FileVoteStorage::in_dir(&config.node.data_dir)));
        self.metrics_enabled = config.metrics.enabled;
        Ok(self)
    }

    pub fn freeze_config(mut self, config: FreezeConfig) -> Self {
        self.freeze_config = Some(config);
        self
    }

    pub fn driver_config(mut self, config: DriverConfig) -> Self {
        self.driver_config = Some(config);
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainView>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn balance_lists(mut self, balance_lists: Arc<dyn BalanceListProvider>) -> Self {
        self.balance_lists = Some(balance_lists);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn BlockScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn tally(mut self, tally: Arc<dyn VoteTally>) -> Self {
        self.tally = Some(tally);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn VoteStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Build the runner. Loads the stored vote and registers metrics if
    /// enabled.
    pub fn build(self) -> Result<FreezeRunner, RunnerError> {
        let chain = self.chain.ok_or(RunnerError::MissingField("chain"))?;
        let balance_lists = self
            .balance_lists
            .ok_or(RunnerError::MissingField("balance_lists"))?;
        let scorer = self.scorer.ok_or(RunnerError::MissingField("scorer"))?;
        let storage = self.storage.ok_or(RunnerError::MissingField("storage"))?;
        let transport = self
            .transport
            .ok_or(RunnerError::MissingField("transport"))?;
        let tally = self
            .tally
            .unwrap_or_else(|| Arc::new(BlockVoteTally::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let driver = self.driver_config.unwrap_or_default();

        if self.metrics_enabled {
            metrics::init()?;
        }

        let state = FreezeState::new(
            self.freeze_config.unwrap_or_default(),
            FreezeCollaborators {
                chain: chain.clone(),
                balance_lists,
                scorer,
                tally,
                storage,
                clock,
            },
        );

        let (event_tx, event_rx) = mpsc::channel(driver.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let fetcher = MissingBlockFetcher::new(transport.clone(), event_tx.clone());

        Ok(FreezeRunner {
            state,
            chain,
            transport,
            fetcher,
            driver,
            event_tx,
            event_rx,
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx,
            last_stats: FreezeStats::default(),
        })
    }
}

/// Drives a [`FreezeState`] from a tokio task.
///
/// Uses the event aggregator pattern: the runner owns the state machine and
/// is the only caller of its freezing operations. Inbound blocks, votes,
/// fetch responses and operator commands arrive over one mpsc channel; a
/// tokio interval produces `Event::ConsensusTimer`.
pub struct FreezeRunner {
    state: FreezeState,
    chain: Arc<dyn ChainView>,
    transport: Arc<dyn PeerTransport>,
    fetcher: MissingBlockFetcher,
    driver: DriverConfig,
    event_tx: mpsc::Sender<Event>,
    event_rx: mpsc::Receiver<Event>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: oneshot::Receiver<()>,
    last_stats: FreezeStats,
}

impl FreezeRunner {
    pub fn builder() -> FreezeRunnerBuilder {
        FreezeRunnerBuilder::new()
    }

    /// Sender for feeding events into the runner.
    pub fn event_sender(&self) -> mpsc::Sender<Event> {
        self.event_tx.clone()
    }

    /// Take the shutdown handle. Returns `None` after the first call.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    /// The state machine, for inspection before the runner starts.
    pub fn state(&self) -> &FreezeState {
        &self.state
    }

    /// Run until the shutdown handle fires or is dropped.
    ///
    /// # Priority Handling
    ///
    /// Uses a `biased` select: shutdown first, then the consensus tick, then
    /// inbound events. A flood of network events therefore cannot starve the
    /// tick that drives voting and freezing.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        tracing::info!(
            frozen_edge = self.chain.frozen_edge_height(),
            tick_interval_ms = self.driver.tick_interval_ms,
            local = %self.state.config().local_identifier,
            "Starting freeze runner"
        );

        let mut tick = tokio::time::interval(self.driver.tick_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                _ = tick.tick() => {
                    self.dispatch_event(Event::ConsensusTimer);
                }

                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.dispatch_event(event),
                        None => {
                            tracing::info!("Event channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(
            frozen_edge = self.chain.frozen_edge_height(),
            stats = ?self.state.stats(),
            "Freeze runner stopped"
        );
        Ok(())
    }

    fn dispatch_event(&mut self, event: Event) {
        let event_type = event.type_name();
        let event_span = span!(
            Level::DEBUG,
            "handle_event",
            event.type = %event_type,
            priority = ?event.priority(),
        );
        let _event_guard = event_span.enter();

        let is_tick = matches!(event, Event::ConsensusTimer);
        let started = Instant::now();

        let actions = self.state.handle(&event);
        for action in actions {
            self.process_action(action);
        }

        if is_tick {
            metrics::record_consensus_tick(started.elapsed());
            self.update_metrics();
        }
    }

    fn process_action(&self, action: Action) {
        match action {
            Action::BroadcastVote { vote } => {
                if let Err(e) = self.transport.broadcast_vote(&vote) {
                    tracing::warn!(
                        height = vote.height,
                        block_hash = %vote.hash,
                        error = %e,
                        "Failed to broadcast vote"
                    );
                }
            }
            Action::FetchMissingBlock { request } => {
                self.fetcher.request(request);
            }
        }
    }

    fn update_metrics(&mut self) {
        let stats = self.state.stats();
        metrics::record_stats(&self.last_stats, &stats);
        self.last_stats = stats;

        metrics::set_frozen_edge(self.chain.frozen_edge_height());
        metrics::set_pool_sizes(
            self.state.all_unfrozen_blocks().len(),
            self.state.number_of_disconnected_blocks(),
        );
    }
}

impl std::fmt::Debug for FreezeRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreezeRunner")
            .field("state", &self.state)
            .field("fetcher", &self.fetcher)
            .field("driver", &self.driver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_transport::MemoryTransport;
    use diversity_freeze::test_utils::{
        ManualClock, MemoryVoteStorage, TestBalanceLists, TestChain, TestScorer,
    };
    use diversity_types::test_utils::{test_block, test_child, test_verifier};
    use diversity_types::{BlockVote, CandidateBlock};
    use std::time::Duration;

    const LOCAL: u8 = 200;

    struct Fixture {
        runner: FreezeRunner,
        chain: Arc<TestChain>,
        transport: Arc<MemoryTransport>,
        edge: CandidateBlock,
    }

    fn fixture(storage: Arc<dyn VoteStorage>) -> Fixture {
        let edge = test_block(10, 0);
        let chain = Arc::new(TestChain::new(
            test_verifier(LOCAL),
            edge.clone(),
            [1, 2, 3, 4, LOCAL].map(test_verifier),
        ));
        let transport = Arc::new(MemoryTransport::default());
        let clock = Arc::new(ManualClock::new(edge.verification_timestamp + 60_000));

        let runner = FreezeRunner::builder()
            .freeze_config(FreezeConfig::for_verifier(test_verifier(LOCAL)))
            .driver_config(DriverConfig {
                tick_interval_ms: 100,
                event_channel_capacity: 64,
            })
            .chain(chain.clone())
            .balance_lists(Arc::new(TestBalanceLists::new()))
            .scorer(Arc::new(TestScorer::new()))
            .storage(storage)
            .clock(clock)
            .transport(transport.clone())
            .build()
            .unwrap();

        Fixture {
            runner,
            chain,
            transport,
            edge,
        }
    }

    async fn send_votes(tx: &mpsc::Sender<Event>, block: &CandidateBlock) {
        for voter in 1..=4 {
            tx.send(Event::BlockVoteReceived {
                vote: BlockVote {
                    height: block.height,
                    hash: block.hash,
                    voter: test_verifier(voter),
                    timestamp: 1,
                },
            })
            .await
            .unwrap();
        }
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = FreezeRunner::builder().build().unwrap_err();
        assert!(matches!(err, RunnerError::MissingField("chain")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_votes_and_freezes_on_tick() {
        let storage = Arc::new(MemoryVoteStorage::new());
        let Fixture {
            mut runner,
            chain,
            transport,
            edge,
        } = fixture(storage.clone());
        let tx = runner.event_sender();
        let shutdown = runner.shutdown_handle().unwrap();
        let handle = tokio::spawn(runner.run());

        let block = test_child(&edge, 1);
        tx.send(Event::BlockReceived {
            block: block.clone(),
        })
        .await
        .unwrap();
        send_votes(&tx, &block).await;

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(chain.frozen_edge_height(), 11);
        assert_eq!(chain.frozen_block(11), Some(block.clone()));
        assert_eq!(transport.broadcast_heights(), vec![11]);
        assert_eq!(storage.stored().map(|vote| vote.hash), Some(block.hash));

        shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_missing_block_then_freezes() {
        let Fixture {
            mut runner,
            chain,
            transport,
            edge,
        } = fixture(Arc::new(MemoryVoteStorage::new()));
        let block = test_child(&edge, 2);
        transport.serve(block.clone());

        let tx = runner.event_sender();
        let shutdown = runner.shutdown_handle().unwrap();
        let handle = tokio::spawn(runner.run());

        // Votes only: the block itself has to come from a peer.
        send_votes(&tx, &block).await;

        for _ in 0..20 {
            if chain.frozen_edge_height() == 11 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(chain.frozen_block(11), Some(block));
        assert!(
            transport
                .fetches
                .load(std::sync::atomic::Ordering::SeqCst)
                >= 1
        );

        drop(shutdown);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_operator_overrides_reach_state() {
        let Fixture {
            mut runner,
            chain,
            transport,
            edge,
        } = fixture(Arc::new(MemoryVoteStorage::new()));
        let tx = runner.event_sender();
        let shutdown = runner.shutdown_handle().unwrap();

        let preferred = test_child(&edge, 3);
        let other = test_child(&edge, 1);
        let handle = tokio::spawn(runner.run());

        tx.send(Event::BlockReceived {
            block: other.clone(),
        })
        .await
        .unwrap();
        tx.send(Event::BlockReceived {
            block: preferred.clone(),
        })
        .await
        .unwrap();
        tx.send(Event::HashOverrideRequested {
            height: 11,
            hash: preferred.hash,
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        let votes = transport.votes.lock().clone();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].hash, preferred.hash);
        assert_eq!(chain.frozen_edge_height(), 10);

        shutdown.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_node_config_wires_vote_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let text = format!(
            "[node]\ndata_dir = {:?}\nidentifier = \"{}\"\n\n[metrics]\nenabled = false\n",
            dir.path(),
            test_verifier(LOCAL).to_hex()
        );
        let config = NodeConfig::from_toml_str(&text).unwrap();

        let edge = test_block(10, 0);
        let chain = Arc::new(TestChain::new(
            test_verifier(LOCAL),
            edge,
            [1, 2, 3, 4, LOCAL].map(test_verifier),
        ));
        let runner = FreezeRunner::builder()
            .node_config(&config)
            .unwrap()
            .chain(chain)
            .balance_lists(Arc::new(TestBalanceLists::new()))
            .scorer(Arc::new(TestScorer::new()))
            .transport(Arc::new(MemoryTransport::default()))
            .build()
            .unwrap();

        assert_eq!(runner.state().config().local_identifier, test_verifier(LOCAL));
        assert_eq!(runner.state().current_vote(), None);
    }
}
