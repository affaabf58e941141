//! Restart tests for the production runner.
//!
//! A verifier that crashes after broadcasting a vote must come back voting for
//! the same block, even if a different candidate now looks better.

use diversity_core::{ChainView, Event};
use diversity_freeze::test_utils::{ManualClock, TestBalanceLists, TestChain, TestScorer};
use diversity_freeze::FreezeConfig;
use diversity_production::{
    DriverConfig, FetchFuture, FileVoteStorage, FreezeRunner, PeerTransport, TransportError,
};
use diversity_types::test_utils::{test_block, test_child, test_verifier};
use diversity_types::{BlockVote, CandidateBlock, MissingBlockRequest, MissingBlockResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const LOCAL: u8 = 200;

#[derive(Default)]
struct RecordingTransport {
    votes: Mutex<Vec<BlockVote>>,
}

impl PeerTransport for RecordingTransport {
    fn broadcast_vote(&self, vote: &BlockVote) -> Result<(), TransportError> {
        self.votes.lock().push(vote.clone());
        Ok(())
    }

    fn fetch_from_random_peer(&self, _request: MissingBlockRequest) -> FetchFuture {
        Box::pin(async { Ok(MissingBlockResponse { block: None }) })
    }
}

struct Node {
    runner: FreezeRunner,
    transport: Arc<RecordingTransport>,
    scorer: Arc<TestScorer>,
}

fn start_node(data_dir: &TempDir, chain: Arc<TestChain>, clock: Arc<ManualClock>) -> Node {
    let transport = Arc::new(RecordingTransport::default());
    let scorer = Arc::new(TestScorer::new());
    let runner = FreezeRunner::builder()
        .freeze_config(FreezeConfig::for_verifier(test_verifier(LOCAL)))
        .driver_config(DriverConfig {
            tick_interval_ms: 100,
            event_channel_capacity: 64,
        })
        .chain(chain)
        .balance_lists(Arc::new(TestBalanceLists::new()))
        .scorer(scorer.clone())
        .storage(Arc::new(FileVoteStorage::in_dir(data_dir.path())))
        .clock(clock)
        .transport(transport.clone())
        .build()
        .unwrap();
    Node {
        runner,
        transport,
        scorer,
    }
}

async fn offer(runner: &FreezeRunner, blocks: &[&CandidateBlock]) {
    let tx = runner.event_sender();
    for block in blocks {
        tx.send(Event::BlockReceived {
            block: (*block).clone(),
        })
        .await
        .unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_vote_survives_restart() {
    let data_dir = TempDir::new().unwrap();
    let edge = test_block(10, 0);
    let chain = Arc::new(TestChain::new(
        test_verifier(LOCAL),
        edge.clone(),
        [1, 2, 3, 4, LOCAL].map(test_verifier),
    ));
    let clock = Arc::new(ManualClock::new(edge.verification_timestamp + 60_000));

    let first = test_child(&edge, 1);
    let better = test_child(&edge, 2);

    // First run: only `first` is known, so the node votes for it.
    let Node {
        mut runner,
        transport,
        ..
    } = start_node(&data_dir, chain.clone(), clock.clone());
    offer(&runner, &[&first]).await;
    let shutdown = runner.shutdown_handle().unwrap();
    let handle = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_millis(250)).await;
    shutdown.shutdown();
    handle.await.unwrap().unwrap();

    assert_eq!(transport.votes.lock().len(), 1);
    assert_eq!(transport.votes.lock()[0].hash, first.hash);
    assert!(data_dir.path().join("consensus_vote").exists());

    // Second run: `better` now scores lower, but the stored vote is kept.
    clock.advance(10_000);
    let Node {
        mut runner,
        transport,
        scorer,
    } = start_node(&data_dir, chain.clone(), clock.clone());
    scorer.set_score(first.hash, 50);
    scorer.set_score(better.hash, 1);
    assert_eq!(runner.state().current_vote().map(|v| v.hash), Some(first.hash));

    offer(&runner, &[&first, &better]).await;
    let shutdown = runner.shutdown_handle().unwrap();
    let handle = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_millis(250)).await;
    shutdown.shutdown();
    handle.await.unwrap().unwrap();

    let votes = transport.votes.lock().clone();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].hash, first.hash);
    assert_eq!(chain.frozen_edge_height(), 10);
}
