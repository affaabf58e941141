//! Crash recovery tests.
//!
//! A verifier cut off from the cycle catches up through chain recovery once
//! the network heals, and a restarted verifier keeps the vote it persisted.

use diversity_simulation::{NetworkConfig, SimulationRunner};
use std::time::Duration;
use tracing_test::traced_test;

fn network() -> NetworkConfig {
    NetworkConfig {
        num_verifiers: 5,
        latency: Duration::from_millis(100),
        jitter_fraction: 0.2,
        packet_loss_rate: 0.0,
    }
}

fn assert_chains_agree(runner: &SimulationRunner) {
    let reference = runner.frozen_hashes(1);
    for index in 0..runner.node_count() as u32 {
        let chain = runner.frozen_hashes(index);
        let common = reference.len().min(chain.len());
        assert_eq!(
            reference[..common],
            chain[..common],
            "node {index} diverged from node 1"
        );
    }
}

#[traced_test]
#[test]
fn test_isolated_node_catches_up_after_heal() {
    let mut runner = SimulationRunner::new(network(), 42);
    runner.initialize();
    runner.run_until(Duration::from_secs(20));

    let isolated_edge = runner.frozen_edge(0);
    let peer_edge = runner.frozen_edge(1);
    runner.network_mut().isolate(0);
    runner.run_until(Duration::from_secs(50));

    // Alone, node 0 stalls; the other four keep freezing.
    assert!(runner.frozen_edge(0) <= isolated_edge + 1);
    let peer_edge_at_heal = runner.frozen_edge(1);
    assert!(peer_edge_at_heal >= peer_edge + 3);

    runner.network_mut().heal();
    runner.run_until(Duration::from_secs(120));

    assert!(
        runner.frozen_edge(0) >= peer_edge_at_heal,
        "node 0 at {} never caught up to {}",
        runner.frozen_edge(0),
        peer_edge_at_heal
    );
    assert!(runner.stats().blocks_synced > 0);
    assert!(runner.node(0).unwrap().state().stats().chain_recoveries > 0);
    assert_chains_agree(&runner);
}

#[test]
fn test_restart_keeps_persisted_vote() {
    let mut runner = SimulationRunner::new(network(), 8);
    runner.initialize();
    runner.run_until(Duration::from_secs(30));

    let stored = runner
        .node(2)
        .unwrap()
        .storage()
        .stored()
        .expect("node voted before restart");

    runner.restart_node(2);

    let restored = runner.node(2).unwrap().state().current_vote().unwrap();
    assert_eq!(restored.height, stored.height);
    assert_eq!(restored.hash, stored.hash);
    assert_eq!(restored.timestamp, 0);
    assert!(runner.node(2).unwrap().state().all_unfrozen_blocks().is_empty());
    assert_eq!(runner.stats().restarts, 1);
}

#[test]
fn test_restarted_node_keeps_freezing() {
    let mut runner = SimulationRunner::new(network(), 8);
    runner.initialize();
    runner.run_until(Duration::from_secs(30));

    let edge_at_restart = runner.frozen_edge(2);
    runner.restart_node(2);
    runner.run_until(Duration::from_secs(90));

    assert!(runner.frozen_edge(2) > edge_at_restart + 3);
    assert_chains_agree(&runner);
}
