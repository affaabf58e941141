//! Deterministic simulation of a cycle of verifiers running the freezing core.
//!
//! Every verifier owns a [`FreezeState`](diversity_freeze::FreezeState) with
//! its own chain, vote storage and clock. The runner delivers events from a
//! single ordered queue, so a given seed always produces the same run:
//! the same votes, the same frozen chain, the same stats.
//!
//! # What the runner provides
//!
//! - Consensus ticks for every verifier on a fixed interval
//! - Block production by a rotating producer (plus one backup per height)
//! - Vote broadcast and missing-block fetches over a [`SimulatedNetwork`]
//!   with latency, packet loss and partitions
//! - Catch-up for lagging verifiers: a vote from ahead of the frozen edge
//!   delivers the voter's chain so recovery can freeze through it
//! - Restarting a verifier from its persisted vote
//!
//! ```no_run
//! use diversity_simulation::{NetworkConfig, SimulationRunner};
//! use std::time::Duration;
//!
//! let mut runner = SimulationRunner::new(NetworkConfig::default(), 42);
//! runner.initialize();
//! runner.run_until(Duration::from_secs(60));
//! assert!(runner.frozen_edge(0) > 0);
//! ```

mod event_queue;
mod network;
mod node;
mod runner;

pub use event_queue::EventKey;
pub use network::{Delivery, NetworkConfig, SimulatedNetwork};
pub use node::{SimNode, SimScorer};
pub use runner::{SimulationConfig, SimulationRunner, SimulationStats};

/// Index of a verifier within the simulation.
pub type NodeIndex = u32;
