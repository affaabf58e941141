//! Production runner with async I/O.
//!
//! This crate wraps the freezing state machine with the pieces a running
//! verifier needs:
//!
//! - Events via a tokio mpsc channel
//! - The consensus tick via a tokio interval
//! - Missing-block fetches as spawned tokio tasks
//! - The current vote persisted to a small file
//! - Prometheus metrics and `tracing-subscriber` logging
//!
//! # Architecture
//!
//! Uses the event aggregator pattern: a single task owns the state machine
//! and receives events via an mpsc channel. Freezing is therefore never
//! attempted from two places at once.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Verifier Node                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────────┐│
//! │  │  FreezeRunner                                                       ││
//! │  │    └─ loop { event = recv() | tick; actions = state.handle(event); }││
//! │  └─────────────────────────────────────────────────────────────────────┘│
//! │             ▲                    │                       │              │
//! │             │ events             ▼ BroadcastVote         ▼ fetch        │
//! │  ┌──────────┴─────────┐   ┌──────────────┐   ┌─────────────────────┐    │
//! │  │ transport / admin  │   │ PeerTransport│◄──│ MissingBlockFetcher │    │
//! │  └────────────────────┘   └──────────────┘   └─────────────────────┘    │
//! │                                                                         │
//! │  FileVoteStorage (current vote)      metrics (Prometheus registry)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Configuration
//!
//! ```no_run
//! use diversity_production::{init_logging, FreezeRunner, NodeConfig};
//! # use std::sync::Arc;
//! # async fn example(
//! #     chain: Arc<dyn diversity_core::ChainView>,
//! #     balance_lists: Arc<dyn diversity_core::BalanceListProvider>,
//! #     scorer: Arc<dyn diversity_core::BlockScorer>,
//! #     transport: Arc<dyn diversity_production::PeerTransport>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig::load("node.toml")?;
//! init_logging(config.logging.filter.as_deref())?;
//!
//! let mut runner = FreezeRunner::builder()
//!     .node_config(&config)?
//!     .chain(chain)
//!     .balance_lists(balance_lists)
//!     .scorer(scorer)
//!     .transport(transport)
//!     .build()?;
//!
//! let events = runner.event_sender();
//! let shutdown = runner.shutdown_handle();
//! runner.run().await?;
//! # drop((events, shutdown));
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod config;
mod fetch;
pub mod metrics;
mod runner;
pub mod telemetry;
mod vote_file;

pub use codec::{decode, decode_message, encode, CodecError, InboundMessage, WIRE_VERSION};
pub use config::{
    ConfigError, DriverConfig, LoggingConfig, MetricsConfig, NodeConfig, NodeSection,
};
pub use fetch::{FetchFuture, MissingBlockFetcher, PeerTransport, TransportError};
pub use runner::{FreezeRunner, FreezeRunnerBuilder, RunnerError, ShutdownHandle};
pub use telemetry::{init_logging, TelemetryError};
pub use vote_file::{format_record, parse_record, FileVoteStorage, VOTE_FILE_NAME};
