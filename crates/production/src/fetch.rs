//! Fetch manager for retrieving blocks the vote tally references but the
//! unfrozen pool does not hold.
//!
//! # Architecture
//!
//! When peers vote for a hash at frozen edge + 1 that we never received, the
//! state machine emits `Action::FetchMissingBlock`. The
//! [`MissingBlockFetcher`] handles these by:
//!
//! 1. Checking if we already have an in-flight request for that (height, hash)
//! 2. Spawning a task that asks one random peer through the [`PeerTransport`]
//! 3. Delivering the answer back to the runner as `Event::MissingBlockReceived`
//!
//! Failed fetches are not retried here. The state machine re-scans the tally
//! on every consensus tick and asks again while the block is still missing.

use crate::metrics::{self, FetchOutcome};
use diversity_core::Event;
use diversity_types::{BlockVote, MissingBlockRequest, MissingBlockResponse};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Errors reported by a [`PeerTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No peers available")]
    NoPeers,

    #[error("Request timed out")]
    Timeout,

    #[error("Peer error: {0}")]
    Peer(String),

    #[error("Codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

/// Future returned by [`PeerTransport::fetch_from_random_peer`].
pub type FetchFuture =
    Pin<Box<dyn Future<Output = Result<MissingBlockResponse, TransportError>> + Send + 'static>>;

/// The network seam used by the runner.
///
/// Implementations own connection management, signature checks on inbound
/// blocks and the wire encoding (see [`crate::codec`]).
pub trait PeerTransport: Send + Sync {
    /// Send this node's vote to every verifier.
    fn broadcast_vote(&self, vote: &BlockVote) -> Result<(), TransportError>;

    /// Ask one randomly chosen peer for a block.
    fn fetch_from_random_peer(&self, request: MissingBlockRequest) -> FetchFuture;
}

/// Issues missing-block fetches, at most one in flight per (height, hash).
pub struct MissingBlockFetcher {
    transport: Arc<dyn PeerTransport>,
    event_tx: mpsc::Sender<Event>,
    in_flight: Arc<Mutex<HashSet<MissingBlockRequest>>>,
}

impl MissingBlockFetcher {
    /// Create a fetcher that delivers responses on `event_tx`.
    pub fn new(transport: Arc<dyn PeerTransport>, event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            transport,
            event_tx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start a fetch unless one for the same block is already running.
    ///
    /// Returns true if a new fetch was spawned. Must be called from within a
    /// tokio runtime.
    pub fn request(&self, request: MissingBlockRequest) -> bool {
        if !self.in_flight.lock().insert(request) {
            trace!(
                height = request.height,
                block_hash = %request.hash,
                "Fetch already in flight"
            );
            return false;
        }

        debug!(height = request.height, block_hash = %request.hash, "Fetching missing block");

        let fetch = self.transport.fetch_from_random_peer(request);
        let event_tx = self.event_tx.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = fetch.await;

            match result {
                Ok(response) => {
                    let outcome = if response.block.is_some() {
                        FetchOutcome::Found
                    } else {
                        FetchOutcome::Absent
                    };
                    metrics::record_missing_block_fetch(outcome, started.elapsed());
                    trace!(
                        height = request.height,
                        block_hash = %request.hash,
                        outcome = outcome.as_str(),
                        "Missing block fetch finished"
                    );

                    if event_tx
                        .send(Event::MissingBlockReceived { request, response })
                        .await
                        .is_err()
                    {
                        debug!("Runner stopped before fetch response was delivered");
                    }
                }
                Err(e) => {
                    metrics::record_missing_block_fetch(FetchOutcome::Failed, started.elapsed());
                    warn!(
                        height = request.height,
                        block_hash = %request.hash,
                        error = %e,
                        "Missing block fetch failed"
                    );
                }
            }

            in_flight.lock().remove(&request);
        });

        true
    }

    /// Number of fetches currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl std::fmt::Debug for MissingBlockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissingBlockFetcher")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}
