//! Production metrics using native Prometheus client.
//!
//! Metrics are domain-specific rather than generic event counters.
//! Use traces for event-level granularity during investigations.
//!
//! Nothing is recorded until [`init`] has registered the metrics, so a node
//! with metrics disabled pays only for the `OnceLock` lookups.

use diversity_freeze::FreezeStats;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

static METRICS: OnceLock<Metrics> = OnceLock::new();
static INIT_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Domain-specific metrics for production monitoring.
pub struct Metrics {
    // === Freezing ===
    pub blocks_frozen: Counter,
    pub frozen_edge: Gauge,
    pub chain_recoveries: Counter,
    pub consensus_tick_duration: Histogram,

    // === Voting ===
    pub votes_cast: Counter,

    // === Candidates ===
    pub candidates_registered: Counter,
    pub candidates_rejected: Counter,
    pub candidates_evicted: Counter,
    pub unfrozen_pool_size: Gauge,
    pub disconnected_pool_size: Gauge,

    // === Fetch ===
    pub missing_block_fetches: CounterVec,
    pub missing_block_fetch_latency: Histogram,
}

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        // Latency buckets: 1ms to 30s
        let latency_buckets = vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ];

        Ok(Self {
            // Freezing
            blocks_frozen: register_counter!(
                "diversity_blocks_frozen_total",
                "Total number of blocks frozen"
            )?,

            frozen_edge: register_gauge!(
                "diversity_frozen_edge_height",
                "Height of the frozen edge"
            )?,

            chain_recoveries: register_counter!(
                "diversity_chain_recoveries_total",
                "Number of times chain recovery froze blocks"
            )?,

            consensus_tick_duration: register_histogram!(
                "diversity_consensus_tick_seconds",
                "Time spent in one consensus tick",
                latency_buckets.clone()
            )?,

            // Voting
            votes_cast: register_counter!(
                "diversity_votes_cast_total",
                "Total number of votes cast by this node"
            )?,

            // Candidates
            candidates_registered: register_counter!(
                "diversity_candidates_registered_total",
                "Candidate blocks admitted to the unfrozen pool"
            )?,

            candidates_rejected: register_counter!(
                "diversity_candidates_rejected_total",
                "Candidate blocks rejected at admission"
            )?,

            candidates_evicted: register_counter!(
                "diversity_candidates_evicted_total",
                "Candidate blocks evicted from a full height"
            )?,

            unfrozen_pool_size: register_gauge!(
                "diversity_unfrozen_pool_size",
                "Number of candidate blocks in the unfrozen pool"
            )?,

            disconnected_pool_size: register_gauge!(
                "diversity_disconnected_pool_size",
                "Number of blocks waiting for their predecessor"
            )?,

            // Fetch
            missing_block_fetches: register_counter_vec!(
                "diversity_missing_block_fetches_total",
                "Missing block fetches by outcome",
                &["outcome"]
            )?,

            missing_block_fetch_latency: register_histogram!(
                "diversity_missing_block_fetch_latency_seconds",
                "Round-trip time of missing block fetches",
                latency_buckets
            )?,
        })
    }
}

/// Register all metrics with the default Prometheus registry.
///
/// Idempotent: later calls return the already-registered set.
pub fn init() -> Result<&'static Metrics, prometheus::Error> {
    let _guard = INIT_LOCK.lock();
    if let Some(metrics) = METRICS.get() {
        return Ok(metrics);
    }
    let metrics = Metrics::new()?;
    Ok(METRICS.get_or_init(|| metrics))
}

/// Get the registered metrics, if [`init`] has run.
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Encode everything in the default registry in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════
// Convenience functions for common operations
// ═══════════════════════════════════════════════════════════════════════════

/// Fold the difference between two stats snapshots into the counters.
pub fn record_stats(previous: &FreezeStats, current: &FreezeStats) {
    let Some(m) = metrics() else { return };

    let delta = |before: u64, after: u64| after.saturating_sub(before) as f64;

    m.blocks_frozen
        .inc_by(delta(previous.blocks_frozen, current.blocks_frozen));
    m.chain_recoveries
        .inc_by(delta(previous.chain_recoveries, current.chain_recoveries));
    m.votes_cast
        .inc_by(delta(previous.votes_cast, current.votes_cast));
    m.candidates_registered
        .inc_by(delta(previous.blocks_registered, current.blocks_registered));
    m.candidates_rejected
        .inc_by(delta(previous.blocks_rejected, current.blocks_rejected));
    m.candidates_evicted
        .inc_by(delta(previous.evictions, current.evictions));
}

/// Set the frozen edge height.
pub fn set_frozen_edge(height: u64) {
    if let Some(m) = metrics() {
        m.frozen_edge.set(height as f64);
    }
}

/// Set the pool sizes.
pub fn set_pool_sizes(unfrozen: usize, disconnected: usize) {
    if let Some(m) = metrics() {
        m.unfrozen_pool_size.set(unfrozen as f64);
        m.disconnected_pool_size.set(disconnected as f64);
    }
}

/// Record how long one consensus tick took.
pub fn record_consensus_tick(duration: Duration) {
    if let Some(m) = metrics() {
        m.consensus_tick_duration.observe(duration.as_secs_f64());
    }
}

/// Outcome of a missing block fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The peer returned the block.
    Found,
    /// The peer answered but did not have the block.
    Absent,
    /// The transport failed.
    Failed,
}

impl FetchOutcome {
    /// Label value for the `outcome` dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOutcome::Found => "found",
            FetchOutcome::Absent => "absent",
            FetchOutcome::Failed => "failed",
        }
    }
}

/// Record a finished missing block fetch.
pub fn record_missing_block_fetch(outcome: FetchOutcome, latency: Duration) {
    if let Some(m) = metrics() {
        m.missing_block_fetches
            .with_label_values(&[outcome.as_str()])
            .inc();
        m.missing_block_fetch_latency
            .observe(latency.as_secs_f64());
    }
}
