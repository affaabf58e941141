//! Freeze vote-count thresholds.

use crate::FreezeConfig;

/// Number of verifiers whose votes count toward freezing.
///
/// During the Genesis cycle the cycle is still forming, so the size of the
/// voting mesh stands in for it.
pub fn voting_pool_size(in_genesis_cycle: bool, genesis_mesh_size: usize, cycle_length: usize) -> usize {
    if in_genesis_cycle {
        genesis_mesh_size
    } else {
        cycle_length
    }
}

/// Default threshold: three quarters of the pool. Votes must strictly exceed it.
pub fn base_threshold(voting_pool: usize) -> usize {
    voting_pool * 3 / 4
}

/// Threshold used by chain recovery. Never relaxed and never overridden.
pub fn recovery_threshold(voting_pool: usize) -> usize {
    base_threshold(voting_pool)
}

/// Inputs for the standard freeze threshold at one height.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdInputs {
    pub voting_pool: usize,
    pub cycle_length: usize,
    pub in_genesis_cycle: bool,
    /// Time since the leading candidate was verified. `None` if the leading
    /// candidate is not held locally.
    pub elapsed_since_verification_ms: Option<u64>,
    /// Operator override, in percent of the voting pool.
    pub override_percent: Option<u8>,
}

/// Vote count the leading hash must strictly exceed to freeze.
///
/// Outside Genesis the threshold drops by one vote per relaxation step since
/// the leading block was verified, by at most a quarter of the cycle, and
/// never below a simple majority of the cycle. An override replaces the
/// whole computation.
pub fn freeze_threshold(inputs: &ThresholdInputs, config: &FreezeConfig) -> usize {
    if let Some(percent) = inputs.override_percent {
        return inputs.voting_pool * usize::from(percent) / 100;
    }

    let mut threshold = base_threshold(inputs.voting_pool);
    if !inputs.in_genesis_cycle {
        if let Some(elapsed) = inputs.elapsed_since_verification_ms {
            let steps = elapsed
                .checked_div(config.threshold_relaxation_step_ms)
                .unwrap_or(u64::MAX);
            let max_reduction = inputs.cycle_length / 4;
            let reduction = usize::try_from(steps).map_or(max_reduction, |s| s.min(max_reduction));
            threshold = threshold
                .saturating_sub(reduction)
                .max((inputs.cycle_length + 1) / 2);
        }
    }
    threshold
}
