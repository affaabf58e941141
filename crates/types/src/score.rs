//! Chain score ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fitness of a candidate relative to a reference height. Lower is better.
///
/// Two values at the top of the range are reserved to mark a candidate as
/// ineligible for voting; they still order above every real score so
/// "lowest score wins" comparisons never pick them over an eligible block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainScore(pub i64);

impl ChainScore {
    /// Candidate can never be chosen.
    pub const INELIGIBLE: ChainScore = ChainScore(i64::MAX);

    /// Candidate is not eligible yet (e.g. its verifier's standing is still
    /// being established).
    pub const INELIGIBLE_PENDING: ChainScore = ChainScore(i64::MAX - 1);
}

impl fmt::Display for ChainScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::INELIGIBLE => f.write_str("MAX"),
            Self::INELIGIBLE_PENDING => f.write_str("MAX-1"),
            ChainScore(score) => write!(f, "{}", score),
        }
    }
}
