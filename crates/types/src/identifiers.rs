//! Verifier identity.

use crate::hash::{compact, decode_32, HexError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A verifier's 32-byte public key.
///
/// Identifies the producer of a candidate block and the caster of a vote.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct VerifierId(pub [u8; 32]);

impl VerifierId {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, accepting the dash-grouped form.
    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        decode_32(input).map(VerifierId)
    }
}

impl fmt::Display for VerifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&compact(&self.0))
    }
}

impl fmt::Debug for VerifierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifierId({})", compact(&self.0))
    }
}

impl FromStr for VerifierId {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VerifierId::from_hex(s)
    }
}
