//! Fixed-size digests and hex helpers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a hex-encoded digest or identifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HexError {
    /// Input contained non-hex characters or had odd length.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Input decoded to the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Decode a 32-byte value from hex.
///
/// Dashes are ignored so the grouped form written by older tooling
/// (`0123456789abcdef-0123456789abcdef-...`) parses the same as plain hex.
pub(crate) fn decode_32(input: &str) -> Result<[u8; 32], HexError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '-').collect();
    let bytes = hex::decode(cleaned)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexError::InvalidLength {
            expected: 32,
            actual,
        })
}

/// Short form used in logs: first and last four bytes.
pub(crate) fn compact(bytes: &[u8; 32]) -> String {
    format!("{}..{}", hex::encode(&bytes[..4]), hex::encode(&bytes[28..]))
}

/// 32-byte digest identifying a block or balance list.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero hash. Used by administrative requests to clear an override.
    pub const ZERO: Hash = Hash([0u8; 32]);

    /// Hash arbitrary bytes with BLAKE3.
    pub fn from_bytes(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Wrap an existing 32-byte digest without rehashing.
    pub const fn from_hash_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for [`Hash::ZERO`].
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, accepting the dash-grouped form.
    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        decode_32(input).map(Hash)
    }

    /// Compact form for log lines.
    pub fn short(&self) -> String {
        compact(&self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let hash = Hash::from_bytes(b"block");
        let parsed = Hash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_dashed_hex_accepted() {
        let hash = Hash::from_bytes(b"dashed");
        let hex = hash.to_hex();
        let dashed = format!("{}-{}-{}-{}", &hex[..16], &hex[16..32], &hex[32..48], &hex[48..]);
        assert_eq!(dashed.parse::<Hash>().unwrap(), hash);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = Hash::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            HexError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert!(matches!(
            Hash::from_hex("zz").unwrap_err(),
            HexError::InvalidHex(_)
        ));
    }

    #[test]
    fn test_zero_hash() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::from_bytes(b"x").is_zero());
    }

    #[test]
    fn test_display_is_compact() {
        let hash = Hash::from_hash_bytes([0xab; 32]);
        assert_eq!(hash.to_string(), "abababab..abababab");
    }
}
