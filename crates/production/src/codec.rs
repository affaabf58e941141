//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [version: u8][payload: bincode-encoded message]
//! ```
//!
//! - Version is currently `1`
//! - Payload is the bincode encoding of the message struct
//!
//! # Type Dispatch
//!
//! The message type travels out of band (the transport's topic or request
//! kind, see [`NetworkMessage::message_type_id`]), not in the payload.
//!
//! Decoded blocks always come back with `signature_valid == false`; the
//! transport sets it after checking the signature.

use diversity_core::Event;
use diversity_types::{BlockVote, MissingBlockRequest, MissingBlockResponse, NetworkMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("Message too short")]
    MessageTooShort,

    #[error("Bincode decode error: {0}")]
    Decode(String),

    #[error("Bincode encode error: {0}")]
    Encode(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

/// Encode a message to wire format.
pub fn encode<T>(message: &T) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + NetworkMessage,
{
    let payload = bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))?;

    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode a message of a known type from wire format.
pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned + NetworkMessage,
{
    let (&version, payload) = bytes.split_first().ok_or(CodecError::MessageTooShort)?;
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    bincode::deserialize(payload).map_err(|e| CodecError::Decode(e.to_string()))
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Vote(BlockVote),
    MissingBlockRequest(MissingBlockRequest),
    MissingBlockResponse(MissingBlockResponse),
}

impl InboundMessage {
    /// The event this message feeds into the state machine, if it is
    /// self-contained.
    ///
    /// Fetch requests are answered by the transport and fetch responses are
    /// routed through the fetch manager, which knows the originating request.
    pub fn into_event(self) -> Option<Event> {
        match self {
            InboundMessage::Vote(vote) => Some(Event::BlockVoteReceived { vote }),
            InboundMessage::MissingBlockRequest(_) | InboundMessage::MissingBlockResponse(_) => {
                None
            }
        }
    }
}

/// Decode a message whose type is given by `type_id`.
pub fn decode_message(type_id: &str, bytes: &[u8]) -> Result<InboundMessage, CodecError> {
    if type_id == BlockVote::message_type_id() {
        decode(bytes).map(InboundMessage::Vote)
    } else if type_id == MissingBlockRequest::message_type_id() {
        decode(bytes).map(InboundMessage::MissingBlockRequest)
    } else if type_id == MissingBlockResponse::message_type_id() {
        decode(bytes).map(InboundMessage::MissingBlockResponse)
    } else {
        Err(CodecError::UnknownType(type_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_types::test_utils::{test_block, test_hash, test_verifier};

    fn sample_vote() -> BlockVote {
        BlockVote {
            height: 12,
            hash: test_hash(12, 1),
            voter: test_verifier(4),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_version_byte_prefixed() {
        let bytes = encode(&sample_vote()).unwrap();
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(decode::<BlockVote>(&bytes).unwrap(), sample_vote());
    }

    #[test]
    fn test_signature_flag_not_carried() {
        let block = test_block(8, 2);
        assert!(block.signature_valid);

        let response = MissingBlockResponse {
            block: Some(block.clone()),
        };
        let decoded: MissingBlockResponse = decode(&encode(&response).unwrap()).unwrap();
        let decoded_block = decoded.block.unwrap();

        assert!(!decoded_block.signature_valid);
        assert_eq!(decoded_block.hash, block.hash);
        assert_eq!(decoded_block.previous_hash, block.previous_hash);
    }

    #[test]
    fn test_rejects_bad_framing() {
        assert!(matches!(
            decode::<BlockVote>(&[]),
            Err(CodecError::MessageTooShort)
        ));

        let mut bytes = encode(&sample_vote()).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode::<BlockVote>(&bytes),
            Err(CodecError::UnknownVersion(9))
        ));

        assert!(matches!(
            decode::<BlockVote>(&[WIRE_VERSION, 1, 2]),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_dispatch_by_type_id() {
        let request = MissingBlockRequest {
            height: 3,
            hash: test_hash(3, 1),
        };
        let bytes = encode(&request).unwrap();

        let decoded = decode_message(MissingBlockRequest::message_type_id(), &bytes).unwrap();
        assert_eq!(decoded, InboundMessage::MissingBlockRequest(request));
        assert!(decoded.into_event().is_none());

        assert!(matches!(
            decode_message("block.unknown", &bytes),
            Err(CodecError::UnknownType(_))
        ));
    }

    #[test]
    fn test_vote_becomes_event() {
        let bytes = encode(&sample_vote()).unwrap();
        let event = decode_message(BlockVote::message_type_id(), &bytes)
            .unwrap()
            .into_event();
        assert_eq!(
            event,
            Some(Event::BlockVoteReceived {
                vote: sample_vote()
            })
        );
    }
}
