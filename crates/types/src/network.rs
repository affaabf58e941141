//! Network message markers.

/// Marker for messages sent between verifiers.
///
/// The type id routes a decoded payload to the right handler; the wire
/// encoding itself belongs to the transport.
pub trait NetworkMessage {
    /// Stable identifier for this message type.
    fn message_type_id() -> &'static str;
}
