//! Converting events to and from frame bytes.
//!
//! The server only talks JSON today, but the handler is written against
//! [`Codec`] so a binary format can be slotted in without touching it.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// [`ProtocolError::Encode`] if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// [`ProtocolError::Decode`] if the bytes are malformed or don't match
    /// the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`. Output is always valid UTF-8, so the
/// transport sends it as text frames.
///
/// ```rust
/// use bingohall_protocol::{Codec, JsonCodec, ServerEvent, RoundStatus};
///
/// let codec = JsonCodec;
/// let event = ServerEvent::GameStatusChange { status: RoundStatus::Started };
/// let bytes = codec.encode(&event).unwrap();
/// assert_eq!(bytes, br#"{"event":"game_status_change","data":{"status":"started"}}"#);
/// let back: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(back, event);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
