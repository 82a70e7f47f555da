//! Error types for the protocol layer.

/// Errors raised while turning envelopes into bytes or back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// Well-formed bytes that break a protocol rule, e.g. a client
    /// sending a reply or an event.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
