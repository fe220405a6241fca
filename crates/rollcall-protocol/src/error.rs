//! Error types for the protocol layer.
//!
//! Each crate in Rollcall defines its own error enum. A `ProtocolError`
//! always means the problem is in turning frames into events (or back),
//! never in networking or session state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a frame without an `event` field,
    /// or truncated messages.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame names a known event but its `data` does not fit.
    ///
    /// The first field is the event tag, the second the parser's complaint.
    #[error("invalid payload for {0}: {1}")]
    InvalidPayload(&'static str, String),
}
