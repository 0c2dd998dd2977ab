//! Cast v2 wire protocol types for castlink.
//!
//! Covers the length-prefixed protobuf framing used on the receiver TLS
//! channel, the JSON payloads carried on each namespace, and the event
//! records the engine hands to its host.

pub mod constants;
pub mod events;
pub mod media;
pub mod messages;
pub mod wire;

// Re-export primary types for convenience.
pub use constants::Namespace;
pub use events::{CastEvent, EventSink};
pub use wire::CastMessage;

/// Errors from encoding or decoding Cast v2 frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("truncated message: {0}")]
    Truncated(&'static str),

    #[error("invalid varint")]
    InvalidVarint,

    #[error("invalid UTF-8 in field {0}")]
    InvalidUtf8(u32),

    #[error("unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },

    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
}
