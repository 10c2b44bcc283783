//! Error types shared across the WSSB crates.

use thiserror::Error;

/// A frame that could not be decoded into packets.
///
/// Answered with a `WSSB_BAD_PACKET` response; the connection stays open.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame body is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The frame decoded to something other than an object or array of objects.
    #[error("frame must decode to a JSON object or an array of objects")]
    NotAPacket,
}
