//! Codec support
//!
//! Only H.264 is handled. The crate never reconstructs pixels itself; the
//! codec layer parses just enough syntax to drive a hardware decoder.

pub mod h264;

use serde::Serialize;
use std::fmt;

/// Codec carried by a video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CodecId {
    /// H.264/AVC in AVCC (length-prefixed) form
    Avc,
    /// Anything else; carries the container's four-character code
    Other([u8; 4]),
}

impl CodecId {
    pub fn is_avc(&self) -> bool {
        *self == CodecId::Avc
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecId::Avc => write!(f, "avc1"),
            CodecId::Other(fourcc) => write!(f, "{}", String::from_utf8_lossy(fourcc)),
        }
    }
}
