//! Error types for avcplay

use thiserror::Error;

/// Result type alias for avcplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for avcplay
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container could not be read or is structurally invalid
    #[error("Format error: {0}")]
    Format(String),

    /// Malformed H.264 syntax (SPS, PPS, slice header, NAL framing)
    #[error("Codec error: {0}")]
    Codec(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Container and elementary stream disagree on picture size
    #[error("Dimension mismatch: container reports {container:?}, stream decodes to {stream:?}")]
    DimensionMismatch {
        container: (u32, u32),
        stream: (u32, u32),
    },

    /// Requested resources exceed what the accelerator can provide
    #[error("Capability error: {0}")]
    Capability(String),

    /// A fixed-capacity buffer would be overrun
    #[error("Overflow: need {need}, have {have}")]
    Overflow { need: usize, have: usize },

    /// The decode accelerator reported a failure
    #[error("Accelerator error: {0}")]
    Accelerator(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// End of stream
    #[error("End of stream")]
    EndOfStream,
}

/// Coarse classification used to decide how a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal at startup, aborts initialization
    Load,
    /// Logged, playback continues degraded
    Capability,
    /// Fixed-capacity invariant violated at runtime
    Overflow,
    /// The accelerator failed a call
    Accelerator,
    /// Programming or state errors
    Internal,
}

impl Error {
    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create a codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an accelerator error
    pub fn accelerator<S: Into<String>>(msg: S) -> Self {
        Error::Accelerator(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Map this error onto the load / capability / overflow / accelerator taxonomy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_)
            | Error::Format(_)
            | Error::Codec(_)
            | Error::InvalidInput(_)
            | Error::Unsupported(_)
            | Error::DimensionMismatch { .. }
            | Error::Config(_)
            | Error::EndOfStream => ErrorCategory::Load,
            Error::Capability(_) => ErrorCategory::Capability,
            Error::Overflow { .. } => ErrorCategory::Overflow,
            Error::Accelerator(_) => ErrorCategory::Accelerator,
            Error::InvalidState(_) => ErrorCategory::Internal,
        }
    }

    /// Whether playback can continue after this error
    pub fn is_fatal(&self) -> bool {
        self.category() != ErrorCategory::Capability
    }
}
