//! avcplay - hardware-accelerated H.264 playback orchestration
//!
//! avcplay drives a hardware H.264 decoder that only performs the arithmetic
//! decode. Everything else a player needs is done here, in safe Rust: NAL
//! framing, SPS/PPS and slice header parsing, picture order and display
//! order, DPB slot and reference management, bitstream staging, command
//! recording with resource barriers, and playback timing.
//!
//! # Architecture
//!
//! - `codec`: H.264 bitstream parsing, picture order and DPB bookkeeping
//! - `format`: container input (`SampleSource`, in-memory and MP4 sources)
//! - `hwaccel`: the accelerator interface, command model and a recording
//!   software accelerator
//! - `player`: stream loading, staging, decode orchestration, scheduling
//! - `config`: TOML player configuration

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod hwaccel;
pub mod player;

pub use error::{Error, Result};

/// avcplay version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library-wide settings
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize avcplay with the given configuration
///
/// Installs a `tracing` subscriber when verbose or debug output is
/// requested. Calling it again after a subscriber is installed is not an
/// error.
pub fn init(config: Config) -> Result<()> {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        // a subscriber may already be installed by the host or an earlier call
        let _ = tracing_subscriber::fmt()
            .with_env_filter(level)
            .try_init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.verbose);
        assert!(!config.debug);
    }

    #[test]
    fn test_init() {
        assert!(init(Config::default()).is_ok());
        let verbose = Config {
            verbose: true,
            debug: false,
        };
        assert!(init(verbose.clone()).is_ok());
        assert!(init(verbose).is_ok());
    }
}
