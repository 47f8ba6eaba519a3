//! Player configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid:
//!
//! ```toml
//! max_texture_count = 64
//! tick_seconds = 0.016666
//! force_initial_reset = true
//! output_format = "nv12"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hwaccel::HwPixelFormat;
use crate::player::scheduler::DEFAULT_MAX_TEXTURE_COUNT;

/// Tunables for [`Player`](crate::player::Player)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Upper bound on output surfaces in flight
    pub max_texture_count: usize,
    /// Host tick used by the CLI simulation, in seconds
    pub tick_seconds: f64,
    /// Reset the decode session before the first frame
    pub force_initial_reset: bool,
    /// Pixel format requested for output surfaces
    pub output_format: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            max_texture_count: DEFAULT_MAX_TEXTURE_COUNT,
            tick_seconds: 1.0 / 60.0,
            force_initial_reset: true,
            output_format: "nv12".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: PlayerConfig = toml::from_str(contents)
            .map_err(|e| Error::config(format!("Invalid player config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_texture_count == 0 {
            return Err(Error::config("max_texture_count must be at least 1"));
        }
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(Error::config(format!(
                "tick_seconds must be positive, got {}",
                self.tick_seconds
            )));
        }
        self.pixel_format()?;
        Ok(())
    }

    /// `output_format` as a pixel format
    pub fn pixel_format(&self) -> Result<HwPixelFormat> {
        HwPixelFormat::from_name(&self.output_format).ok_or_else(|| {
            Error::config(format!("Unknown output format '{}'", self.output_format))
        })
    }
}
