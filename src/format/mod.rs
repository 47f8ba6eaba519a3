//! Container input
//!
//! The playback engine never parses container boxes itself. It consumes a
//! [`SampleSource`]: one video track described by [`VideoTrackInfo`], a
//! table of [`SampleRecord`]s in decode order, random access to the sample
//! bytes, and the out-of-band parameter sets.
//!
//! Two sources are provided:
//! - [`MemorySource`]: an elementary buffer plus sample table held in memory
//! - [`mp4::Mp4Source`]: an `avc1` track read with the `mp4` crate

pub mod memory;

#[cfg(feature = "mp4-support")]
pub mod mp4;

pub use memory::{MemorySource, MemorySourceBuilder};

#[cfg(feature = "mp4-support")]
pub use self::mp4::Mp4Source;

use crate::codec::CodecId;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;

/// Description of the video track being played
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoTrackInfo {
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    /// Ticks per second of the sample timestamps
    pub timescale: u32,
}

/// Location and timing of one compressed sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SampleRecord {
    /// Offset of the sample in the source's byte space
    pub byte_offset: u64,
    pub byte_size: u32,
    /// Decode timestamp in timescale ticks
    pub decode_timestamp: u64,
    /// Presentation timestamp in timescale ticks
    pub presentation_timestamp: u64,
    /// Duration in timescale ticks
    pub duration: u32,
    pub is_sync: bool,
}

/// Random-access reader over one H.264 track
pub trait SampleSource {
    fn track_info(&self) -> &VideoTrackInfo;

    fn sample_count(&self) -> usize;

    /// Sample record by zero-based decode index
    fn sample(&self, index: usize) -> Result<SampleRecord>;

    /// Borrow `len` bytes starting at `offset`
    fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]>;

    /// Out-of-band SPS and PPS NAL units, header byte included
    fn parameter_sets(&self) -> (&[Vec<u8>], &[Vec<u8>]);

    /// Bytes of one sample
    fn sample_data(&self, index: usize) -> Result<&[u8]> {
        let record = self.sample(index)?;
        self.read_at(record.byte_offset, record.byte_size as usize)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn track_info(&self) -> &VideoTrackInfo {
        (**self).track_info()
    }

    fn sample_count(&self) -> usize {
        (**self).sample_count()
    }

    fn sample(&self, index: usize) -> Result<SampleRecord> {
        (**self).sample(index)
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        (**self).read_at(offset, len)
    }

    fn parameter_sets(&self) -> (&[Vec<u8>], &[Vec<u8>]) {
        (**self).parameter_sets()
    }
}

/// Detect format from file extension
pub fn detect_format_from_extension(path: &str) -> Option<&'static str> {
    let ext = path.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "mp4" | "m4v" | "mov" => Some("mp4"),
        _ => None,
    }
}

/// Open a container file as a sample source
#[cfg(feature = "mp4-support")]
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn SampleSource>> {
    let path = path.as_ref();
    let name = path.to_string_lossy();
    match detect_format_from_extension(&name) {
        Some("mp4") => Ok(Box::new(Mp4Source::open(path)?)),
        _ => Err(Error::unsupported(format!(
            "No container reader for {}",
            path.display()
        ))),
    }
}

/// Open a container file as a sample source
#[cfg(not(feature = "mp4-support"))]
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Box<dyn SampleSource>> {
    Err(Error::unsupported(format!(
        "No container reader for {} (built without mp4-support)",
        path.as_ref().display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format_from_extension("clip.mp4"), Some("mp4"));
        assert_eq!(detect_format_from_extension("CLIP.M4V"), Some("mp4"));
        assert_eq!(detect_format_from_extension("clip.mkv"), None);
    }

    #[test]
    fn test_open_unknown_extension() {
        let result = open_source("clip.webm");
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }
}
