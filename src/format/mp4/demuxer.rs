//! MP4 sample source
//!
//! Reads the first video track of an MP4 file with the `mp4` crate. The
//! samples are copied once into a contiguous elementary buffer so the
//! playback engine can address them by byte offset, the same way it
//! addresses a [`MemorySource`](crate::format::MemorySource).

use crate::codec::CodecId;
use crate::error::{Error, Result};
use crate::format::{MemorySource, SampleRecord, SampleSource, VideoTrackInfo};
use bytes::{BufMut, BytesMut};
use mp4::{MediaType, Mp4Reader, Mp4Track, TrackType};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Video track of an MP4 file, fully buffered
#[derive(Debug, Clone)]
pub struct Mp4Source {
    inner: MemorySource,
    track_id: u32,
}

impl Mp4Source {
    /// Open and buffer an MP4 file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::format(format!("Failed to open MP4 file: {}", e)))?;

        let size = file
            .metadata()
            .map_err(|e| Error::format(format!("Failed to get file metadata: {}", e)))?
            .len();

        let source = Self::from_reader(BufReader::new(file), size)?;
        info!(
            "Opened {}: track {}, {} samples",
            path.display(),
            source.track_id,
            source.sample_count()
        );
        Ok(source)
    }

    /// Read from any seekable reader holding `size` bytes of MP4
    pub fn from_reader<R: Read + Seek>(reader: R, size: u64) -> Result<Self> {
        let mut reader = Mp4Reader::read_header(reader, size)
            .map_err(|e| Error::format(format!("Failed to read MP4 header: {}", e)))?;

        let track_id = Self::find_video_track(&reader)?;
        let track = reader
            .tracks()
            .get(&track_id)
            .ok_or_else(|| Error::format(format!("Track {} not found", track_id)))?;

        let codec = Self::map_codec(track)?;
        if !codec.is_avc() {
            return Err(Error::unsupported(format!(
                "Video track {} uses {}, only avc1 is supported",
                track_id, codec
            )));
        }

        let info = VideoTrackInfo {
            codec,
            width: track.width() as u32,
            height: track.height() as u32,
            timescale: track.timescale(),
        };

        let sps = track
            .sequence_parameter_set()
            .map_err(|e| Error::format(format!("Missing avcC SPS: {}", e)))?
            .to_vec();
        let pps = track
            .picture_parameter_set()
            .map_err(|e| Error::format(format!("Missing avcC PPS: {}", e)))?
            .to_vec();

        let sample_count = track.sample_count();
        debug!(
            "MP4 track {}: {}x{}, timescale {}, {} samples",
            track_id, info.width, info.height, info.timescale, sample_count
        );

        let mut data = BytesMut::new();
        let mut samples = Vec::with_capacity(sample_count as usize);

        // MP4 samples are 1-indexed
        for sample_id in 1..=sample_count {
            let sample = reader
                .read_sample(track_id, sample_id)
                .map_err(|e| Error::format(format!("Failed to read sample: {}", e)))?
                .ok_or_else(|| Error::format(format!("Sample {} not found", sample_id)))?;

            samples.push(SampleRecord {
                byte_offset: data.len() as u64,
                byte_size: sample.bytes.len() as u32,
                decode_timestamp: sample.start_time,
                presentation_timestamp: sample
                    .start_time
                    .saturating_add_signed(sample.rendering_offset as i64),
                duration: sample.duration,
                is_sync: sample.is_sync,
            });
            data.put_slice(&sample.bytes);
        }

        let inner = MemorySource::new(info, data.freeze(), samples, vec![sps], vec![pps])?;
        Ok(Mp4Source { inner, track_id })
    }

    /// Container id of the track being played
    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    fn find_video_track<R: Read + Seek>(reader: &Mp4Reader<R>) -> Result<u32> {
        let mut video_tracks: Vec<u32> = reader
            .tracks()
            .iter()
            .filter(|(_, track)| matches!(track.track_type(), Ok(TrackType::Video)))
            .map(|(id, _)| *id)
            .collect();
        video_tracks.sort_unstable();

        video_tracks
            .first()
            .copied()
            .ok_or_else(|| Error::unsupported("MP4 file has no video track"))
    }

    fn map_codec(track: &Mp4Track) -> Result<CodecId> {
        let media_type = track
            .media_type()
            .map_err(|e| Error::format(format!("Unknown media type: {}", e)))?;

        match media_type {
            MediaType::H264 => Ok(CodecId::Avc),
            _ => {
                let fourcc = track
                    .box_type()
                    .map_err(|e| Error::format(format!("Unknown sample entry: {}", e)))?;
                Ok(CodecId::Other(fourcc.value))
            }
        }
    }
}

impl SampleSource for Mp4Source {
    fn track_info(&self) -> &VideoTrackInfo {
        self.inner.track_info()
    }

    fn sample_count(&self) -> usize {
        self.inner.sample_count()
    }

    fn sample(&self, index: usize) -> Result<SampleRecord> {
        self.inner.sample(index)
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        self.inner.read_at(offset, len)
    }

    fn parameter_sets(&self) -> (&[Vec<u8>], &[Vec<u8>]) {
        self.inner.parameter_sets()
    }
}
