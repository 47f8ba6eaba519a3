//! In-memory sample source

use super::{SampleRecord, SampleSource, VideoTrackInfo};
use crate::codec::CodecId;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Elementary buffer plus sample table held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    info: VideoTrackInfo,
    data: Bytes,
    samples: Vec<SampleRecord>,
    sps: Vec<Vec<u8>>,
    pps: Vec<Vec<u8>>,
}

impl MemorySource {
    /// Wrap an existing buffer and sample table
    ///
    /// Every record must lie inside `data`.
    pub fn new(
        info: VideoTrackInfo,
        data: Bytes,
        samples: Vec<SampleRecord>,
        sps: Vec<Vec<u8>>,
        pps: Vec<Vec<u8>>,
    ) -> Result<Self> {
        for (index, record) in samples.iter().enumerate() {
            let end = record.byte_offset + record.byte_size as u64;
            if end > data.len() as u64 {
                return Err(Error::format(format!(
                    "Sample {} ends at {} past buffer of {} bytes",
                    index,
                    end,
                    data.len()
                )));
            }
        }

        Ok(MemorySource {
            info,
            data,
            samples,
            sps,
            pps,
        })
    }

    /// Start building an AVC source sample by sample
    pub fn builder(width: u32, height: u32, timescale: u32) -> MemorySourceBuilder {
        MemorySourceBuilder::new(VideoTrackInfo {
            codec: CodecId::Avc,
            width,
            height,
            timescale,
        })
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl SampleSource for MemorySource {
    fn track_info(&self) -> &VideoTrackInfo {
        &self.info
    }

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn sample(&self, index: usize) -> Result<SampleRecord> {
        self.samples
            .get(index)
            .copied()
            .ok_or_else(|| Error::invalid_input(format!("Sample {} out of range", index)))
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let start = usize::try_from(offset)
            .map_err(|_| Error::invalid_input(format!("Offset {} out of range", offset)))?;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "Read of {} bytes at {} exceeds buffer of {} bytes",
                    len,
                    offset,
                    self.data.len()
                ))
            })
    }

    fn parameter_sets(&self) -> (&[Vec<u8>], &[Vec<u8>]) {
        (&self.sps, &self.pps)
    }
}

/// Incremental builder for [`MemorySource`]
///
/// Samples are appended in decode order; decode timestamps accumulate from
/// the durations.
#[derive(Debug)]
pub struct MemorySourceBuilder {
    info: VideoTrackInfo,
    data: BytesMut,
    samples: Vec<SampleRecord>,
    sps: Vec<Vec<u8>>,
    pps: Vec<Vec<u8>>,
    next_dts: u64,
}

impl MemorySourceBuilder {
    pub fn new(info: VideoTrackInfo) -> Self {
        MemorySourceBuilder {
            info,
            data: BytesMut::new(),
            samples: Vec::new(),
            sps: Vec::new(),
            pps: Vec::new(),
            next_dts: 0,
        }
    }

    /// Override the codec reported by the track
    pub fn codec(mut self, codec: CodecId) -> Self {
        self.info.codec = codec;
        self
    }

    /// Add an SPS NAL unit (header byte included)
    pub fn sps(mut self, nal: Vec<u8>) -> Self {
        self.sps.push(nal);
        self
    }

    /// Add a PPS NAL unit (header byte included)
    pub fn pps(mut self, nal: Vec<u8>) -> Self {
        self.pps.push(nal);
        self
    }

    /// Append a length-prefixed sample presented at its decode time
    pub fn sample(self, bytes: &[u8], duration: u32, is_sync: bool) -> Self {
        self.sample_with_offset(bytes, duration, 0, is_sync)
    }

    /// Append a sample whose presentation time is `rendering_offset` ticks
    /// after its decode time
    pub fn sample_with_offset(
        mut self,
        bytes: &[u8],
        duration: u32,
        rendering_offset: i32,
        is_sync: bool,
    ) -> Self {
        let record = SampleRecord {
            byte_offset: self.data.len() as u64,
            byte_size: bytes.len() as u32,
            decode_timestamp: self.next_dts,
            presentation_timestamp: self.next_dts.saturating_add_signed(rendering_offset as i64),
            duration,
            is_sync,
        };
        self.data.put_slice(bytes);
        self.samples.push(record);
        self.next_dts += duration as u64;
        self
    }

    pub fn build(self) -> MemorySource {
        MemorySource {
            info: self.info,
            data: self.data.freeze(),
            samples: self.samples,
            sps: self.sps,
            pps: self.pps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_offsets_and_timestamps() {
        let source = MemorySource::builder(64, 48, 1000)
            .sps(vec![0x67, 0x42])
            .pps(vec![0x68, 0xCE])
            .sample(&[0, 0, 0, 1, 0x65], 40, true)
            .sample_with_offset(&[0, 0, 0, 2, 0x41, 0x9A], 40, 80, false)
            .build();

        assert_eq!(source.sample_count(), 2);
        let second = source.sample(1).unwrap();
        assert_eq!(second.byte_offset, 5);
        assert_eq!(second.byte_size, 6);
        assert_eq!(second.decode_timestamp, 40);
        assert_eq!(second.presentation_timestamp, 120);
        assert_eq!(source.sample_data(1).unwrap(), &[0, 0, 0, 2, 0x41, 0x9A]);

        let (sps, pps) = source.parameter_sets();
        assert_eq!(sps.len(), 1);
        assert_eq!(pps[0], vec![0x68, 0xCE]);
    }

    #[test]
    fn test_out_of_range_reads() {
        let source = MemorySource::builder(64, 48, 1000)
            .sample(&[0, 0, 0, 1, 0x65], 40, true)
            .build();

        assert!(source.sample(1).is_err());
        assert!(source.read_at(3, 3).is_err());
        assert!(source.read_at(u64::MAX, 1).is_err());
    }

    #[test]
    fn test_new_rejects_record_past_end() {
        let info = VideoTrackInfo {
            codec: CodecId::Avc,
            width: 16,
            height: 16,
            timescale: 30,
        };
        let record = SampleRecord {
            byte_offset: 2,
            byte_size: 4,
            ..Default::default()
        };
        let result = MemorySource::new(info, Bytes::from_static(&[0; 4]), vec![record], vec![], vec![]);
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
