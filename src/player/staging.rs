//! Bitstream staging ring
//!
//! Compressed frames are copied into one accelerator-visible buffer split
//! into equally sized entries. Entry `i` is reused every `entry_count`
//! decodes, so with `entry_count = num_dpb_slots + 1` no entry is
//! overwritten while a decode may still read it.
//!
//! The decoder expects Annex B input: each staged slice starts with a
//! `00 00 00 01` start code instead of the container's length prefix.

use bytes::BytesMut;
use tracing::trace;

use crate::codec::h264::{first_slice, START_CODE};
use crate::error::{Error, Result};

/// Round `size` up to a multiple of `alignment`
///
/// Zero stays zero; an alignment of zero is treated as one.
pub fn align_to(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    if size == 0 {
        return 0;
    }
    ((size - 1) / alignment + 1) * alignment
}

/// One entry of the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagingSlice {
    /// Offset of the entry in the staging buffer
    pub offset: u64,
    pub capacity: u64,
    /// Bytes written, padded to the size alignment
    pub written_size: u64,
}

/// A frame after staging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFrame {
    pub entry: usize,
    pub slice: StagingSlice,
    /// Aligned size the decoder reads
    pub range: u64,
    /// Slice start offsets relative to `slice.offset`
    pub slice_offsets: Vec<u32>,
}

/// Fixed ring of staging entries over one buffer
#[derive(Debug)]
pub struct StagingRing {
    buffer: BytesMut,
    entries: Vec<StagingSlice>,
    offset_alignment: u64,
    size_alignment: u64,
}

impl StagingRing {
    /// Create `entry_count` entries, each large enough for `max_frame_size`
    pub fn new(
        entry_count: usize,
        max_frame_size: usize,
        offset_alignment: u64,
        size_alignment: u64,
    ) -> Result<Self> {
        if entry_count == 0 {
            return Err(Error::invalid_input("Staging ring needs at least one entry"));
        }

        let capacity = align_to(
            align_to(max_frame_size as u64, offset_alignment),
            size_alignment,
        );
        let total = capacity
            .checked_mul(entry_count as u64)
            .and_then(|t| usize::try_from(t).ok())
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "Staging ring of {} x {} bytes is too large",
                    entry_count, capacity
                ))
            })?;

        let entries = (0..entry_count as u64)
            .map(|i| StagingSlice {
                offset: i * capacity,
                capacity,
                written_size: 0,
            })
            .collect();

        let mut buffer = BytesMut::with_capacity(total);
        buffer.resize(total, 0);

        Ok(StagingRing {
            buffer,
            entries,
            offset_alignment: offset_alignment.max(1),
            size_alignment: size_alignment.max(1),
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_capacity(&self) -> u64 {
        self.entries.first().map_or(0, |e| e.capacity)
    }

    pub fn offset_alignment(&self) -> u64 {
        self.offset_alignment
    }

    pub fn size_alignment(&self) -> u64 {
        self.size_alignment
    }

    pub fn entry(&self, index: usize) -> Option<&StagingSlice> {
        self.entries.get(index)
    }

    /// The whole staging buffer, as handed to the accelerator
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Stage the first slice of a length-prefixed sample
    ///
    /// Non-slice NAL units (SEI, AUD, in-band parameter sets) are skipped.
    pub fn write_frame(&mut self, decode_index: usize, sample: &[u8]) -> Result<StagedFrame> {
        let entry_index = decode_index % self.entries.len();
        let mut slice = self.entries[entry_index];
        slice.written_size = 0;

        let unit = first_slice(sample)?.ok_or_else(|| {
            Error::format(format!("Frame {} has no slice to stage", decode_index))
        })?;

        let base = slice.offset as usize;
        let capacity = slice.capacity as usize;
        let written = START_CODE.len() + unit.data.len();
        if written > capacity {
            return Err(Error::Overflow {
                need: written,
                have: capacity,
            });
        }

        let dst = &mut self.buffer[base..base + written];
        dst[..START_CODE.len()].copy_from_slice(&START_CODE);
        dst[START_CODE.len()..].copy_from_slice(unit.data);
        let slice_offsets = vec![0];

        let padded = align_to(written as u64, self.size_alignment);
        self.buffer[base + written..base + padded as usize].fill(0);
        slice.written_size = padded;
        self.entries[entry_index] = slice;

        trace!(
            "Staged frame {} in entry {}: {} bytes ({} padded)",
            decode_index,
            entry_index,
            written,
            padded
        );

        Ok(StagedFrame {
            entry: entry_index,
            slice,
            range: padded,
            slice_offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(payload_len: usize) -> Vec<u8> {
        let mut sample = Vec::new();
        // AUD first, which must not be staged
        sample.extend_from_slice(&[0, 0, 0, 2, 0x09, 0xF0]);
        sample.extend_from_slice(&(payload_len as u32 + 1).to_be_bytes());
        sample.push(0x65);
        sample.extend(std::iter::repeat(0xAB).take(payload_len));
        sample
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(7, 0), 7);
    }

    #[test]
    fn test_entry_layout() {
        let ring = StagingRing::new(4, 300, 256, 64).unwrap();
        assert_eq!(ring.entry_count(), 4);
        assert_eq!(ring.entry_capacity(), 512);
        assert_eq!(ring.buffer().len(), 2048);
        assert_eq!(ring.entry(3).unwrap().offset, 1536);
    }

    #[test]
    fn test_write_frame_uses_start_code() {
        let mut ring = StagingRing::new(3, 128, 64, 64).unwrap();
        let staged = ring.write_frame(4, &sample(10)).unwrap();

        assert_eq!(staged.entry, 1);
        assert_eq!(staged.slice.offset, 128);
        assert_eq!(staged.range, 64);
        assert_eq!(staged.slice_offsets, vec![0]);

        let bytes = &ring.buffer()[128..128 + 15];
        assert_eq!(&bytes[..5], &[0, 0, 0, 1, 0x65]);
        assert!(bytes[5..].iter().all(|&b| b == 0xAB));
        assert!(ring.buffer()[128 + 15..192].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_overflow() {
        let mut ring = StagingRing::new(2, 16, 16, 16).unwrap();
        let result = ring.write_frame(0, &sample(20));
        assert!(matches!(
            result,
            Err(Error::Overflow { need: 25, have: 16 })
        ));
    }

    #[test]
    fn test_sample_without_slice() {
        let mut ring = StagingRing::new(2, 64, 16, 16).unwrap();
        let result = ring.write_frame(0, &[0, 0, 0, 2, 0x09, 0xF0]);
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
