//! NAL (Network Abstraction Layer) unit framing for H.264/AVC
//!
//! MP4 samples carry NAL units in AVCC form: each unit is preceded by a 4-byte
//! big-endian length. The cursor here walks those records, classifies each
//! unit by its header byte and hands out borrowed payloads.
//!
//! ## NAL Unit Types
//!
//! - Type 1: Non-IDR slice (P frame)
//! - Type 5: IDR slice (keyframe)
//! - Type 6: SEI (Supplemental Enhancement Information)
//! - Type 7: SPS (Sequence Parameter Set)
//! - Type 8: PPS (Picture Parameter Set)
//! - Type 9: AUD (Access Unit Delimiter)

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// Size of the AVCC length prefix used by the staging path
pub const NAL_LENGTH_SIZE: usize = 4;

/// Annex B start code written in front of staged slices
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// H.264 NAL unit types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum NalUnitType {
    Unspecified,
    Slice,
    SliceDataA,
    SliceDataB,
    SliceDataC,
    IdrSlice,
    Sei,
    Sps,
    Pps,
    Aud,
    EndOfSequence,
    EndOfStream,
    Filler,
    SpsExtension,
    Prefix,
    SubsetSps,
    AuxiliarySlice,
    SliceExtension,
    Reserved(u8),
}

impl NalUnitType {
    /// Convert from the 5-bit nal_unit_type field
    pub fn from_u8(value: u8) -> Self {
        match value & 0x1F {
            0 => NalUnitType::Unspecified,
            1 => NalUnitType::Slice,
            2 => NalUnitType::SliceDataA,
            3 => NalUnitType::SliceDataB,
            4 => NalUnitType::SliceDataC,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::Aud,
            10 => NalUnitType::EndOfSequence,
            11 => NalUnitType::EndOfStream,
            12 => NalUnitType::Filler,
            13 => NalUnitType::SpsExtension,
            14 => NalUnitType::Prefix,
            15 => NalUnitType::SubsetSps,
            19 => NalUnitType::AuxiliarySlice,
            20 => NalUnitType::SliceExtension,
            other => NalUnitType::Reserved(other),
        }
    }

    /// The 5-bit nal_unit_type value
    pub fn as_u8(&self) -> u8 {
        match *self {
            NalUnitType::Unspecified => 0,
            NalUnitType::Slice => 1,
            NalUnitType::SliceDataA => 2,
            NalUnitType::SliceDataB => 3,
            NalUnitType::SliceDataC => 4,
            NalUnitType::IdrSlice => 5,
            NalUnitType::Sei => 6,
            NalUnitType::Sps => 7,
            NalUnitType::Pps => 8,
            NalUnitType::Aud => 9,
            NalUnitType::EndOfSequence => 10,
            NalUnitType::EndOfStream => 11,
            NalUnitType::Filler => 12,
            NalUnitType::SpsExtension => 13,
            NalUnitType::Prefix => 14,
            NalUnitType::SubsetSps => 15,
            NalUnitType::AuxiliarySlice => 19,
            NalUnitType::SliceExtension => 20,
            NalUnitType::Reserved(v) => v,
        }
    }

    /// Coded slice of a picture the accelerator can decode (IDR or non-IDR)
    pub fn is_slice(&self) -> bool {
        matches!(self, NalUnitType::Slice | NalUnitType::IdrSlice)
    }

    /// Instantaneous decoder refresh slice
    pub fn is_idr(&self) -> bool {
        *self == NalUnitType::IdrSlice
    }

    /// SPS or PPS
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NalUnitType::Sps | NalUnitType::Pps)
    }
}

/// One-byte H.264 NAL header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    /// nal_ref_idc (0-3); non-zero marks a reference picture
    pub nal_ref_idc: u8,
    pub nal_unit_type: NalUnitType,
}

impl NalHeader {
    pub fn new(nal_ref_idc: u8, nal_unit_type: NalUnitType) -> Self {
        NalHeader {
            nal_ref_idc: nal_ref_idc & 0x03,
            nal_unit_type,
        }
    }

    /// Parse the header byte
    pub fn parse(byte: u8) -> Result<Self> {
        if byte & 0x80 != 0 {
            return Err(Error::codec("NAL forbidden_zero_bit is set"));
        }
        Ok(NalHeader {
            nal_ref_idc: (byte >> 5) & 0x03,
            nal_unit_type: NalUnitType::from_u8(byte),
        })
    }

    pub fn to_byte(&self) -> u8 {
        (self.nal_ref_idc << 5) | self.nal_unit_type.as_u8()
    }

    pub fn is_reference(&self) -> bool {
        self.nal_ref_idc != 0
    }
}

/// A NAL unit borrowed from a length-prefixed sample
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    pub header: NalHeader,
    /// NAL bytes including the header byte, still escaped
    pub data: &'a [u8],
    /// Byte offset of the length prefix within the sample
    pub offset: usize,
}

impl<'a> NalUnit<'a> {
    pub fn nal_type(&self) -> NalUnitType {
        self.header.nal_unit_type
    }

    /// Bytes after the header byte
    pub fn payload(&self) -> &'a [u8] {
        &self.data[1..]
    }

    /// Size of the record in the sample: length prefix plus NAL bytes
    pub fn record_size(&self) -> usize {
        NAL_LENGTH_SIZE + self.data.len()
    }

    /// Size once staged with a 4-byte start code instead of the length prefix
    pub fn staged_size(&self) -> usize {
        START_CODE.len() + self.data.len()
    }
}

/// Cursor over 4-byte length-prefixed NAL records
///
/// Yields an error (and then stops) when a declared length runs past the end
/// of the sample, since that means the container and stream disagree.
pub struct LengthPrefixedNals<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> LengthPrefixedNals<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        LengthPrefixedNals {
            data,
            pos: 0,
            failed: false,
        }
    }

    fn next_unit(&mut self) -> Result<NalUnit<'a>> {
        let remaining = self.data.len() - self.pos;
        if remaining < NAL_LENGTH_SIZE {
            return Err(Error::format(format!(
                "Truncated NAL length prefix at offset {} ({} bytes left)",
                self.pos, remaining
            )));
        }

        let length = BigEndian::read_u32(&self.data[self.pos..]) as usize;
        let record_size = NAL_LENGTH_SIZE + length;
        if record_size > remaining {
            return Err(Error::format(format!(
                "NAL record at offset {} needs {} bytes, sample has {}",
                self.pos, record_size, remaining
            )));
        }
        if length == 0 {
            return Err(Error::format(format!("Empty NAL unit at offset {}", self.pos)));
        }

        let start = self.pos + NAL_LENGTH_SIZE;
        let data = &self.data[start..start + length];
        let header = NalHeader::parse(data[0])?;
        let unit = NalUnit {
            header,
            data,
            offset: self.pos,
        };
        self.pos += record_size;
        Ok(unit)
    }
}

impl<'a> Iterator for LengthPrefixedNals<'a> {
    type Item = Result<NalUnit<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let unit = self.next_unit();
        if unit.is_err() {
            self.failed = true;
        }
        Some(unit)
    }
}

/// First IDR or non-IDR slice in a length-prefixed sample
///
/// Records before the slice are validated but otherwise skipped. Returns
/// `Ok(None)` when the sample carries no slice at all.
pub fn first_slice(sample: &[u8]) -> Result<Option<NalUnit<'_>>> {
    for unit in LengthPrefixedNals::new(sample) {
        let unit = unit?;
        if unit.nal_type().is_slice() {
            return Ok(Some(unit));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_header_parse() {
        let header = NalHeader::parse(0x65).unwrap();
        assert_eq!(header.nal_unit_type, NalUnitType::IdrSlice);
        assert_eq!(header.nal_ref_idc, 3);
        assert!(header.nal_unit_type.is_idr());
        assert!(header.is_reference());

        let header = NalHeader::parse(0x01).unwrap();
        assert_eq!(header.nal_unit_type, NalUnitType::Slice);
        assert!(!header.is_reference());

        assert!(NalHeader::parse(0x85).is_err());
        assert_eq!(NalHeader::parse(0x68).unwrap().to_byte(), 0x68);
    }

    #[test]
    fn test_nal_unit_type_classes() {
        assert!(NalUnitType::Slice.is_slice());
        assert!(NalUnitType::IdrSlice.is_slice());
        assert!(!NalUnitType::SliceDataA.is_slice());
        assert!(NalUnitType::Sps.is_parameter_set());
        assert!(!NalUnitType::Sei.is_parameter_set());
        assert_eq!(NalUnitType::from_u8(22), NalUnitType::Reserved(22));
        assert_eq!(NalUnitType::Reserved(22).as_u8(), 22);
    }

    #[test]
    fn test_walk_length_prefixed() {
        let sample = [
            0x00, 0x00, 0x00, 0x02, 0x09, 0xF0, // AUD
            0x00, 0x00, 0x00, 0x03, 0x06, 0x05, 0x80, // SEI
            0x00, 0x00, 0x00, 0x03, 0x65, 0x88, 0x84, // IDR
        ];

        let units: Vec<_> = LengthPrefixedNals::new(&sample)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].nal_type(), NalUnitType::Aud);
        assert_eq!(units[2].nal_type(), NalUnitType::IdrSlice);
        assert_eq!(units[2].offset, 13);
        assert_eq!(units[2].payload(), &[0x88, 0x84]);

        let slice = first_slice(&sample).unwrap().unwrap();
        assert_eq!(slice.offset, 13);
        assert_eq!(slice.record_size(), 7);
    }

    #[test]
    fn test_length_sixteen_needs_twenty_bytes() {
        let mut sample = vec![0x00, 0x00, 0x00, 0x10, 0x41];
        sample.extend_from_slice(&[0xAA; 15]);

        let unit = first_slice(&sample).unwrap().unwrap();
        assert_eq!(unit.record_size(), 20);
        assert_eq!(unit.staged_size(), 20);

        // one byte short
        sample.pop();
        assert!(first_slice(&sample).is_err());
    }

    #[test]
    fn test_sample_without_slice() {
        let sample = [0x00, 0x00, 0x00, 0x02, 0x09, 0xF0];
        assert!(first_slice(&sample).unwrap().is_none());
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let sample = [0x00, 0x00, 0x00];
        let mut iter = LengthPrefixedNals::new(&sample);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}
