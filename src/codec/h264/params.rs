//! Parameter set table
//!
//! Stores every SPS and PPS seen in a stream by id and derives the stream-wide
//! values the player sizes its resources from.

use tracing::{debug, warn};

use super::bitstream::remove_emulation_prevention;
use super::dpb::MAX_DPB_SLOTS;
use super::headers::{Pps, Sps, MAX_PPS_COUNT, MAX_SPS_COUNT};
use super::nal::{NalHeader, NalUnitType};
use crate::error::{Error, Result};

/// SPS/PPS storage indexed by parameter set id
#[derive(Debug, Clone)]
pub struct ParameterSetTable {
    sps: Vec<Option<Sps>>,
    pps: Vec<Option<Pps>>,
    num_dpb_slots: u32,
    first_sps_id: Option<u8>,
}

impl Default for ParameterSetTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSetTable {
    pub fn new() -> Self {
        ParameterSetTable {
            sps: vec![None; MAX_SPS_COUNT],
            pps: vec![None; MAX_PPS_COUNT],
            num_dpb_slots: 0,
            first_sps_id: None,
        }
    }

    /// Strip the header byte and emulation prevention, checking the NAL type
    fn rbsp(nal: &[u8], expected: NalUnitType) -> Result<Vec<u8>> {
        let (&first, payload) = nal
            .split_first()
            .ok_or_else(|| Error::codec("Empty parameter set NAL"))?;
        let header = NalHeader::parse(first)?;
        if header.nal_unit_type != expected {
            return Err(Error::codec(format!(
                "Expected {:?} NAL, got {:?}",
                expected, header.nal_unit_type
            )));
        }
        Ok(remove_emulation_prevention(payload))
    }

    /// Parse and store an SPS NAL (header byte included)
    pub fn add_sps(&mut self, nal: &[u8]) -> Result<&Sps> {
        let sps = Sps::parse(&Self::rbsp(nal, NalUnitType::Sps)?)?;
        let id = sps.seq_parameter_set_id;

        let required = sps.required_dpb_slots();
        if required > MAX_DPB_SLOTS as u32 {
            warn!(
                "SPS {} asks for {} DPB slots, clamping to {}",
                id, required, MAX_DPB_SLOTS
            );
        }
        self.num_dpb_slots = self.num_dpb_slots.max(required.min(MAX_DPB_SLOTS as u32));

        debug!(
            "SPS {}: profile {} level {} {}x{} refs {} poc type {}",
            id,
            sps.profile_idc,
            sps.level_idc,
            sps.width(),
            sps.height(),
            sps.max_num_ref_frames,
            sps.pic_order_cnt_type
        );

        if self.first_sps_id.is_none() {
            self.first_sps_id = Some(id);
        }
        let slot = &mut self.sps[usize::from(id)];
        Ok(&*slot.insert(sps))
    }

    /// Parse and store a PPS NAL (header byte included)
    ///
    /// The referenced SPS must already be present.
    pub fn add_pps(&mut self, nal: &[u8]) -> Result<&Pps> {
        let rbsp = Self::rbsp(nal, NalUnitType::Pps)?;
        let pps = Pps::parse(&rbsp, |id| self.sps(id))?;
        debug!(
            "PPS {} -> SPS {}, cabac {}",
            pps.pic_parameter_set_id, pps.seq_parameter_set_id, pps.entropy_coding_mode
        );
        let slot = &mut self.pps[usize::from(pps.pic_parameter_set_id)];
        Ok(&*slot.insert(pps))
    }

    pub fn sps(&self, id: u8) -> Option<&Sps> {
        self.sps.get(usize::from(id)).and_then(Option::as_ref)
    }

    pub fn pps(&self, id: u8) -> Option<&Pps> {
        self.pps.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// The PPS with `pps_id` and the SPS it references
    pub fn active(&self, pps_id: u8) -> Result<(&Pps, &Sps)> {
        let pps = self
            .pps(pps_id)
            .ok_or_else(|| Error::format(format!("Slice references unknown PPS {}", pps_id)))?;
        let sps = self.sps(pps.seq_parameter_set_id).ok_or_else(|| {
            Error::format(format!(
                "PPS {} references unknown SPS {}",
                pps_id, pps.seq_parameter_set_id
            ))
        })?;
        Ok((pps, sps))
    }

    /// All stored SPS in id order
    pub fn sps_list(&self) -> Vec<Sps> {
        self.sps.iter().flatten().cloned().collect()
    }

    /// All stored PPS in id order
    pub fn pps_list(&self) -> Vec<Pps> {
        self.pps.iter().flatten().cloned().collect()
    }

    /// First SPS added to the table; it defines the stream geometry
    pub fn primary_sps(&self) -> Option<&Sps> {
        self.first_sps_id.and_then(|id| self.sps(id))
    }

    /// DPB slots needed by every SPS seen so far (0 before the first SPS)
    pub fn num_dpb_slots(&self) -> u32 {
        self.num_dpb_slots
    }

    /// Display dimensions of the primary SPS
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.primary_sps().map(|sps| (sps.width(), sps.height()))
    }

    /// Coded (macroblock aligned) dimensions of the primary SPS
    pub fn coded_dimensions(&self) -> Option<(u32, u32)> {
        self.primary_sps()
            .map(|sps| (sps.coded_width(), sps.coded_height()))
    }

    /// chroma_format_idc of the primary SPS
    pub fn chroma_format_idc(&self) -> Option<u8> {
        self.primary_sps().map(|sps| sps.chroma_format_idc)
    }

    /// Check the stream's cropped size against the container's
    pub fn validate_dimensions(&self, container: (u32, u32)) -> Result<()> {
        let stream = self
            .dimensions()
            .ok_or_else(|| Error::format("Stream has no SPS"))?;
        if stream != container {
            return Err(Error::DimensionMismatch { container, stream });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::h264::writer::{build_nal, BitstreamWriter};

    fn sps_nal(id: u32, num_ref_frames: u32, mbs: (u32, u32)) -> Vec<u8> {
        let mut w = BitstreamWriter::new();
        w.write_bits(66, 8);
        w.write_bits(0, 8);
        w.write_bits(30, 8);
        w.write_ue(id);
        w.write_ue(0);
        w.write_ue(2); // poc type 2
        w.write_ue(num_ref_frames);
        w.write_bit(false);
        w.write_ue(mbs.0 - 1);
        w.write_ue(mbs.1 - 1);
        w.write_bit(true);
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(false);
        build_nal(NalHeader::new(3, NalUnitType::Sps), &w.finish())
    }

    fn pps_nal(id: u32, sps_id: u32) -> Vec<u8> {
        let mut w = BitstreamWriter::new();
        w.write_ue(id);
        w.write_ue(sps_id);
        w.write_bit(false);
        w.write_bit(false);
        w.write_ue(0);
        w.write_ue(0);
        w.write_ue(0);
        w.write_bit(false);
        w.write_bits(0, 2);
        w.write_se(0);
        w.write_se(0);
        w.write_se(0);
        w.write_bit(true);
        w.write_bit(false);
        w.write_bit(false);
        build_nal(NalHeader::new(3, NalUnitType::Pps), &w.finish())
    }

    #[test]
    fn test_two_ref_frames_gives_five_slots() {
        let mut table = ParameterSetTable::new();
        assert_eq!(table.num_dpb_slots(), 0);
        table.add_sps(&sps_nal(0, 2, (20, 15))).unwrap();
        assert_eq!(table.num_dpb_slots(), 5);
    }

    #[test]
    fn test_dpb_slots_keep_maximum() {
        let mut table = ParameterSetTable::new();
        table.add_sps(&sps_nal(0, 4, (20, 15))).unwrap();
        table.add_sps(&sps_nal(1, 1, (20, 15))).unwrap();
        assert_eq!(table.num_dpb_slots(), 9);

        table.add_sps(&sps_nal(2, 16, (20, 15))).unwrap();
        assert_eq!(table.num_dpb_slots(), MAX_DPB_SLOTS as u32);
    }

    #[test]
    fn test_pps_lookup_and_active() {
        let mut table = ParameterSetTable::new();
        table.add_sps(&sps_nal(0, 1, (20, 15))).unwrap();
        table.add_pps(&pps_nal(4, 0)).unwrap();

        let (pps, sps) = table.active(4).unwrap();
        assert_eq!(pps.pic_parameter_set_id, 4);
        assert_eq!(sps.seq_parameter_set_id, 0);
        assert!(matches!(table.active(5), Err(Error::Format(_))));
        assert_eq!(table.pps_list().len(), 1);
    }

    #[test]
    fn test_pps_before_sps_fails() {
        let mut table = ParameterSetTable::new();
        assert!(table.add_pps(&pps_nal(0, 0)).is_err());
    }

    #[test]
    fn test_wrong_nal_type_rejected() {
        let mut table = ParameterSetTable::new();
        let nal = pps_nal(0, 0);
        assert!(table.add_sps(&nal).is_err());
        assert!(table.add_sps(&[]).is_err());
    }

    #[test]
    fn test_validate_dimensions() {
        let mut table = ParameterSetTable::new();
        assert!(table.validate_dimensions((320, 240)).is_err());

        table.add_sps(&sps_nal(0, 1, (20, 15))).unwrap();
        assert_eq!(table.dimensions(), Some((320, 240)));
        assert!(table.validate_dimensions((320, 240)).is_ok());

        let err = table.validate_dimensions((320, 256)).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                container: (320, 256),
                stream: (320, 240)
            }
        ));
    }
}
