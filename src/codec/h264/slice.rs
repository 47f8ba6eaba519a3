//! H.264 slice header parsing (7.3.3)
//!
//! Only the header is read; slice data stays opaque and goes to the
//! accelerator untouched.

use serde::Serialize;

use super::bitstream::{remove_emulation_prevention, BitstreamReader};
use super::headers::Sps;
use super::nal::{NalHeader, NalUnit};
use super::params::ParameterSetTable;
use crate::error::{Error, Result};

/// slice_type modulo 5 (Table 7-6)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SliceType {
    #[default]
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    pub fn from_u32(value: u32) -> Result<Self> {
        match value % 5 {
            0 => Ok(SliceType::P),
            1 => Ok(SliceType::B),
            2 => Ok(SliceType::I),
            3 => Ok(SliceType::Sp),
            4 => Ok(SliceType::Si),
            _ => Err(Error::codec(format!("Invalid slice_type {}", value))),
        }
    }

    pub fn is_intra(&self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }

    pub fn is_b(&self) -> bool {
        *self == SliceType::B
    }

    /// Slice types that carry num_ref_idx_active_override_flag
    fn has_references(&self) -> bool {
        matches!(self, SliceType::P | SliceType::Sp | SliceType::B)
    }
}

/// One entry of ref_pic_list_modification()
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefPicListModification {
    pub modification_of_pic_nums_idc: u8,
    pub abs_diff_pic_num_minus1: u32,
    pub long_term_pic_num: u32,
}

/// Explicit weights for one reference index; `None` means inferred
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeightEntry {
    pub luma: Option<(i32, i32)>,
    pub chroma: Option<[(i32, i32); 2]>,
}

/// pred_weight_table()
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredWeightTable {
    pub luma_log2_weight_denom: u8,
    pub chroma_log2_weight_denom: u8,
    pub l0: Vec<WeightEntry>,
    pub l1: Vec<WeightEntry>,
}

/// One memory_management_control_operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryManagementOperation {
    pub operation: u8,
    pub difference_of_pic_nums_minus1: u32,
    pub long_term_pic_num: u32,
    pub long_term_frame_idx: u32,
    pub max_long_term_frame_idx_plus1: u32,
}

/// dec_ref_pic_marking()
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecRefPicMarking {
    pub no_output_of_prior_pics: bool,
    pub long_term_reference: bool,
    pub adaptive_ref_pic_marking_mode: bool,
    pub operations: Vec<MemoryManagementOperation>,
}

impl DecRefPicMarking {
    /// MMCO 5 marks every reference unused, like an IDR without the refresh
    pub fn has_mmco5(&self) -> bool {
        self.operations.iter().any(|op| op.operation == 5)
    }
}

/// Parsed slice header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SliceHeader {
    pub first_mb_in_slice: u32,
    pub slice_type: SliceType,
    pub pic_parameter_set_id: u8,
    pub colour_plane_id: u8,
    pub frame_num: u32,
    pub field_pic: bool,
    pub bottom_field: bool,
    pub idr_pic_id: u32,
    pub pic_order_cnt_lsb: u32,
    pub delta_pic_order_cnt_bottom: i32,
    pub delta_pic_order_cnt: [i32; 2],
    pub redundant_pic_cnt: u32,
    pub direct_spatial_mv_pred: bool,
    pub num_ref_idx_active_override: bool,
    pub num_ref_idx_l0_active_minus1: u8,
    pub num_ref_idx_l1_active_minus1: u8,
    pub ref_pic_list_modification_l0: Vec<RefPicListModification>,
    pub ref_pic_list_modification_l1: Vec<RefPicListModification>,
    pub pred_weight_table: Option<PredWeightTable>,
    pub dec_ref_pic_marking: DecRefPicMarking,
    pub cabac_init_idc: u8,
    pub slice_qp_delta: i32,
    pub sp_for_switch: bool,
    pub slice_qs_delta: i32,
    pub disable_deblocking_filter_idc: u8,
    pub slice_alpha_c0_offset_div2: i32,
    pub slice_beta_offset_div2: i32,
}

fn read_se_bounded(r: &mut BitstreamReader<'_>, min: i32, max: i32, what: &str) -> Result<i32> {
    let value = r.read_se()?;
    if value < min || value > max {
        return Err(Error::codec(format!(
            "{} out of range: {} (expected {}..={})",
            what, value, min, max
        )));
    }
    Ok(value)
}

impl SliceHeader {
    /// Parse a slice header from its RBSP (NAL header byte excluded)
    ///
    /// An unknown PPS id, or a PPS whose SPS is missing, is a `Format` error.
    pub fn parse(rbsp: &[u8], nal: NalHeader, table: &ParameterSetTable) -> Result<Self> {
        if !nal.nal_unit_type.is_slice() {
            return Err(Error::codec(format!(
                "{:?} NAL does not carry a slice header",
                nal.nal_unit_type
            )));
        }
        let is_idr = nal.nal_unit_type.is_idr();
        let mut r = BitstreamReader::new(rbsp);

        let mut header = SliceHeader {
            first_mb_in_slice: r.read_ue()?,
            slice_type: SliceType::from_u32(r.read_ue_max(9, "slice_type")?)?,
            pic_parameter_set_id: r.read_ue_max(255, "pic_parameter_set_id")? as u8,
            ..Default::default()
        };

        let (pps, sps) = table.active(header.pic_parameter_set_id)?;

        if is_idr && !header.slice_type.is_intra() {
            return Err(Error::codec(format!(
                "IDR slice with slice_type {:?}",
                header.slice_type
            )));
        }

        if sps.separate_colour_plane {
            header.colour_plane_id = r.read_bits(2)? as u8;
        }

        header.frame_num = r.read_bits(sps.frame_num_bits())?;

        if !sps.frame_mbs_only {
            header.field_pic = r.read_bool()?;
            if header.field_pic {
                header.bottom_field = r.read_bool()?;
            }
        }

        if is_idr {
            header.idr_pic_id = r.read_ue_max(0xFFFF, "idr_pic_id")?;
        }

        if sps.pic_order_cnt_type == 0 {
            header.pic_order_cnt_lsb = r.read_bits(sps.pic_order_cnt_lsb_bits())?;
            if pps.bottom_field_pic_order_in_frame_present && !header.field_pic {
                header.delta_pic_order_cnt_bottom = r.read_se()?;
            }
        }

        if sps.pic_order_cnt_type == 1 && !sps.delta_pic_order_always_zero {
            header.delta_pic_order_cnt[0] = r.read_se()?;
            if pps.bottom_field_pic_order_in_frame_present && !header.field_pic {
                header.delta_pic_order_cnt[1] = r.read_se()?;
            }
        }

        if pps.redundant_pic_cnt_present {
            header.redundant_pic_cnt = r.read_ue_max(127, "redundant_pic_cnt")?;
        }

        if header.slice_type.is_b() {
            header.direct_spatial_mv_pred = r.read_bool()?;
        }

        if header.slice_type.has_references() {
            header.num_ref_idx_active_override = r.read_bool()?;
            if header.num_ref_idx_active_override {
                header.num_ref_idx_l0_active_minus1 =
                    r.read_ue_max(31, "num_ref_idx_l0_active_minus1")? as u8;
                if header.slice_type.is_b() {
                    header.num_ref_idx_l1_active_minus1 =
                        r.read_ue_max(31, "num_ref_idx_l1_active_minus1")? as u8;
                }
            } else {
                header.num_ref_idx_l0_active_minus1 = pps.num_ref_idx_l0_default_active_minus1;
                if header.slice_type.is_b() {
                    header.num_ref_idx_l1_active_minus1 =
                        pps.num_ref_idx_l1_default_active_minus1;
                }
            }
        }

        let max_idx = if header.field_pic { 31 } else { 15 };
        if header.num_ref_idx_l0_active_minus1 > max_idx
            || header.num_ref_idx_l1_active_minus1 > max_idx
        {
            return Err(Error::codec("num_ref_idx_active_minus1 out of range"));
        }

        if !header.slice_type.is_intra() && r.read_bool()? {
            header.ref_pic_list_modification_l0 = Self::read_list_modification(&mut r)?;
        }
        if header.slice_type.is_b() && r.read_bool()? {
            header.ref_pic_list_modification_l1 = Self::read_list_modification(&mut r)?;
        }

        let explicit_weights = (pps.weighted_pred
            && matches!(header.slice_type, SliceType::P | SliceType::Sp))
            || (pps.weighted_bipred_idc == 1 && header.slice_type.is_b());
        if explicit_weights {
            header.pred_weight_table = Some(Self::read_pred_weight_table(&mut r, sps, &header)?);
        }

        if nal.is_reference() {
            header.dec_ref_pic_marking = Self::read_dec_ref_pic_marking(&mut r, is_idr)?;
        }

        if pps.entropy_coding_mode && !header.slice_type.is_intra() {
            header.cabac_init_idc = r.read_ue_max(2, "cabac_init_idc")? as u8;
        }

        header.slice_qp_delta = read_se_bounded(&mut r, -87, 77, "slice_qp_delta")?;

        if matches!(header.slice_type, SliceType::Sp | SliceType::Si) {
            if header.slice_type == SliceType::Sp {
                header.sp_for_switch = r.read_bool()?;
            }
            header.slice_qs_delta = read_se_bounded(&mut r, -51, 51, "slice_qs_delta")?;
        }

        if pps.deblocking_filter_control_present {
            header.disable_deblocking_filter_idc =
                r.read_ue_max(2, "disable_deblocking_filter_idc")? as u8;
            if header.disable_deblocking_filter_idc != 1 {
                header.slice_alpha_c0_offset_div2 =
                    read_se_bounded(&mut r, -6, 6, "slice_alpha_c0_offset_div2")?;
                header.slice_beta_offset_div2 =
                    read_se_bounded(&mut r, -6, 6, "slice_beta_offset_div2")?;
            }
        }

        Ok(header)
    }

    /// Parse the header of a slice NAL borrowed from a sample
    pub fn from_nal(unit: &NalUnit<'_>, table: &ParameterSetTable) -> Result<Self> {
        let rbsp = remove_emulation_prevention(unit.payload());
        Self::parse(&rbsp, unit.header, table)
    }

    fn read_list_modification(r: &mut BitstreamReader<'_>) -> Result<Vec<RefPicListModification>> {
        let mut mods = Vec::new();
        loop {
            let mut m = RefPicListModification {
                modification_of_pic_nums_idc: r.read_ue_max(5, "modification_of_pic_nums_idc")?
                    as u8,
                ..Default::default()
            };
            match m.modification_of_pic_nums_idc {
                0 | 1 => m.abs_diff_pic_num_minus1 = r.read_ue()?,
                2 => m.long_term_pic_num = r.read_ue()?,
                3 => break,
                // 4 and 5 belong to MVC extensions
                other => {
                    return Err(Error::unsupported(format!(
                        "modification_of_pic_nums_idc {}",
                        other
                    )))
                }
            }
            if mods.len() > 32 {
                return Err(Error::codec("Too many reference list modifications"));
            }
            mods.push(m);
        }
        Ok(mods)
    }

    fn read_weights(
        r: &mut BitstreamReader<'_>,
        count: u8,
        chroma: bool,
    ) -> Result<Vec<WeightEntry>> {
        let mut entries = Vec::with_capacity(usize::from(count) + 1);
        for _ in 0..=count {
            let mut entry = WeightEntry::default();
            if r.read_bool()? {
                entry.luma = Some((
                    read_se_bounded(r, -128, 127, "luma_weight")?,
                    read_se_bounded(r, -128, 127, "luma_offset")?,
                ));
            }
            if chroma && r.read_bool()? {
                let mut pairs = [(0, 0); 2];
                for pair in pairs.iter_mut() {
                    *pair = (
                        read_se_bounded(r, -128, 127, "chroma_weight")?,
                        read_se_bounded(r, -128, 127, "chroma_offset")?,
                    );
                }
                entry.chroma = Some(pairs);
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn read_pred_weight_table(
        r: &mut BitstreamReader<'_>,
        sps: &Sps,
        header: &SliceHeader,
    ) -> Result<PredWeightTable> {
        let chroma = sps.chroma_array_type() != 0;
        let mut table = PredWeightTable {
            luma_log2_weight_denom: r.read_ue_max(7, "luma_log2_weight_denom")? as u8,
            ..Default::default()
        };
        if chroma {
            table.chroma_log2_weight_denom = r.read_ue_max(7, "chroma_log2_weight_denom")? as u8;
        }
        table.l0 = Self::read_weights(r, header.num_ref_idx_l0_active_minus1, chroma)?;
        if header.slice_type.is_b() {
            table.l1 = Self::read_weights(r, header.num_ref_idx_l1_active_minus1, chroma)?;
        }
        Ok(table)
    }

    fn read_dec_ref_pic_marking(r: &mut BitstreamReader<'_>, is_idr: bool) -> Result<DecRefPicMarking> {
        let mut marking = DecRefPicMarking::default();

        if is_idr {
            marking.no_output_of_prior_pics = r.read_bool()?;
            marking.long_term_reference = r.read_bool()?;
            return Ok(marking);
        }

        marking.adaptive_ref_pic_marking_mode = r.read_bool()?;
        if !marking.adaptive_ref_pic_marking_mode {
            return Ok(marking);
        }

        loop {
            let operation = r.read_ue_max(6, "memory_management_control_operation")? as u8;
            if operation == 0 {
                break;
            }
            let mut op = MemoryManagementOperation {
                operation,
                ..Default::default()
            };
            if operation == 1 || operation == 3 {
                op.difference_of_pic_nums_minus1 = r.read_ue()?;
            }
            if operation == 2 {
                op.long_term_pic_num = r.read_ue()?;
            }
            if operation == 3 || operation == 6 {
                op.long_term_frame_idx = r.read_ue()?;
            }
            if operation == 4 {
                op.max_long_term_frame_idx_plus1 = r.read_ue()?;
            }
            if marking.operations.len() > 64 {
                return Err(Error::codec("Too many memory management operations"));
            }
            marking.operations.push(op);
        }

        Ok(marking)
    }

    /// MaxPicNum for this picture
    pub fn max_pic_num(&self, sps: &Sps) -> u32 {
        if self.field_pic {
            2 * sps.max_frame_num()
        } else {
            sps.max_frame_num()
        }
    }
}
