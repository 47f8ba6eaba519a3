//! H.264 sequence and picture parameter sets
//!
//! Parsing produces owned structs; nothing borrows from the NAL bytes once a
//! parse returns. Syntax follows ITU-T H.264 7.3.2.1 (SPS), 7.3.2.2 (PPS) and
//! Annex E (VUI/HRD).

use serde::Serialize;

use super::bitstream::BitstreamReader;
use crate::error::{Error, Result};

/// Number of SPS ids (0..=31)
pub const MAX_SPS_COUNT: usize = 32;
/// Number of PPS ids (0..=255)
pub const MAX_PPS_COUNT: usize = 256;
/// Largest picture dimension in macroblocks any level permits, minus one
const MAX_MBS_MINUS1: u32 = 1023;

const DEFAULT_4X4_INTRA: [u8; 16] = [
    6, 13, 13, 20, 20, 20, 28, 28, 28, 28, 32, 32, 32, 37, 37, 42,
];

const DEFAULT_4X4_INTER: [u8; 16] = [
    10, 14, 14, 20, 20, 20, 24, 24, 24, 24, 27, 27, 27, 30, 30, 34,
];

const DEFAULT_8X8_INTRA: [u8; 64] = [
    6, 10, 10, 13, 11, 13, 16, 16, 16, 16, 18, 18, 18, 18, 18, 23, 23, 23, 23, 23, 23, 25, 25, 25,
    25, 25, 25, 25, 27, 27, 27, 27, 27, 27, 27, 27, 29, 29, 29, 29, 29, 29, 29, 31, 31, 31, 31, 31,
    31, 33, 33, 33, 33, 33, 36, 36, 36, 36, 38, 38, 38, 40, 40, 42,
];

const DEFAULT_8X8_INTER: [u8; 64] = [
    9, 13, 13, 15, 13, 15, 17, 17, 17, 17, 19, 19, 19, 19, 19, 21, 21, 21, 21, 21, 21, 22, 22, 22,
    22, 22, 22, 22, 24, 24, 24, 24, 24, 24, 24, 24, 25, 25, 25, 25, 25, 25, 25, 27, 27, 27, 27, 27,
    27, 28, 28, 28, 28, 28, 30, 30, 30, 30, 32, 32, 32, 33, 33, 35,
];

/// Profiles that carry chroma format, bit depth and scaling matrix syntax
const HIGH_PROFILES: [u8; 13] = [100, 110, 122, 244, 44, 83, 86, 118, 128, 138, 139, 134, 135];

/// Quantization scaling matrices (4x4: Y/Cb/Cr intra then inter; 8x8: same order)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingLists {
    pub list_4x4: [[u8; 16]; 6],
    pub list_8x8: [[u8; 64]; 6],
}

impl Default for ScalingLists {
    /// Flat_4x4_16 / Flat_8x8_16
    fn default() -> Self {
        ScalingLists {
            list_4x4: [[16; 16]; 6],
            list_8x8: [[16; 64]; 6],
        }
    }
}

impl ScalingLists {
    fn default_4x4(i: usize) -> [u8; 16] {
        if i < 3 {
            DEFAULT_4X4_INTRA
        } else {
            DEFAULT_4X4_INTER
        }
    }

    fn default_8x8(i: usize) -> [u8; 64] {
        if i % 2 == 0 {
            DEFAULT_8X8_INTRA
        } else {
            DEFAULT_8X8_INTER
        }
    }

    /// scaling_list() syntax; returns `true` when the default matrix is signalled
    fn read_list(r: &mut BitstreamReader<'_>, list: &mut [u8]) -> Result<bool> {
        let mut last_scale = 8i32;
        let mut next_scale = 8i32;

        for j in 0..list.len() {
            if next_scale != 0 {
                let delta_scale = r.read_se()?;
                if !(-128..=127).contains(&delta_scale) {
                    return Err(Error::codec(format!("delta_scale out of range: {}", delta_scale)));
                }
                next_scale = (last_scale + delta_scale + 256) % 256;
                if j == 0 && next_scale == 0 {
                    return Ok(true);
                }
            }
            list[j] = if next_scale == 0 { last_scale } else { next_scale } as u8;
            last_scale = i32::from(list[j]);
        }

        Ok(false)
    }

    /// Read the 4x4 and 8x8 lists, applying fall-back rule A (`fallback` is
    /// `None`) or rule B (fall back to the given sequence-level lists)
    fn read(
        r: &mut BitstreamReader<'_>,
        num_8x8: usize,
        fallback: Option<&ScalingLists>,
    ) -> Result<Self> {
        let mut lists = ScalingLists::default();

        for i in 0..6 {
            if r.read_bool()? {
                if Self::read_list(r, &mut lists.list_4x4[i])? {
                    lists.list_4x4[i] = Self::default_4x4(i);
                }
            } else {
                lists.list_4x4[i] = match (i, fallback) {
                    (0, None) => DEFAULT_4X4_INTRA,
                    (3, None) => DEFAULT_4X4_INTER,
                    (0, Some(seq)) => seq.list_4x4[0],
                    (3, Some(seq)) => seq.list_4x4[3],
                    _ => lists.list_4x4[i - 1],
                };
            }
        }

        for i in 0..num_8x8 {
            if r.read_bool()? {
                if Self::read_list(r, &mut lists.list_8x8[i])? {
                    lists.list_8x8[i] = Self::default_8x8(i);
                }
            } else {
                lists.list_8x8[i] = match (i, fallback) {
                    (0, None) => DEFAULT_8X8_INTRA,
                    (1, None) => DEFAULT_8X8_INTER,
                    (0 | 1, Some(seq)) => seq.list_8x8[i],
                    _ => lists.list_8x8[i - 2],
                };
            }
        }

        Ok(lists)
    }
}

/// Hypothetical reference decoder parameters (E.1.2)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HrdParameters {
    pub cpb_cnt_minus1: u8,
    pub bit_rate_scale: u8,
    pub cpb_size_scale: u8,
    pub bit_rate_value_minus1: Vec<u32>,
    pub cpb_size_value_minus1: Vec<u32>,
    pub cbr_flag: Vec<bool>,
    pub initial_cpb_removal_delay_length_minus1: u8,
    pub cpb_removal_delay_length_minus1: u8,
    pub dpb_output_delay_length_minus1: u8,
    pub time_offset_length: u8,
}

impl HrdParameters {
    fn parse(r: &mut BitstreamReader<'_>) -> Result<Self> {
        let cpb_cnt_minus1 = r.read_ue_max(31, "cpb_cnt_minus1")? as u8;
        let mut hrd = HrdParameters {
            cpb_cnt_minus1,
            bit_rate_scale: r.read_bits(4)? as u8,
            cpb_size_scale: r.read_bits(4)? as u8,
            ..Default::default()
        };

        for _ in 0..=cpb_cnt_minus1 {
            hrd.bit_rate_value_minus1.push(r.read_ue()?);
            hrd.cpb_size_value_minus1.push(r.read_ue()?);
            hrd.cbr_flag.push(r.read_bool()?);
        }

        hrd.initial_cpb_removal_delay_length_minus1 = r.read_bits(5)? as u8;
        hrd.cpb_removal_delay_length_minus1 = r.read_bits(5)? as u8;
        hrd.dpb_output_delay_length_minus1 = r.read_bits(5)? as u8;
        hrd.time_offset_length = r.read_bits(5)? as u8;
        Ok(hrd)
    }
}

/// Video usability information (E.1.1)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VuiParameters {
    pub aspect_ratio_idc: Option<u8>,
    pub sar_width: u16,
    pub sar_height: u16,
    pub overscan_appropriate: Option<bool>,
    pub video_format: u8,
    pub video_full_range: bool,
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub chroma_sample_loc_type_top_field: u8,
    pub chroma_sample_loc_type_bottom_field: u8,
    pub timing_info_present: bool,
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate: bool,
    pub nal_hrd: Option<HrdParameters>,
    pub vcl_hrd: Option<HrdParameters>,
    pub low_delay_hrd: bool,
    pub pic_struct_present: bool,
    pub bitstream_restriction: bool,
    pub motion_vectors_over_pic_boundaries: bool,
    pub max_bytes_per_pic_denom: u32,
    pub max_bits_per_mb_denom: u32,
    pub log2_max_mv_length_horizontal: u32,
    pub log2_max_mv_length_vertical: u32,
    pub max_num_reorder_frames: u32,
    pub max_dec_frame_buffering: u32,
}

impl VuiParameters {
    fn parse(r: &mut BitstreamReader<'_>) -> Result<Self> {
        let mut vui = VuiParameters {
            // unspecified, per Table E-2..E-5
            video_format: 5,
            colour_primaries: 2,
            transfer_characteristics: 2,
            matrix_coefficients: 2,
            ..Default::default()
        };

        if r.read_bool()? {
            let idc = r.read_bits(8)? as u8;
            vui.aspect_ratio_idc = Some(idc);
            if idc == 255 {
                vui.sar_width = r.read_bits(16)? as u16;
                vui.sar_height = r.read_bits(16)? as u16;
            }
        }

        if r.read_bool()? {
            vui.overscan_appropriate = Some(r.read_bool()?);
        }

        if r.read_bool()? {
            vui.video_format = r.read_bits(3)? as u8;
            vui.video_full_range = r.read_bool()?;
            if r.read_bool()? {
                vui.colour_primaries = r.read_bits(8)? as u8;
                vui.transfer_characteristics = r.read_bits(8)? as u8;
                vui.matrix_coefficients = r.read_bits(8)? as u8;
            }
        }

        if r.read_bool()? {
            vui.chroma_sample_loc_type_top_field = r.read_ue_max(5, "chroma_sample_loc_type")? as u8;
            vui.chroma_sample_loc_type_bottom_field =
                r.read_ue_max(5, "chroma_sample_loc_type")? as u8;
        }

        vui.timing_info_present = r.read_bool()?;
        if vui.timing_info_present {
            vui.num_units_in_tick = r.read_bits(32)?;
            vui.time_scale = r.read_bits(32)?;
            if vui.num_units_in_tick == 0 || vui.time_scale == 0 {
                return Err(Error::codec("VUI timing info with zero num_units_in_tick or time_scale"));
            }
            vui.fixed_frame_rate = r.read_bool()?;
        }

        if r.read_bool()? {
            vui.nal_hrd = Some(HrdParameters::parse(r)?);
        }
        if r.read_bool()? {
            vui.vcl_hrd = Some(HrdParameters::parse(r)?);
        }
        if vui.nal_hrd.is_some() || vui.vcl_hrd.is_some() {
            vui.low_delay_hrd = r.read_bool()?;
        }

        vui.pic_struct_present = r.read_bool()?;
        vui.bitstream_restriction = r.read_bool()?;
        if vui.bitstream_restriction {
            vui.motion_vectors_over_pic_boundaries = r.read_bool()?;
            vui.max_bytes_per_pic_denom = r.read_ue_max(16, "max_bytes_per_pic_denom")?;
            vui.max_bits_per_mb_denom = r.read_ue_max(16, "max_bits_per_mb_denom")?;
            vui.log2_max_mv_length_horizontal = r.read_ue_max(16, "log2_max_mv_length")?;
            vui.log2_max_mv_length_vertical = r.read_ue_max(16, "log2_max_mv_length")?;
            vui.max_num_reorder_frames = r.read_ue()?;
            vui.max_dec_frame_buffering = r.read_ue()?;
        }

        Ok(vui)
    }

    /// Frame rate implied by the timing info, if present
    pub fn frame_rate(&self) -> Option<f64> {
        if !self.timing_info_present {
            return None;
        }
        Some(f64::from(self.time_scale) / (2.0 * f64::from(self.num_units_in_tick)))
    }
}

/// Sequence parameter set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sps {
    pub profile_idc: u8,
    /// constraint_set0..5 flags, MSB first as coded
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub seq_parameter_set_id: u8,

    pub chroma_format_idc: u8,
    pub separate_colour_plane: bool,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub qpprime_y_zero_transform_bypass: bool,
    pub seq_scaling_matrix_present: bool,
    #[serde(skip)]
    pub scaling_lists: ScalingLists,

    pub log2_max_frame_num_minus4: u8,
    pub pic_order_cnt_type: u8,
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    pub delta_pic_order_always_zero: bool,
    pub offset_for_non_ref_pic: i32,
    pub offset_for_top_to_bottom_field: i32,
    pub offset_for_ref_frame: Vec<i32>,

    pub max_num_ref_frames: u32,
    pub gaps_in_frame_num_allowed: bool,
    pub pic_width_in_mbs_minus1: u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_only: bool,
    pub mb_adaptive_frame_field: bool,
    pub direct_8x8_inference: bool,

    pub frame_cropping: bool,
    pub frame_crop_left_offset: u32,
    pub frame_crop_right_offset: u32,
    pub frame_crop_top_offset: u32,
    pub frame_crop_bottom_offset: u32,

    pub vui: Option<VuiParameters>,
}

impl Sps {
    /// Parse an SPS RBSP (NAL header byte excluded, emulation prevention removed)
    pub fn parse(rbsp: &[u8]) -> Result<Self> {
        let mut r = BitstreamReader::new(rbsp);

        let mut sps = Sps {
            profile_idc: r.read_bits(8)? as u8,
            constraint_flags: r.read_bits(8)? as u8,
            level_idc: r.read_bits(8)? as u8,
            seq_parameter_set_id: r.read_ue_max(MAX_SPS_COUNT as u32 - 1, "seq_parameter_set_id")?
                as u8,
            chroma_format_idc: 1,
            ..Default::default()
        };

        if HIGH_PROFILES.contains(&sps.profile_idc) {
            sps.chroma_format_idc = r.read_ue_max(3, "chroma_format_idc")? as u8;
            if sps.chroma_format_idc == 3 {
                sps.separate_colour_plane = r.read_bool()?;
            }
            sps.bit_depth_luma_minus8 = r.read_ue_max(6, "bit_depth_luma_minus8")? as u8;
            sps.bit_depth_chroma_minus8 = r.read_ue_max(6, "bit_depth_chroma_minus8")? as u8;
            sps.qpprime_y_zero_transform_bypass = r.read_bool()?;
            sps.seq_scaling_matrix_present = r.read_bool()?;
            if sps.seq_scaling_matrix_present {
                let num_8x8 = if sps.chroma_format_idc != 3 { 2 } else { 6 };
                sps.scaling_lists = ScalingLists::read(&mut r, num_8x8, None)?;
            }
        }

        sps.log2_max_frame_num_minus4 = r.read_ue_max(12, "log2_max_frame_num_minus4")? as u8;
        sps.pic_order_cnt_type = r.read_ue_max(2, "pic_order_cnt_type")? as u8;

        match sps.pic_order_cnt_type {
            0 => {
                sps.log2_max_pic_order_cnt_lsb_minus4 =
                    r.read_ue_max(12, "log2_max_pic_order_cnt_lsb_minus4")? as u8;
            }
            1 => {
                sps.delta_pic_order_always_zero = r.read_bool()?;
                sps.offset_for_non_ref_pic = r.read_se()?;
                sps.offset_for_top_to_bottom_field = r.read_se()?;
                let cycle = r.read_ue_max(255, "num_ref_frames_in_pic_order_cnt_cycle")?;
                for _ in 0..cycle {
                    sps.offset_for_ref_frame.push(r.read_se()?);
                }
            }
            _ => {}
        }

        sps.max_num_ref_frames = r.read_ue_max(16, "max_num_ref_frames")?;
        sps.gaps_in_frame_num_allowed = r.read_bool()?;
        sps.pic_width_in_mbs_minus1 = r.read_ue_max(MAX_MBS_MINUS1, "pic_width_in_mbs_minus1")?;
        sps.pic_height_in_map_units_minus1 =
            r.read_ue_max(MAX_MBS_MINUS1, "pic_height_in_map_units_minus1")?;
        sps.frame_mbs_only = r.read_bool()?;
        if !sps.frame_mbs_only {
            sps.mb_adaptive_frame_field = r.read_bool()?;
        }
        sps.direct_8x8_inference = r.read_bool()?;

        sps.frame_cropping = r.read_bool()?;
        if sps.frame_cropping {
            sps.frame_crop_left_offset = r.read_ue()?;
            sps.frame_crop_right_offset = r.read_ue()?;
            sps.frame_crop_top_offset = r.read_ue()?;
            sps.frame_crop_bottom_offset = r.read_ue()?;
        }

        if r.read_bool()? {
            sps.vui = Some(VuiParameters::parse(&mut r)?);
        }

        let (crop_x, crop_y) = sps.crop_units();
        let crop_w = sps
            .frame_crop_left_offset
            .checked_add(sps.frame_crop_right_offset)
            .and_then(|sum| sum.checked_mul(crop_x))
            .ok_or_else(|| Error::codec("SPS horizontal crop offsets overflow"))?;
        let crop_h = sps
            .frame_crop_top_offset
            .checked_add(sps.frame_crop_bottom_offset)
            .and_then(|sum| sum.checked_mul(crop_y))
            .ok_or_else(|| Error::codec("SPS vertical crop offsets overflow"))?;
        if crop_w >= sps.coded_width() || crop_h >= sps.coded_height() {
            return Err(Error::codec("SPS cropping removes the whole picture"));
        }

        Ok(sps)
    }

    /// ChromaArrayType: 0 for monochrome or separately coded planes
    pub fn chroma_array_type(&self) -> u8 {
        if self.separate_colour_plane {
            0
        } else {
            self.chroma_format_idc
        }
    }

    /// CropUnitX / CropUnitY (7-19 .. 7-22)
    pub fn crop_units(&self) -> (u32, u32) {
        let frame_factor = if self.frame_mbs_only { 1 } else { 2 };
        match self.chroma_array_type() {
            0 => (1, frame_factor),
            1 => (2, 2 * frame_factor),
            2 => (2, frame_factor),
            _ => (1, frame_factor),
        }
    }

    /// Width of the coded picture in luma samples (macroblock aligned)
    pub fn coded_width(&self) -> u32 {
        self.pic_width_in_mbs_minus1.saturating_add(1).saturating_mul(16)
    }

    /// Height of the coded frame in luma samples (macroblock aligned)
    pub fn coded_height(&self) -> u32 {
        let field_factor = if self.frame_mbs_only { 1 } else { 2 };
        self.pic_height_in_map_units_minus1
            .saturating_add(1)
            .saturating_mul(16 * field_factor)
    }

    /// Display width after cropping
    pub fn width(&self) -> u32 {
        let (crop_x, _) = self.crop_units();
        let crop = self
            .frame_crop_left_offset
            .saturating_add(self.frame_crop_right_offset)
            .saturating_mul(crop_x);
        self.coded_width().saturating_sub(crop)
    }

    /// Display height after cropping
    pub fn height(&self) -> u32 {
        let (_, crop_y) = self.crop_units();
        let crop = self
            .frame_crop_top_offset
            .saturating_add(self.frame_crop_bottom_offset)
            .saturating_mul(crop_y);
        self.coded_height().saturating_sub(crop)
    }

    /// MaxFrameNum
    pub fn max_frame_num(&self) -> u32 {
        1 << (self.log2_max_frame_num_minus4 + 4)
    }

    /// MaxPicOrderCntLsb
    pub fn max_pic_order_cnt_lsb(&self) -> u32 {
        1 << (self.log2_max_pic_order_cnt_lsb_minus4 + 4)
    }

    /// Bits used by frame_num in slice headers
    pub fn frame_num_bits(&self) -> u32 {
        u32::from(self.log2_max_frame_num_minus4) + 4
    }

    /// Bits used by pic_order_cnt_lsb in slice headers
    pub fn pic_order_cnt_lsb_bits(&self) -> u32 {
        u32::from(self.log2_max_pic_order_cnt_lsb_minus4) + 4
    }

    /// DPB slots needed to hold every reference plus the picture being decoded
    /// with headroom for output delay: `2 * max_num_ref_frames + 1`
    pub fn required_dpb_slots(&self) -> u32 {
        self.max_num_ref_frames * 2 + 1
    }
}

/// Picture parameter set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pps {
    pub pic_parameter_set_id: u8,
    pub seq_parameter_set_id: u8,
    pub entropy_coding_mode: bool,
    pub bottom_field_pic_order_in_frame_present: bool,
    pub num_slice_groups_minus1: u32,
    pub num_ref_idx_l0_default_active_minus1: u8,
    pub num_ref_idx_l1_default_active_minus1: u8,
    pub weighted_pred: bool,
    pub weighted_bipred_idc: u8,
    pub pic_init_qp_minus26: i32,
    pub pic_init_qs_minus26: i32,
    pub chroma_qp_index_offset: i32,
    pub deblocking_filter_control_present: bool,
    pub constrained_intra_pred: bool,
    pub redundant_pic_cnt_present: bool,
    pub transform_8x8_mode: bool,
    pub pic_scaling_matrix_present: bool,
    #[serde(skip)]
    pub scaling_lists: ScalingLists,
    pub second_chroma_qp_index_offset: i32,
}

impl Pps {
    /// Parse a PPS RBSP; `lookup_sps` resolves the referenced SPS id
    pub fn parse<'s, F>(rbsp: &[u8], lookup_sps: F) -> Result<Self>
    where
        F: FnOnce(u8) -> Option<&'s Sps>,
    {
        let mut r = BitstreamReader::new(rbsp);

        let pic_parameter_set_id =
            r.read_ue_max(MAX_PPS_COUNT as u32 - 1, "pic_parameter_set_id")? as u8;
        let seq_parameter_set_id =
            r.read_ue_max(MAX_SPS_COUNT as u32 - 1, "seq_parameter_set_id")? as u8;

        let sps = lookup_sps(seq_parameter_set_id).ok_or_else(|| {
            Error::codec(format!(
                "PPS {} references unknown SPS {}",
                pic_parameter_set_id, seq_parameter_set_id
            ))
        })?;

        let mut pps = Pps {
            pic_parameter_set_id,
            seq_parameter_set_id,
            entropy_coding_mode: r.read_bool()?,
            bottom_field_pic_order_in_frame_present: r.read_bool()?,
            num_slice_groups_minus1: r.read_ue_max(7, "num_slice_groups_minus1")?,
            ..Default::default()
        };

        if pps.num_slice_groups_minus1 > 0 {
            return Err(Error::unsupported("PPS with multiple slice groups (FMO)"));
        }

        pps.num_ref_idx_l0_default_active_minus1 =
            r.read_ue_max(31, "num_ref_idx_l0_default_active_minus1")? as u8;
        pps.num_ref_idx_l1_default_active_minus1 =
            r.read_ue_max(31, "num_ref_idx_l1_default_active_minus1")? as u8;
        pps.weighted_pred = r.read_bool()?;
        pps.weighted_bipred_idc = r.read_bits(2)? as u8;
        pps.pic_init_qp_minus26 = r.read_se()?;
        pps.pic_init_qs_minus26 = r.read_se()?;
        pps.chroma_qp_index_offset = r.read_se()?;
        if !(-12..=12).contains(&pps.chroma_qp_index_offset) {
            return Err(Error::codec(format!(
                "chroma_qp_index_offset out of range: {}",
                pps.chroma_qp_index_offset
            )));
        }
        pps.second_chroma_qp_index_offset = pps.chroma_qp_index_offset;
        pps.deblocking_filter_control_present = r.read_bool()?;
        pps.constrained_intra_pred = r.read_bool()?;
        pps.redundant_pic_cnt_present = r.read_bool()?;

        if r.more_rbsp_data() {
            pps.transform_8x8_mode = r.read_bool()?;
            pps.pic_scaling_matrix_present = r.read_bool()?;
            if pps.pic_scaling_matrix_present {
                let num_8x8 = if !pps.transform_8x8_mode {
                    0
                } else if sps.chroma_format_idc != 3 {
                    2
                } else {
                    6
                };
                let fallback = sps.seq_scaling_matrix_present.then_some(&sps.scaling_lists);
                pps.scaling_lists = ScalingLists::read(&mut r, num_8x8, fallback)?;
            }
            pps.second_chroma_qp_index_offset = r.read_se()?;
        }

        if !pps.pic_scaling_matrix_present {
            pps.scaling_lists = sps.scaling_lists.clone();
        }

        Ok(pps)
    }
}
