//! Common test utilities for avcplay integration tests
//!
//! Builds small synthetic H.264 streams: a baseline SPS/PPS pair and
//! length-prefixed slice samples with just enough header syntax for the
//! player to order and schedule them. Slice data past the header is never
//! looked at.

#![allow(dead_code)]

use avcplay_lib::codec::h264::writer::{build_nal, write_length_prefixed};
use avcplay_lib::codec::h264::{BitstreamWriter, NalHeader, NalUnitType};
use avcplay_lib::format::{MemorySource, MemorySourceBuilder};

// ============================================================================
// Parameter Sets
// ============================================================================

/// Stream-wide settings shared by the SPS and every slice
#[derive(Debug, Clone, Copy)]
pub struct StreamParams {
    pub width_mbs: u32,
    pub height_mbs: u32,
    pub num_ref_frames: u32,
    /// 0 (explicit lsb) or 2 (derived from frame_num)
    pub poc_type: u32,
    pub profile_idc: u8,
}

impl Default for StreamParams {
    fn default() -> Self {
        StreamParams {
            width_mbs: 4,
            height_mbs: 3,
            num_ref_frames: 1,
            poc_type: 2,
            profile_idc: 66,
        }
    }
}

impl StreamParams {
    pub fn width(&self) -> u32 {
        self.width_mbs * 16
    }

    pub fn height(&self) -> u32 {
        self.height_mbs * 16
    }
}

/// Build an SPS NAL (header byte included, emulation prevention applied)
///
/// log2_max_frame_num and log2_max_pic_order_cnt_lsb are both 4 bits.
pub fn sps_nal(params: &StreamParams) -> Vec<u8> {
    let mut w = BitstreamWriter::new();
    w.write_bits(params.profile_idc as u32, 8);
    w.write_bits(0, 8); // constraint flags
    w.write_bits(30, 8); // level_idc
    w.write_ue(0); // seq_parameter_set_id
    w.write_ue(0); // log2_max_frame_num_minus4
    w.write_ue(params.poc_type);
    if params.poc_type == 0 {
        w.write_ue(0); // log2_max_pic_order_cnt_lsb_minus4
    }
    w.write_ue(params.num_ref_frames);
    w.write_bit(false); // gaps_in_frame_num_allowed
    w.write_ue(params.width_mbs - 1);
    w.write_ue(params.height_mbs - 1);
    w.write_bit(true); // frame_mbs_only
    w.write_bit(true); // direct_8x8_inference
    w.write_bit(false); // frame_cropping
    w.write_bit(false); // vui_parameters_present
    build_nal(NalHeader::new(3, NalUnitType::Sps), &w.finish())
}

/// Build a CAVLC PPS NAL referring to SPS 0
pub fn pps_nal() -> Vec<u8> {
    let mut w = BitstreamWriter::new();
    w.write_ue(0); // pic_parameter_set_id
    w.write_ue(0); // seq_parameter_set_id
    w.write_bit(false); // entropy_coding_mode
    w.write_bit(false); // bottom_field_pic_order_in_frame_present
    w.write_ue(0); // num_slice_groups_minus1
    w.write_ue(0); // num_ref_idx_l0_default_active_minus1
    w.write_ue(0); // num_ref_idx_l1_default_active_minus1
    w.write_bit(false); // weighted_pred
    w.write_bits(0, 2); // weighted_bipred_idc
    w.write_se(0); // pic_init_qp_minus26
    w.write_se(0); // pic_init_qs_minus26
    w.write_se(0); // chroma_qp_index_offset
    w.write_bit(true); // deblocking_filter_control_present
    w.write_bit(false); // constrained_intra_pred
    w.write_bit(false); // redundant_pic_cnt_present
    build_nal(NalHeader::new(3, NalUnitType::Pps), &w.finish())
}

// ============================================================================
// Slices
// ============================================================================

/// Coding of one synthetic picture
#[derive(Debug, Clone, Copy)]
pub struct PictureSpec {
    pub idr: bool,
    pub nal_ref_idc: u8,
    pub frame_num: u32,
    /// pic_order_cnt_lsb, only written for POC type 0
    pub poc_lsb: u32,
    pub b_slice: bool,
    /// Ticks in the source's timescale
    pub duration: u32,
}

impl PictureSpec {
    pub fn idr(duration: u32) -> Self {
        PictureSpec {
            idr: true,
            nal_ref_idc: 3,
            frame_num: 0,
            poc_lsb: 0,
            b_slice: false,
            duration,
        }
    }

    pub fn p(frame_num: u32, poc_lsb: u32, duration: u32) -> Self {
        PictureSpec {
            idr: false,
            nal_ref_idc: 2,
            frame_num,
            poc_lsb,
            b_slice: false,
            duration,
        }
    }

    pub fn non_ref(mut self) -> Self {
        self.nal_ref_idc = 0;
        self
    }

    pub fn b(mut self) -> Self {
        self.b_slice = true;
        self
    }
}

/// Slice NAL for `picture`, with `payload_len` filler bytes after the header
pub fn slice_nal(params: &StreamParams, picture: &PictureSpec, payload_len: usize) -> Vec<u8> {
    let nal_type = if picture.idr {
        NalUnitType::IdrSlice
    } else {
        NalUnitType::Slice
    };
    let slice_type = if picture.idr {
        7
    } else if picture.b_slice {
        6
    } else {
        5
    };

    let mut w = BitstreamWriter::new();
    w.write_ue(0); // first_mb_in_slice
    w.write_ue(slice_type);
    w.write_ue(0); // pic_parameter_set_id
    w.write_bits(picture.frame_num & 0xF, 4);
    if picture.idr {
        w.write_ue(0); // idr_pic_id
    }
    if params.poc_type == 0 {
        w.write_bits(picture.poc_lsb & 0xF, 4);
    }
    if picture.b_slice {
        w.write_bit(true); // direct_spatial_mv_pred
    }
    if !picture.idr {
        w.write_bit(false); // num_ref_idx_active_override
        w.write_bit(false); // ref_pic_list_modification_flag_l0
        if picture.b_slice {
            w.write_bit(false); // ref_pic_list_modification_flag_l1
        }
    }
    if picture.nal_ref_idc != 0 {
        if picture.idr {
            w.write_bit(false); // no_output_of_prior_pics
            w.write_bit(false); // long_term_reference
        } else {
            w.write_bit(false); // adaptive_ref_pic_marking_mode
        }
    }
    w.write_se(0); // slice_qp_delta
    w.write_ue(1); // disable_deblocking_filter_idc

    let mut rbsp = w.finish();
    rbsp.extend((0..payload_len).map(|i| 0x40 | (i as u8 & 0x3F)));
    build_nal(NalHeader::new(picture.nal_ref_idc, nal_type), &rbsp)
}

/// One length-prefixed sample holding a single slice
pub fn slice_sample(params: &StreamParams, picture: &PictureSpec) -> Vec<u8> {
    let mut sample = Vec::new();
    write_length_prefixed(&mut sample, &slice_nal(params, picture, 16));
    sample
}

// ============================================================================
// Sources
// ============================================================================

/// Builder with SPS/PPS and one sample per picture, timescale 1000
pub fn source_builder(params: &StreamParams, pictures: &[PictureSpec]) -> MemorySourceBuilder {
    let mut builder = MemorySource::builder(params.width(), params.height(), 1000)
        .sps(sps_nal(params))
        .pps(pps_nal());
    for picture in pictures {
        builder = builder.sample(&slice_sample(params, picture), picture.duration, picture.idr);
    }
    builder
}

pub fn build_source(params: &StreamParams, pictures: &[PictureSpec]) -> MemorySource {
    source_builder(params, pictures).build()
}

/// IDR followed by `count - 1` reference P frames, all `duration` ticks
pub fn ip_sequence(count: u32, duration: u32) -> Vec<PictureSpec> {
    (0..count)
        .map(|i| {
            if i == 0 {
                PictureSpec::idr(duration)
            } else {
                PictureSpec::p(i, 0, duration)
            }
        })
        .collect()
}
