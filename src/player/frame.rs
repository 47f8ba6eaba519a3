//! Per-frame decode metadata

use serde::Serialize;

use crate::codec::h264::{display_ranks, FrameType, NalUnitType, SliceHeader};

/// Everything the player needs to stage, decode and time one frame
///
/// Built once at load time in decode order and never modified afterwards,
/// except for `display_order` which [`assign_display_order`] fills in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDescriptor {
    /// Index in container (decode) order
    pub decode_order: u32,
    /// Rank by `(gop_cycle, poc)`
    pub display_order: u32,
    pub poc: i32,
    pub gop_cycle: i32,
    pub field_order_cnt: [i32; 2],
    pub frame_type: FrameType,
    pub nal_unit_type: NalUnitType,
    /// `nal_ref_idc` of the first slice; zero means not kept as reference
    pub reference_priority: u8,
    pub frame_num: u32,
    pub idr_pic_id: u32,
    pub sps_id: u8,
    pub pps_id: u8,
    /// Location of the whole sample in the source
    pub src_byte_offset: u64,
    pub src_byte_size: u32,
    /// Start code plus first slice NAL, as staged
    pub slice_size: u32,
    pub dts_seconds: f64,
    pub pts_seconds: f64,
    pub duration_seconds: f64,
    #[serde(skip)]
    pub slice_header: SliceHeader,
}

impl FrameDescriptor {
    pub fn is_reference(&self) -> bool {
        self.reference_priority > 0
    }

    pub fn is_idr(&self) -> bool {
        self.nal_unit_type.is_idr()
    }

    /// Display sort key
    pub fn order_key(&self) -> (i32, i32) {
        (self.gop_cycle, self.poc)
    }
}

/// Write each frame's display rank into `display_order`
///
/// Stable: frames with equal `(gop_cycle, poc)` keep their decode order, so
/// applying this twice gives the same ranks.
pub fn assign_display_order(frames: &mut [FrameDescriptor]) {
    let keys: Vec<(i32, i32)> = frames.iter().map(FrameDescriptor::order_key).collect();
    for (frame, rank) in frames.iter_mut().zip(display_ranks(&keys)) {
        frame.display_order = rank;
    }
}
