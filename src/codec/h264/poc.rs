//! Picture order count derivation (8.2.1)
//!
//! The resolver runs once over the whole stream at load time, in decode order.
//! Each picture gets a POC plus a GOP cycle counter that increases at every
//! IDR, so `(gop_cycle, poc)` orders pictures across the whole stream.

use serde::Serialize;

use super::headers::Sps;
use super::nal::NalHeader;
use super::slice::SliceHeader;
use crate::error::{Error, Result};

/// Picture order of one decoded picture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PictureOrder {
    pub poc: i32,
    pub gop_cycle: i32,
    /// TopFieldOrderCnt, BottomFieldOrderCnt
    pub field_order_cnt: [i32; 2],
}

impl PictureOrder {
    /// Display sort key
    pub fn key(&self) -> (i32, i32) {
        (self.gop_cycle, self.poc)
    }
}

/// Stateful POC calculator for types 0 and 2
#[derive(Debug, Clone)]
pub struct PictureOrderResolver {
    gop_cycle: i32,
    prev_poc_msb: i32,
    prev_poc_lsb: i32,
    prev_frame_num: u32,
    prev_frame_num_offset: i32,
    /// The previous reference picture carried memory_management_control_operation 5
    prev_had_mmco5: bool,
}

impl Default for PictureOrderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PictureOrderResolver {
    pub fn new() -> Self {
        PictureOrderResolver {
            gop_cycle: -1,
            prev_poc_msb: 0,
            prev_poc_lsb: 0,
            prev_frame_num: 0,
            prev_frame_num_offset: 0,
            prev_had_mmco5: false,
        }
    }

    /// Current GOP cycle (-1 before the first IDR)
    pub fn gop_cycle(&self) -> i32 {
        self.gop_cycle
    }

    /// Compute the order of the picture whose first slice is `slice`
    pub fn compute(
        &mut self,
        slice: &SliceHeader,
        sps: &Sps,
        nal: NalHeader,
    ) -> Result<PictureOrder> {
        let is_idr = nal.nal_unit_type.is_idr();

        if self.prev_had_mmco5 && !is_idr {
            // memory management reset: order restarts without an IDR
            self.gop_cycle += 1;
        }

        let order = match sps.pic_order_cnt_type {
            0 => self.compute_type0(slice, sps, nal, is_idr),
            2 => self.compute_type2(slice, sps, nal, is_idr),
            other => {
                return Err(Error::unsupported(format!(
                    "pic_order_cnt_type {}",
                    other
                )))
            }
        };

        let mmco5 = nal.is_reference() && slice.dec_ref_pic_marking.has_mmco5();
        if mmco5 {
            self.prev_poc_msb = 0;
            self.prev_poc_lsb = if slice.field_pic && slice.bottom_field {
                0
            } else {
                order.field_order_cnt[0] - order.field_order_cnt[0].min(order.field_order_cnt[1])
            };
            self.prev_frame_num = 0;
            self.prev_frame_num_offset = 0;
        }
        self.prev_had_mmco5 = mmco5;

        Ok(order)
    }

    fn compute_type0(
        &mut self,
        slice: &SliceHeader,
        sps: &Sps,
        nal: NalHeader,
        is_idr: bool,
    ) -> PictureOrder {
        // IDR is decided by the NAL unit type, not by the slice being intra
        if is_idr {
            self.prev_poc_msb = 0;
            self.prev_poc_lsb = 0;
            self.gop_cycle += 1;
        }

        let max_lsb = sps.max_pic_order_cnt_lsb() as i32;
        let lsb = slice.pic_order_cnt_lsb as i32;
        let prev_lsb = self.prev_poc_lsb;

        let msb = if lsb < prev_lsb && prev_lsb - lsb >= max_lsb / 2 {
            self.prev_poc_msb + max_lsb
        } else if lsb > prev_lsb && lsb - prev_lsb > max_lsb / 2 {
            self.prev_poc_msb - max_lsb
        } else {
            self.prev_poc_msb
        };

        let mut field_order_cnt = [0i32; 2];
        if !slice.field_pic || !slice.bottom_field {
            field_order_cnt[0] = msb + lsb;
        }
        if !slice.field_pic {
            field_order_cnt[1] = field_order_cnt[0] + slice.delta_pic_order_cnt_bottom;
        } else if slice.bottom_field {
            field_order_cnt[1] = msb + lsb;
        }

        if nal.is_reference() {
            self.prev_poc_msb = msb;
            self.prev_poc_lsb = lsb;
        }

        PictureOrder {
            poc: msb + lsb,
            gop_cycle: self.gop_cycle,
            field_order_cnt,
        }
    }

    fn compute_type2(
        &mut self,
        slice: &SliceHeader,
        sps: &Sps,
        nal: NalHeader,
        is_idr: bool,
    ) -> PictureOrder {
        let max_frame_num = sps.max_frame_num() as i32;
        let frame_num = slice.frame_num as i32;

        let frame_num_offset = if is_idr {
            0
        } else if self.prev_frame_num > slice.frame_num {
            self.prev_frame_num_offset + max_frame_num
        } else {
            self.prev_frame_num_offset
        };
        self.prev_frame_num_offset = frame_num_offset;
        self.prev_frame_num = slice.frame_num;

        let poc = if is_idr {
            0
        } else if !nal.is_reference() {
            2 * (frame_num_offset + frame_num) - 1
        } else {
            2 * (frame_num_offset + frame_num)
        };

        if poc == 0 {
            self.gop_cycle += 1;
        }

        PictureOrder {
            poc,
            gop_cycle: self.gop_cycle,
            field_order_cnt: [poc, poc],
        }
    }
}

/// Rank of each key under a stable sort, i.e. its display order
///
/// Keys are `(gop_cycle, poc)` in decode order. Equal keys keep decode order.
pub fn display_ranks(keys: &[(i32, i32)]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);

    let mut ranks = vec![0u32; keys.len()];
    for (rank, &index) in order.iter().enumerate() {
        ranks[index] = rank as u32;
    }
    ranks
}
