//! Stream loading
//!
//! One pass over the source in decode order: register parameter sets,
//! parse the first slice header of every sample, derive picture order, and
//! produce the [`FrameDescriptor`] table the player runs from.

use tracing::{debug, info, warn};

use super::frame::{assign_display_order, FrameDescriptor};
use crate::codec::h264::{
    FrameType, LengthPrefixedNals, NalUnitType, ParameterSetTable, PictureOrderResolver,
    SliceHeader,
};
use crate::error::{Error, Result};
use crate::format::{SampleSource, VideoTrackInfo};

/// Result of loading a stream
#[derive(Debug, Clone)]
pub struct LoadedStream {
    pub track: VideoTrackInfo,
    pub params: ParameterSetTable,
    /// Descriptors in decode order
    pub frames: Vec<FrameDescriptor>,
    /// Largest sample in bytes; sizes the staging entries
    pub max_frame_size: usize,
    /// Sum of all frame durations in seconds
    pub total_duration: f64,
}

impl LoadedStream {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frame shown at display position `display_order`
    pub fn frame_by_display_order(&self, display_order: u32) -> Option<&FrameDescriptor> {
        self.frames
            .iter()
            .find(|f| f.display_order == display_order)
    }

    /// Most frames ever decoded ahead of a picture but displayed after it
    ///
    /// A player needs this many output surfaces in flight, plus one, to
    /// reach every display position without stalling.
    pub fn reorder_depth(&self) -> usize {
        let n = self.frames.len();
        // Fenwick tree over display order, counting frames decoded so far
        let mut tree = vec![0usize; n + 1];
        let mut depth = 0;

        for (decoded, frame) in self.frames.iter().enumerate() {
            let rank = (frame.display_order as usize).min(n - 1) + 1;

            let mut shown_before = 0;
            let mut i = rank;
            while i > 0 {
                shown_before += tree[i];
                i &= i - 1;
            }
            depth = depth.max(decoded - shown_before);

            let mut i = rank;
            while i <= n {
                tree[i] += 1;
                i += i & i.wrapping_neg();
            }
        }

        depth
    }
}

/// Read every sample of `source` and build the frame table
///
/// Fails when the track is not AVC, the parameter sets are missing or
/// malformed, the SPS size disagrees with the container, or any sample
/// violates NAL framing.
pub fn load_stream<S: SampleSource + ?Sized>(source: &S) -> Result<LoadedStream> {
    let track = source.track_info().clone();
    if !track.codec.is_avc() {
        return Err(Error::unsupported(format!(
            "Codec {} is not supported, only H.264",
            track.codec
        )));
    }
    if track.timescale == 0 {
        return Err(Error::format("Track timescale is zero"));
    }

    let mut params = ParameterSetTable::new();
    let (sps_list, pps_list) = source.parameter_sets();
    for nal in sps_list {
        params.add_sps(nal)?;
    }
    for nal in pps_list {
        params.add_pps(nal)?;
    }

    let sample_count = source.sample_count();
    if sample_count == 0 {
        return Err(Error::format("Track has no samples"));
    }

    let timescale = f64::from(track.timescale);
    let mut resolver = PictureOrderResolver::new();
    let mut frames = Vec::with_capacity(sample_count);
    let mut max_frame_size = 0usize;
    let mut total_duration = 0.0;
    let mut warned_b_slice = false;
    let mut dimensions_checked = false;

    for index in 0..sample_count {
        let record = source.sample(index)?;
        let data = source.read_at(record.byte_offset, record.byte_size as usize)?;

        let mut slice = None;
        for unit in LengthPrefixedNals::new(data) {
            let unit = unit.map_err(|e| {
                Error::format(format!("Sample {} at offset {}: {}", index, record.byte_offset, e))
            })?;
            match unit.nal_type() {
                NalUnitType::Sps => {
                    params.add_sps(unit.data)?;
                }
                NalUnitType::Pps => {
                    params.add_pps(unit.data)?;
                }
                t if t.is_slice() && slice.is_none() => slice = Some(unit),
                _ => {}
            }
        }

        let unit = slice.ok_or_else(|| Error::format(format!("Sample {} has no slice", index)))?;

        if !dimensions_checked {
            params.validate_dimensions((track.width, track.height))?;
            dimensions_checked = true;
        }

        let header = SliceHeader::from_nal(&unit, &params)?;
        let (pps, sps) = params.active(header.pic_parameter_set_id)?;
        let order = resolver.compute(&header, sps, unit.header)?;

        if header.slice_type.is_b() && !warned_b_slice {
            warn!(
                "Sample {} carries B slices; they are decoded as predictive frames",
                index
            );
            warned_b_slice = true;
        }

        let frame_type = if unit.nal_type().is_idr() {
            FrameType::Intra
        } else {
            FrameType::Predictive
        };

        let duration_seconds = f64::from(record.duration) / timescale;
        total_duration += duration_seconds;
        max_frame_size = max_frame_size.max(record.byte_size as usize);

        frames.push(FrameDescriptor {
            decode_order: index as u32,
            display_order: 0,
            poc: order.poc,
            gop_cycle: order.gop_cycle,
            field_order_cnt: order.field_order_cnt,
            frame_type,
            nal_unit_type: unit.nal_type(),
            reference_priority: unit.header.nal_ref_idc,
            frame_num: header.frame_num,
            idr_pic_id: header.idr_pic_id,
            sps_id: sps.seq_parameter_set_id,
            pps_id: pps.pic_parameter_set_id,
            src_byte_offset: record.byte_offset,
            src_byte_size: record.byte_size,
            slice_size: unit.staged_size() as u32,
            dts_seconds: record.decode_timestamp as f64 / timescale,
            pts_seconds: record.presentation_timestamp as f64 / timescale,
            duration_seconds,
            slice_header: header,
        });
    }

    assign_display_order(&mut frames);

    if params.num_dpb_slots() == 0 {
        return Err(Error::format("Stream has no SPS"));
    }

    debug!(
        "Loaded {} frames, {} GOPs, max frame {} bytes",
        frames.len(),
        resolver.gop_cycle() + 1,
        max_frame_size
    );
    info!(
        "Stream {}x{}: {} frames, {:.3}s, {} DPB slots",
        track.width,
        track.height,
        frames.len(),
        total_duration,
        params.num_dpb_slots()
    );

    Ok(LoadedStream {
        track,
        params,
        frames,
        max_frame_size,
        total_duration,
    })
}
