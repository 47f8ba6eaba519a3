//! Common hardware decode types
//!
//! This module provides the vocabulary shared by the decode engine and every
//! accelerator backend:
//! - capability and session descriptions
//! - opaque surface, semaphore and event handles
//! - per-surface resource state (layout + access) and barriers
//! - the command and submission model recorded by the orchestrator

use serde::Serialize;
use std::fmt;

/// Hardware pixel formats a decoder can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HwPixelFormat {
    /// NV12 - 8-bit YUV 4:2:0 with interleaved UV plane (most common HW format)
    NV12,
    /// P010 - 10-bit YUV 4:2:0 with interleaved UV plane
    P010,
    /// YUV420P - Planar 8-bit YUV 4:2:0 (3 separate planes)
    YUV420P,
}

impl HwPixelFormat {
    /// Get the number of bytes per pixel (average for subsampled formats)
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            HwPixelFormat::NV12 | HwPixelFormat::YUV420P => 1.5,
            HwPixelFormat::P010 => 3.0,
        }
    }

    /// Get the number of planes for this format
    pub fn num_planes(&self) -> usize {
        match self {
            HwPixelFormat::NV12 | HwPixelFormat::P010 => 2,
            HwPixelFormat::YUV420P => 3,
        }
    }

    /// Parse a config name such as `"nv12"`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nv12" => Some(HwPixelFormat::NV12),
            "p010" => Some(HwPixelFormat::P010),
            "yuv420p" => Some(HwPixelFormat::YUV420P),
            _ => None,
        }
    }
}

impl fmt::Display for HwPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HwPixelFormat::NV12 => "NV12",
            HwPixelFormat::P010 => "P010",
            HwPixelFormat::YUV420P => "YUV420P",
        };
        write!(f, "{}", name)
    }
}

/// H.264 decode profile requested from the accelerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum HwProfile {
    H264Baseline,
    H264Main,
    #[default]
    H264High,
}

impl HwProfile {
    /// Map `profile_idc`; anything that is not baseline or main needs high
    pub fn from_profile_idc(profile_idc: u8) -> Self {
        match profile_idc {
            66 => HwProfile::H264Baseline,
            77 => HwProfile::H264Main,
            _ => HwProfile::H264High,
        }
    }
}

/// What an accelerator can do for one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceleratorCaps {
    /// Maximum DPB slots a session may use
    pub max_dpb_slots: u32,
    /// Maximum active reference pictures per decode
    pub max_active_reference_pictures: u32,
    /// Required alignment of the bitstream offset
    pub min_bitstream_offset_alignment: u64,
    /// Required alignment of the bitstream range
    pub min_bitstream_size_alignment: u64,
    /// Format decoded pictures are written in
    pub picture_format: HwPixelFormat,
    /// Maximum coded width
    pub max_coded_width: u32,
    /// Maximum coded height
    pub max_coded_height: u32,
}

impl Default for AcceleratorCaps {
    fn default() -> Self {
        AcceleratorCaps {
            max_dpb_slots: 17,
            max_active_reference_pictures: 16,
            min_bitstream_offset_alignment: 256,
            min_bitstream_size_alignment: 256,
            picture_format: HwPixelFormat::NV12,
            max_coded_width: 4096,
            max_coded_height: 4096,
        }
    }
}

/// Decode session parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub profile: HwProfile,
    pub coded_width: u32,
    pub coded_height: u32,
    pub picture_format: HwPixelFormat,
    pub max_dpb_slots: u32,
    pub max_active_reference_pictures: u32,
}

/// Opaque accelerator surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SurfaceHandle(pub u64);

/// Cross-engine completion signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SemaphoreId(pub u32);

/// Cooperative flag set by one engine and awaited by another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EventId(pub u32);

/// Execution engine a submission runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Engine {
    Decode,
    Graphics,
}

/// Memory layout of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ImageLayout {
    #[default]
    Undefined,
    DecodeDst,
    DecodeDpb,
    TransferSrc,
    TransferDst,
    ShaderReadOnly,
}

/// Kind of access pending on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AccessFlags {
    #[default]
    None,
    DecodeRead,
    DecodeWrite,
    TransferRead,
    TransferWrite,
    ShaderRead,
}

/// Tracked resource state of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ResourceState {
    pub access: AccessFlags,
    pub layout: ImageLayout,
}

impl ResourceState {
    pub const UNDEFINED: ResourceState = ResourceState {
        access: AccessFlags::None,
        layout: ImageLayout::Undefined,
    };
    /// Slot being written by the current decode
    pub const DECODE_TARGET: ResourceState = ResourceState {
        access: AccessFlags::DecodeWrite,
        layout: ImageLayout::DecodeDpb,
    };
    /// Slot readable as a reference
    pub const DECODE_REFERENCE: ResourceState = ResourceState {
        access: AccessFlags::DecodeRead,
        layout: ImageLayout::DecodeDpb,
    };
    pub const TRANSFER_SRC: ResourceState = ResourceState {
        access: AccessFlags::TransferRead,
        layout: ImageLayout::TransferSrc,
    };
    pub const TRANSFER_DST: ResourceState = ResourceState {
        access: AccessFlags::TransferWrite,
        layout: ImageLayout::TransferDst,
    };
    pub const SHADER_READ: ResourceState = ResourceState {
        access: AccessFlags::ShaderRead,
        layout: ImageLayout::ShaderReadOnly,
    };

    pub const fn new(access: AccessFlags, layout: ImageLayout) -> Self {
        ResourceState { access, layout }
    }
}

/// State transition of one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageBarrier {
    pub surface: SurfaceHandle,
    pub src: ResourceState,
    pub dst: ResourceState,
}

/// A DPB slot as seen by the decode call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceSlot {
    /// Index into the DPB
    pub slot: usize,
    pub surface: SurfaceHandle,
    pub poc: i32,
    pub frame_num: u32,
}

/// Per-picture codec parameters passed with a decode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PictureInfo {
    pub is_intra: bool,
    pub is_reference: bool,
    /// Set only for IDR NAL units, not for every intra picture
    pub is_idr: bool,
    pub frame_num: u32,
    pub idr_pic_id: u32,
    pub field_order_cnt: [i32; 2],
    pub field_pic: bool,
    pub bottom_field: bool,
    /// Slice start offsets relative to the bitstream region
    pub slice_offsets: Vec<u32>,
}

/// One decode operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeRequest {
    /// Surface the picture is decoded into
    pub target: SurfaceHandle,
    /// Slot activated for the picture being decoded
    pub setup: ReferenceSlot,
    /// Active references, oldest first
    pub references: Vec<ReferenceSlot>,
    pub sps_id: u8,
    pub pps_id: u8,
    /// Offset of the staged bitstream in the staging buffer
    pub bitstream_offset: u64,
    /// Aligned size of the staged bitstream
    pub bitstream_range: u64,
    pub picture: PictureInfo,
}

/// Copy of one plane from a decoded surface into an output surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopyRequest {
    pub src: SurfaceHandle,
    pub dst: SurfaceHandle,
    pub plane: u8,
    pub width: u32,
    pub height: u32,
}

/// A recorded accelerator command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    Barrier(ImageBarrier),
    /// Reset the decode session before the next decode
    ResetSession,
    Decode(DecodeRequest),
    CopyToOutput(CopyRequest),
    SetEvent(EventId),
    WaitEvent(EventId),
    ResetEvent(EventId),
}

/// Commands for one engine plus their semaphore wait/signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub engine: Engine,
    pub commands: Vec<Command>,
    pub wait: Option<SemaphoreId>,
    pub signal: Option<SemaphoreId>,
}

impl Submission {
    pub fn new(engine: Engine) -> Self {
        Submission {
            engine,
            commands: Vec::new(),
            wait: None,
            signal: None,
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Record a barrier if it changes anything
    pub fn push_barrier(&mut self, barrier: Option<ImageBarrier>) {
        if let Some(barrier) = barrier {
            self.commands.push(Command::Barrier(barrier));
        }
    }

    /// The decode request, if one was recorded
    pub fn decode_request(&self) -> Option<&DecodeRequest> {
        self.commands.iter().find_map(|c| match c {
            Command::Decode(request) => Some(request),
            _ => None,
        })
    }

    pub fn barriers(&self) -> impl Iterator<Item = &ImageBarrier> {
        self.commands.iter().filter_map(|c| match c {
            Command::Barrier(b) => Some(b),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_pixel_format() {
        assert_eq!(HwPixelFormat::NV12.bytes_per_pixel(), 1.5);
        assert_eq!(HwPixelFormat::NV12.num_planes(), 2);
        assert_eq!(HwPixelFormat::from_name("NV12"), Some(HwPixelFormat::NV12));
        assert_eq!(HwPixelFormat::from_name("rgba"), None);
        assert_eq!(HwPixelFormat::P010.to_string(), "P010");
    }

    #[test]
    fn test_profile_from_idc() {
        assert_eq!(HwProfile::from_profile_idc(66), HwProfile::H264Baseline);
        assert_eq!(HwProfile::from_profile_idc(77), HwProfile::H264Main);
        assert_eq!(HwProfile::from_profile_idc(100), HwProfile::H264High);
    }

    #[test]
    fn test_submission_helpers() {
        let mut submission = Submission::new(Engine::Decode);
        submission.push_barrier(None);
        assert!(submission.commands.is_empty());

        submission.push_barrier(Some(ImageBarrier {
            surface: SurfaceHandle(1),
            src: ResourceState::UNDEFINED,
            dst: ResourceState::DECODE_TARGET,
        }));
        submission.push(Command::ResetSession);
        assert_eq!(submission.barriers().count(), 1);
        assert!(submission.decode_request().is_none());
    }
}
