//! H.264/AVC bitstream layer
//!
//! Everything needed to turn length-prefixed H.264 samples into decode
//! parameters without decoding macroblocks:
//!
//! - [`nal`]: NAL framing and classification
//! - [`bitstream`] / [`writer`]: RBSP bit reader and writer
//! - [`headers`] / [`params`]: SPS/PPS parsing and the parameter set table
//! - [`slice`]: slice headers
//! - [`poc`]: picture order count and display order
//! - [`dpb`]: decoded picture buffer slots and reference rotation

pub mod bitstream;
pub mod dpb;
pub mod headers;
pub mod nal;
pub mod params;
pub mod poc;
pub mod slice;
pub mod writer;

pub use bitstream::{remove_emulation_prevention, BitstreamReader};
pub use dpb::{DpbManager, DpbSlot, FrameType, ReferenceList, ReferenceRing, MAX_DPB_SLOTS};
pub use headers::{HrdParameters, Pps, ScalingLists, Sps, VuiParameters};
pub use nal::{first_slice, LengthPrefixedNals, NalHeader, NalUnit, NalUnitType, START_CODE};
pub use params::ParameterSetTable;
pub use poc::{display_ranks, PictureOrder, PictureOrderResolver};
pub use slice::{SliceHeader, SliceType};
pub use writer::BitstreamWriter;
