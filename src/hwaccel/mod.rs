//! Hardware decode acceleration
//!
//! The player never talks to a device API directly. Everything it needs from
//! hardware goes through [`DecodeAccelerator`]: capability queries, session
//! and surface creation, and submission of recorded command lists to either
//! the decode or the graphics engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use avcplay_lib::hwaccel::{DecodeAccelerator, HwProfile, RecordingAccelerator};
//!
//! let mut accel = RecordingAccelerator::new();
//! let caps = accel.capabilities(HwProfile::H264High)?;
//! println!("DPB slots: {}", caps.max_dpb_slots);
//! ```

pub mod common;
pub mod recording;

pub use common::{
    AccessFlags, AcceleratorCaps, Command, CopyRequest, DecodeRequest, Engine, EventId,
    HwPixelFormat, HwProfile, ImageBarrier, ImageLayout, PictureInfo, ReferenceSlot,
    ResourceState, SemaphoreId, SessionConfig, Submission, SurfaceHandle,
};
pub use recording::RecordingAccelerator;

use crate::codec::h264::{Pps, Sps};
use crate::error::Result;

/// Hardware decode device
///
/// Implementations perform only the arithmetic decode and the copies; all
/// H.264 state (reference selection, picture order, slot reuse) is decided by
/// the caller and arrives fully resolved in each [`DecodeRequest`].
pub trait DecodeAccelerator {
    /// Get device name/description
    fn name(&self) -> &str;

    /// Query decode capabilities for a profile
    fn capabilities(&self, profile: HwProfile) -> Result<AcceleratorCaps>;

    /// Create the decode session
    fn create_session(&mut self, config: &SessionConfig) -> Result<()>;

    /// Upload parsed parameter sets as session parameters
    fn upload_parameter_sets(&mut self, sps: &[Sps], pps: &[Pps]) -> Result<()>;

    /// Allocate `count` decode-target surfaces
    fn create_dpb_surfaces(
        &mut self,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<Vec<SurfaceHandle>>;

    /// Allocate one display-format output surface
    fn create_output_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle>;

    fn create_semaphore(&mut self) -> Result<SemaphoreId>;

    fn create_event(&mut self) -> Result<EventId>;

    /// Execute a recorded submission
    ///
    /// `bitstream` is the whole staging buffer; decode requests address it
    /// through their offset and range.
    fn submit(&mut self, submission: &Submission, bitstream: &[u8]) -> Result<()>;
}

impl<A: DecodeAccelerator + ?Sized> DecodeAccelerator for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self, profile: HwProfile) -> Result<AcceleratorCaps> {
        (**self).capabilities(profile)
    }

    fn create_session(&mut self, config: &SessionConfig) -> Result<()> {
        (**self).create_session(config)
    }

    fn upload_parameter_sets(&mut self, sps: &[Sps], pps: &[Pps]) -> Result<()> {
        (**self).upload_parameter_sets(sps, pps)
    }

    fn create_dpb_surfaces(
        &mut self,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<Vec<SurfaceHandle>> {
        (**self).create_dpb_surfaces(count, width, height)
    }

    fn create_output_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle> {
        (**self).create_output_surface(width, height)
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        (**self).create_semaphore()
    }

    fn create_event(&mut self) -> Result<EventId> {
        (**self).create_event()
    }

    fn submit(&mut self, submission: &Submission, bitstream: &[u8]) -> Result<()> {
        (**self).submit(submission, bitstream)
    }
}
