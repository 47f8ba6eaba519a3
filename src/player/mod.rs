//! Playback engine
//!
//! [`Player`] ties everything together: it loads a [`SampleSource`] into a
//! frame table, sizes the DPB, staging ring and output pool from the
//! parameter sets and the accelerator's capabilities, and then advances
//! decode and display on every call to [`Player::update`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use avcplay_lib::config::PlayerConfig;
//! use avcplay_lib::format::Mp4Source;
//! use avcplay_lib::hwaccel::RecordingAccelerator;
//! use avcplay_lib::player::Player;
//!
//! let source = Mp4Source::open("clip.mp4")?;
//! let mut player = Player::open(source, RecordingAccelerator::new(), PlayerConfig::default())?;
//! while !player.is_stopped() {
//!     player.update(1.0 / 60.0)?;
//!     if let Some(sync) = player.presentation_sync() {
//!         // hand `sync` to the presentation engine
//!     }
//! }
//! ```

pub mod frame;
pub mod orchestrator;
pub mod scheduler;
pub mod staging;
pub mod stream;
pub mod surface;

pub use frame::{assign_display_order, FrameDescriptor};
pub use orchestrator::{DecodeOrchestrator, DecodedFrame, OrchestratorState};
pub use scheduler::{FrameSink, PlaybackCursor, PlaybackScheduler, Tick};
pub use staging::{align_to, StagedFrame, StagingRing, StagingSlice};
pub use stream::{load_stream, LoadedStream};
pub use surface::{OutputSurface, SurfaceLifecycle, SurfacePool};

use tracing::{info, warn};

use crate::codec::h264::{DpbManager, ParameterSetTable, MAX_DPB_SLOTS};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use crate::format::SampleSource;
use crate::hwaccel::{
    AcceleratorCaps, DecodeAccelerator, HwProfile, SessionConfig, Submission, SurfaceHandle,
};

/// H.264 player over one sample source and one accelerator
pub struct Player<S: SampleSource, A: DecodeAccelerator> {
    source: S,
    accelerator: A,
    config: PlayerConfig,
    stream: LoadedStream,
    caps: AcceleratorCaps,
    orchestrator: DecodeOrchestrator,
    scheduler: PlaybackScheduler,
    output_size: (u32, u32),
    sync_pending: bool,
}

impl<S: SampleSource, A: DecodeAccelerator> Player<S, A> {
    /// Load the stream and set up every accelerator resource
    ///
    /// Any failure here is a load error; nothing is decoded yet.
    pub fn open(source: S, mut accelerator: A, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let stream = load_stream(&source)?;

        let sps = stream
            .params
            .primary_sps()
            .ok_or_else(|| Error::format("Stream has no SPS"))?;
        let profile = HwProfile::from_profile_idc(sps.profile_idc);
        let caps = accelerator.capabilities(profile)?;
        let degraded = Self::degrade(&stream.params, &caps, &config)?;

        let (coded_width, coded_height) = stream
            .params
            .coded_dimensions()
            .ok_or_else(|| Error::format("Stream has no SPS"))?;
        let output_size = (stream.track.width, stream.track.height);

        accelerator.create_session(&SessionConfig {
            profile,
            coded_width,
            coded_height,
            picture_format: caps.picture_format,
            max_dpb_slots: degraded.num_slots as u32,
            max_active_reference_pictures: degraded.max_references as u32,
        })?;
        accelerator.upload_parameter_sets(&stream.params.sps_list(), &stream.params.pps_list())?;

        let surfaces =
            accelerator.create_dpb_surfaces(degraded.num_slots, coded_width, coded_height)?;
        let decode_complete = accelerator.create_semaphore()?;
        let copy_done = accelerator.create_event()?;

        let staging = StagingRing::new(
            degraded.num_slots + 1,
            stream.max_frame_size,
            caps.min_bitstream_offset_alignment,
            caps.min_bitstream_size_alignment,
        )?;
        let dpb = DpbManager::new(degraded.num_slots, degraded.max_references, &surfaces)?;
        let mut orchestrator =
            DecodeOrchestrator::new(staging, dpb, decode_complete, copy_done, output_size);
        orchestrator.set_reset_first_frame(config.force_initial_reset);

        let scheduler = PlaybackScheduler::new(
            stream.frame_count(),
            degraded.num_slots,
            config.max_texture_count,
        )
        .with_reorder_depth(stream.reorder_depth());

        info!(
            "Player ready on {}: {}x{}, {} frames, {} DPB slots",
            accelerator.name(),
            output_size.0,
            output_size.1,
            stream.frame_count(),
            degraded.num_slots
        );

        Ok(Player {
            source,
            accelerator,
            config,
            stream,
            caps,
            orchestrator,
            scheduler,
            output_size,
            sync_pending: false,
        })
    }

    /// Fit the stream's requirements to what the accelerator offers
    fn degrade(
        params: &ParameterSetTable,
        caps: &AcceleratorCaps,
        config: &PlayerConfig,
    ) -> Result<DegradedLimits> {
        let num_slots = params.num_dpb_slots() as usize;
        if num_slots > caps.max_dpb_slots as usize {
            warn!(
                "Stream needs {} DPB slots, accelerator reports {}",
                num_slots, caps.max_dpb_slots
            );
        }
        let num_slots = num_slots.min(MAX_DPB_SLOTS);
        let max_references = num_slots.min(caps.max_active_reference_pictures as usize);

        let requested = config.pixel_format()?;
        if requested != caps.picture_format {
            warn!(
                "Output format {} unavailable, using {}",
                requested, caps.picture_format
            );
        }

        Ok(DegradedLimits {
            num_slots,
            max_references,
        })
    }

    /// Advance display by `elapsed` seconds and decode at most one frame
    ///
    /// Staging overflow and accelerator failures propagate; they are fatal.
    pub fn update(&mut self, elapsed: f64) -> Result<Tick> {
        let mut sink = DecodeSink {
            source: &self.source,
            accelerator: &mut self.accelerator,
            orchestrator: &mut self.orchestrator,
            stream: &self.stream,
            output_size: self.output_size,
        };
        let tick = self.scheduler.update(elapsed, &mut sink)?;
        if tick.decoded.is_some() {
            self.sync_pending = true;
        }
        Ok(tick)
    }

    /// Enough frames are decoded for display to start
    pub fn is_ready(&self) -> bool {
        self.scheduler.is_ready()
    }

    pub fn is_stopped(&self) -> bool {
        self.scheduler.is_stopped()
    }

    /// Surface the consumer should sample; `None` until ready
    pub fn current_display_surface(&self) -> Option<SurfaceHandle> {
        if !self.is_ready() {
            return None;
        }
        self.scheduler.current_surface_handle()
    }

    /// Next frame to decode, in decode order
    pub fn decode_frame_number(&self) -> usize {
        self.scheduler.cursor().decode_index
    }

    /// Frame being displayed, in display order
    pub fn display_frame_number(&self) -> usize {
        self.scheduler.cursor().play_index
    }

    pub fn last_frame_number(&self) -> usize {
        self.stream.frame_count().saturating_sub(1)
    }

    /// Sum of all frame durations, in seconds
    pub fn total_duration(&self) -> f64 {
        self.stream.total_duration
    }

    /// Presentation-engine submission for the decodes since the last call
    ///
    /// Returns `None` when nothing was decoded, since there is nothing to
    /// wait for.
    pub fn presentation_sync(&mut self) -> Option<Submission> {
        if !self.sync_pending {
            return None;
        }
        self.sync_pending = false;
        Some(self.orchestrator.presentation_sync())
    }

    /// Reset the decode session before the next decode
    pub fn request_reset(&mut self) {
        self.orchestrator.request_reset();
    }

    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.stream.frames
    }

    pub fn stream(&self) -> &LoadedStream {
        &self.stream
    }

    pub fn capabilities(&self) -> &AcceleratorCaps {
        &self.caps
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        self.scheduler.cursor()
    }

    pub fn orchestrator(&self) -> &DecodeOrchestrator {
        &self.orchestrator
    }

    pub fn accelerator(&self) -> &A {
        &self.accelerator
    }

    pub fn accelerator_mut(&mut self) -> &mut A {
        &mut self.accelerator
    }
}

#[derive(Debug, Clone, Copy)]
struct DegradedLimits {
    num_slots: usize,
    max_references: usize,
}

/// Borrowed view of the player handed to the scheduler for one tick
struct DecodeSink<'a, S: SampleSource, A: DecodeAccelerator> {
    source: &'a S,
    accelerator: &'a mut A,
    orchestrator: &'a mut DecodeOrchestrator,
    stream: &'a LoadedStream,
    output_size: (u32, u32),
}

impl<S: SampleSource, A: DecodeAccelerator> FrameSink for DecodeSink<'_, S, A> {
    fn create_surface(&mut self) -> Result<OutputSurface> {
        let (width, height) = self.output_size;
        let handle = self.accelerator.create_output_surface(width, height)?;
        Ok(OutputSurface::new(handle))
    }

    fn decode(&mut self, decode_index: usize, mut surface: OutputSurface) -> Result<OutputSurface> {
        let frame = self.stream.frames.get(decode_index).ok_or_else(|| {
            Error::invalid_state(format!("No frame {} to decode", decode_index))
        })?;
        let sample = self
            .source
            .read_at(frame.src_byte_offset, frame.src_byte_size as usize)?;

        surface.assign(frame.display_order, frame.duration_seconds);
        let decoded = self
            .orchestrator
            .decode_frame(&mut *self.accelerator, frame, sample, surface)?;
        Ok(decoded.output)
    }

    fn reset_references(&mut self) {
        self.orchestrator.reset_reference_usage();
    }
}
