//! Decode orchestration
//!
//! Records and submits everything one frame needs, in a fixed order:
//!
//! 1. stage the first slice into the staging ring
//! 2. pick the DPB slot and reference list, transition them, optionally
//!    reset the session, decode
//! 3. copy the decoded slot into an output surface, hand the output to the
//!    presentation engine, return the slot to the reference state, set the
//!    copy-done event
//!
//! All of it goes to the decode engine as a single submission that signals
//! `decode_complete`. The presentation side waits on that semaphore and on
//! the event through [`DecodeOrchestrator::presentation_sync`].

use tracing::{debug, trace};

use super::frame::FrameDescriptor;
use super::staging::StagingRing;
use super::surface::{OutputSurface, SurfaceLifecycle};
use crate::codec::h264::{DpbManager, FrameType};
use crate::error::{Error, Result};
use crate::hwaccel::{
    Command, CopyRequest, DecodeAccelerator, DecodeRequest, Engine, EventId, ImageBarrier,
    PictureInfo, ResourceState, SemaphoreId, Submission,
};

/// Phase of the frame currently being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Staging,
    Decoding,
    PostProcessing,
}

/// Outcome of one decode
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub decode_index: usize,
    /// DPB slot the picture was decoded into
    pub slot: usize,
    pub reference_count: usize,
    pub output: OutputSurface,
}

/// Drives the accelerator through one frame at a time
#[derive(Debug)]
pub struct DecodeOrchestrator {
    state: OrchestratorState,
    staging: StagingRing,
    dpb: DpbManager,
    decode_complete: SemaphoreId,
    copy_done: EventId,
    output_size: (u32, u32),
    reset_pending: bool,
    first_frame_decoded: bool,
    reset_first_frame: bool,
}

impl DecodeOrchestrator {
    /// `output_size` is the display size copied into output surfaces
    pub fn new(
        staging: StagingRing,
        dpb: DpbManager,
        decode_complete: SemaphoreId,
        copy_done: EventId,
        output_size: (u32, u32),
    ) -> Self {
        DecodeOrchestrator {
            state: OrchestratorState::Idle,
            staging,
            dpb,
            decode_complete,
            copy_done,
            output_size,
            reset_pending: false,
            first_frame_decoded: false,
            reset_first_frame: true,
        }
    }

    /// Whether the first decode resets the session (the default)
    pub fn set_reset_first_frame(&mut self, reset: bool) {
        self.reset_first_frame = reset;
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn dpb(&self) -> &DpbManager {
        &self.dpb
    }

    pub fn staging(&self) -> &StagingRing {
        &self.staging
    }

    /// Reset the decode session before the next frame
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Forget all references; used once playback stops
    pub fn reset_reference_usage(&mut self) {
        self.dpb.reset_reference_usage();
    }

    fn advance(&mut self, from: OrchestratorState, to: OrchestratorState) -> Result<()> {
        if self.state != from {
            return Err(Error::invalid_state(format!(
                "Orchestrator cannot move to {:?} from {:?}",
                to, self.state
            )));
        }
        trace!("Orchestrator {:?} -> {:?}", from, to);
        self.state = to;
        Ok(())
    }

    /// Decode `frame` (whose sample bytes are `sample`) into `output`
    pub fn decode_frame<A: DecodeAccelerator + ?Sized>(
        &mut self,
        accelerator: &mut A,
        frame: &FrameDescriptor,
        sample: &[u8],
        mut output: OutputSurface,
    ) -> Result<DecodedFrame> {
        let decode_index = frame.decode_order as usize;

        self.advance(OrchestratorState::Idle, OrchestratorState::Staging)?;
        let staged = self.staging.write_frame(decode_index, sample)?;

        self.advance(OrchestratorState::Staging, OrchestratorState::Decoding)?;
        let slot = self
            .dpb
            .allocate_current_slot(frame.frame_type, frame.poc, frame.frame_num)?;
        let list = self.dpb.build_reference_list()?;

        let mut submission = Submission::new(Engine::Decode);
        submission.push_barrier(self.dpb.target_barrier()?);
        for barrier in self.dpb.reference_barriers(&list) {
            submission.push(Command::Barrier(barrier));
        }

        if self.reset_pending || (self.reset_first_frame && !self.first_frame_decoded) {
            submission.push(Command::ResetSession);
        }

        let reference_count = list.references.len();
        let header = &frame.slice_header;
        submission.push(Command::Decode(DecodeRequest {
            target: list.setup.surface,
            setup: list.setup,
            references: list.references,
            sps_id: frame.sps_id,
            pps_id: frame.pps_id,
            bitstream_offset: staged.slice.offset,
            bitstream_range: staged.range,
            picture: PictureInfo {
                is_intra: frame.frame_type == FrameType::Intra,
                is_reference: frame.is_reference(),
                is_idr: frame.is_idr(),
                frame_num: frame.frame_num,
                idr_pic_id: frame.idr_pic_id,
                field_order_cnt: frame.field_order_cnt,
                field_pic: header.field_pic,
                bottom_field: header.bottom_field,
                slice_offsets: staged.slice_offsets,
            },
        }));

        self.advance(OrchestratorState::Decoding, OrchestratorState::PostProcessing)?;
        submission.push_barrier(self.dpb.copy_source_barrier()?);

        let output_src = match output.lifecycle {
            SurfaceLifecycle::Init => ResourceState::UNDEFINED,
            SurfaceLifecycle::Ready => ResourceState::SHADER_READ,
        };
        submission.push(Command::Barrier(ImageBarrier {
            surface: output.surface,
            src: output_src,
            dst: ResourceState::TRANSFER_DST,
        }));

        let (width, height) = self.output_size;
        let src = list.setup.surface;
        for (plane, width, height) in [(0u8, width, height), (1u8, width / 2, height / 2)] {
            submission.push(Command::CopyToOutput(CopyRequest {
                src,
                dst: output.surface,
                plane,
                width,
                height,
            }));
        }

        submission.push(Command::Barrier(ImageBarrier {
            surface: output.surface,
            src: ResourceState::TRANSFER_DST,
            dst: ResourceState::SHADER_READ,
        }));
        output.lifecycle = SurfaceLifecycle::Ready;

        submission.push_barrier(self.dpb.reference_ready_barrier()?);
        submission.push(Command::SetEvent(self.copy_done));
        submission.signal = Some(self.decode_complete);

        accelerator
            .submit(&submission, self.staging.buffer())
            .map_err(|e| match e {
                Error::Accelerator(_) => e,
                other => Error::accelerator(other.to_string()),
            })?;

        self.dpb.commit_reference(frame.reference_priority)?;
        self.reset_pending = false;
        self.first_frame_decoded = true;
        self.advance(OrchestratorState::PostProcessing, OrchestratorState::Idle)?;

        debug!(
            "Decoded frame {} (poc {}) into slot {} with {} references",
            decode_index, frame.poc, slot, reference_count
        );

        Ok(DecodedFrame {
            decode_index,
            slot,
            reference_count,
            output,
        })
    }

    /// Graphics-engine submission that makes the last decode visible
    pub fn presentation_sync(&self) -> Submission {
        let mut submission = Submission::new(Engine::Graphics);
        submission.wait = Some(self.decode_complete);
        submission.push(Command::WaitEvent(self.copy_done));
        submission.push(Command::ResetEvent(self.copy_done));
        submission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwaccel::{
        AcceleratorCaps, HwPixelFormat, HwProfile, RecordingAccelerator, SessionConfig,
        SurfaceHandle,
    };
    use crate::player::frame::tests::descriptor;

    const SAMPLE: [u8; 8] = [0, 0, 0, 4, 0x65, 0x88, 0x80, 0x40];

    fn setup(num_slots: usize) -> (RecordingAccelerator, DecodeOrchestrator) {
        let mut accel = RecordingAccelerator::with_caps(AcceleratorCaps::default());
        accel
            .create_session(&SessionConfig {
                profile: HwProfile::H264Main,
                coded_width: 64,
                coded_height: 48,
                picture_format: HwPixelFormat::NV12,
                max_dpb_slots: num_slots as u32,
                max_active_reference_pictures: 16,
            })
            .unwrap();
        let surfaces = accel.create_dpb_surfaces(num_slots, 64, 48).unwrap();
        let semaphore = accel.create_semaphore().unwrap();
        let event = accel.create_event().unwrap();

        let staging = StagingRing::new(num_slots + 1, SAMPLE.len(), 256, 256).unwrap();
        let dpb = DpbManager::new(num_slots, 16, &surfaces).unwrap();
        let orchestrator = DecodeOrchestrator::new(staging, dpb, semaphore, event, (64, 48));
        (accel, orchestrator)
    }

    fn output(accel: &mut RecordingAccelerator) -> OutputSurface {
        OutputSurface::new(accel.create_output_surface(64, 48).unwrap())
    }

    #[test]
    fn test_command_order() {
        let (mut accel, mut orchestrator) = setup(3);
        let out = output(&mut accel);
        let frame = descriptor(0, 0, 0);

        let decoded = orchestrator
            .decode_frame(&mut accel, &frame, &SAMPLE, out)
            .unwrap();
        assert_eq!(decoded.slot, 0);
        assert_eq!(decoded.output.lifecycle, SurfaceLifecycle::Ready);
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);

        let submission = &accel.submissions()[0];
        let kinds: Vec<&str> = submission
            .commands
            .iter()
            .map(|c| match c {
                Command::Barrier(_) => "barrier",
                Command::ResetSession => "reset",
                Command::Decode(_) => "decode",
                Command::CopyToOutput(_) => "copy",
                Command::SetEvent(_) => "set",
                Command::WaitEvent(_) => "wait",
                Command::ResetEvent(_) => "reset_event",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "barrier", "reset", "decode", "barrier", "barrier", "copy", "copy", "barrier",
                "barrier", "set"
            ]
        );
        assert!(submission.signal.is_some());

        let request = submission.decode_request().unwrap();
        assert!(request.picture.is_idr);
        assert!(request.picture.is_intra);
        assert_eq!(request.bitstream_offset, 0);
        assert_eq!(request.bitstream_range, 256);
        assert!(request.references.is_empty());
    }

    #[test]
    fn test_references_rotate() {
        let (mut accel, mut orchestrator) = setup(3);
        let frames = [
            descriptor(0, 0, 0),
            descriptor(1, 0, 2),
            descriptor(2, 0, 4),
            descriptor(3, 0, 6),
        ];

        let mut slots = Vec::new();
        for frame in &frames {
            let out = output(&mut accel);
            let decoded = orchestrator
                .decode_frame(&mut accel, frame, &SAMPLE, out)
                .unwrap();
            slots.push((decoded.slot, decoded.reference_count));
        }
        assert_eq!(slots, vec![(0, 0), (1, 1), (2, 2), (0, 2)]);

        for request in accel.decode_requests() {
            assert!(request
                .references
                .iter()
                .all(|r| r.surface != request.target));
        }
        // only the first decode resets the session
        let resets = accel
            .submissions()
            .iter()
            .filter(|s| s.commands.contains(&Command::ResetSession))
            .count();
        assert_eq!(resets, 1);
    }

    #[test]
    fn test_requested_reset() {
        let (mut accel, mut orchestrator) = setup(3);
        let out = output(&mut accel);
        orchestrator
            .decode_frame(&mut accel, &descriptor(0, 0, 0), &SAMPLE, out)
            .unwrap();

        orchestrator.request_reset();
        assert!(orchestrator.reset_pending());
        let out = output(&mut accel);
        orchestrator
            .decode_frame(&mut accel, &descriptor(1, 0, 2), &SAMPLE, out)
            .unwrap();

        assert!(!orchestrator.reset_pending());
        assert!(accel.submissions()[1]
            .commands
            .contains(&Command::ResetSession));
    }

    #[test]
    fn test_reused_output_surface() {
        let (mut accel, mut orchestrator) = setup(3);
        let out = output(&mut accel);
        let first = orchestrator
            .decode_frame(&mut accel, &descriptor(0, 0, 0), &SAMPLE, out)
            .unwrap();
        orchestrator
            .decode_frame(&mut accel, &descriptor(1, 0, 2), &SAMPLE, first.output)
            .unwrap();

        let output_barrier = accel.submissions()[1]
            .barriers()
            .find(|b| b.surface == first.output.surface)
            .copied()
            .unwrap();
        assert_eq!(output_barrier.src, ResourceState::SHADER_READ);
    }

    #[test]
    fn test_accelerator_failure_is_fatal() {
        let (mut accel, mut orchestrator) = setup(3);
        accel.fail_on_submission(0);
        let out = output(&mut accel);

        let result = orchestrator.decode_frame(&mut accel, &descriptor(0, 0, 0), &SAMPLE, out);
        assert!(matches!(result, Err(Error::Accelerator(_))));
        assert_eq!(orchestrator.state(), OrchestratorState::PostProcessing);

        let out = OutputSurface::new(SurfaceHandle(999));
        let again = orchestrator.decode_frame(&mut accel, &descriptor(1, 0, 2), &SAMPLE, out);
        assert!(matches!(again, Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_presentation_sync() {
        let (mut accel, mut orchestrator) = setup(2);
        let out = output(&mut accel);
        orchestrator
            .decode_frame(&mut accel, &descriptor(0, 0, 0), &SAMPLE, out)
            .unwrap();

        let sync = orchestrator.presentation_sync();
        assert_eq!(sync.engine, Engine::Graphics);
        assert!(sync.wait.is_some());
        accel.submit(&sync, &[]).unwrap();
    }
}
