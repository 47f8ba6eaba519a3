//! Software accelerator that records and validates submissions
//!
//! [`RecordingAccelerator`] performs no decoding. It keeps the resource state
//! of every surface it hands out and checks each submitted command against
//! it, so any ordering mistake in the command stream surfaces as an
//! [`Error::Accelerator`]. Accepted submissions are kept for inspection, up
//! to an optional history limit.
//!
//! Failures can be injected to exercise the error path of callers.

use super::common::{
    AcceleratorCaps, Command, CopyRequest, DecodeRequest, Engine, EventId, HwProfile,
    ImageBarrier, ImageLayout, ResourceState, SemaphoreId, SessionConfig, Submission,
    SurfaceHandle,
};
use super::DecodeAccelerator;
use crate::codec::h264::{Pps, Sps};
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, trace};

/// What a surface was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Dpb,
    Output,
}

#[derive(Debug, Clone, Copy)]
struct SurfaceRecord {
    kind: SurfaceKind,
    width: u32,
    height: u32,
    state: ResourceState,
}

/// Validating accelerator for dry runs and tests
#[derive(Debug)]
pub struct RecordingAccelerator {
    caps: AcceleratorCaps,
    session: Option<SessionConfig>,
    session_reset: bool,
    uploaded_sps: usize,
    uploaded_pps: usize,
    surfaces: HashMap<SurfaceHandle, SurfaceRecord>,
    next_surface: u64,
    /// Pending signal count per semaphore
    semaphores: Vec<u32>,
    /// Set flag per event
    events: Vec<bool>,
    submissions: Vec<Submission>,
    /// Most recent submissions kept in `submissions`; unbounded when `None`
    history_limit: Option<usize>,
    accepted: usize,
    accepted_decodes: usize,
    fail_at: Option<usize>,
    submit_count: usize,
}

impl RecordingAccelerator {
    /// Create an accelerator with default capabilities
    pub fn new() -> Self {
        Self::with_caps(AcceleratorCaps::default())
    }

    pub fn with_caps(caps: AcceleratorCaps) -> Self {
        RecordingAccelerator {
            caps,
            session: None,
            session_reset: false,
            uploaded_sps: 0,
            uploaded_pps: 0,
            surfaces: HashMap::new(),
            next_surface: 1,
            semaphores: Vec::new(),
            events: Vec::new(),
            submissions: Vec::new(),
            history_limit: None,
            accepted: 0,
            accepted_decodes: 0,
            fail_at: None,
            submit_count: 0,
        }
    }

    /// Keep only the last `limit` accepted submissions
    ///
    /// Validation still covers every submission; only the history is
    /// bounded. A limit of zero records nothing.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Make the `index`-th call to `submit` (zero-based) fail
    pub fn fail_on_submission(&mut self, index: usize) {
        self.fail_at = Some(index);
    }

    pub fn session(&self) -> Option<&SessionConfig> {
        self.session.as_ref()
    }

    /// Parameter set counts of the last upload
    pub fn uploaded_parameter_sets(&self) -> (usize, usize) {
        (self.uploaded_sps, self.uploaded_pps)
    }

    /// Number of submissions accepted so far, including any dropped from
    /// the history
    pub fn accepted_count(&self) -> usize {
        self.accepted
    }

    /// Number of accepted submissions that carried a decode request
    pub fn decode_count(&self) -> usize {
        self.accepted_decodes
    }

    /// Accepted submissions in order, limited to the retained history
    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn take_submissions(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.submissions)
    }

    /// Decode requests of all accepted submissions, in order
    pub fn decode_requests(&self) -> impl Iterator<Item = &DecodeRequest> {
        self.submissions.iter().filter_map(|s| s.decode_request())
    }

    /// Tracked state of a surface
    pub fn surface_state(&self, surface: SurfaceHandle) -> Option<ResourceState> {
        self.surfaces.get(&surface).map(|r| r.state)
    }

    pub fn surface_kind(&self, surface: SurfaceHandle) -> Option<SurfaceKind> {
        self.surfaces.get(&surface).map(|r| r.kind)
    }

    /// Number of surfaces of one kind created so far
    pub fn surface_count(&self, kind: SurfaceKind) -> usize {
        self.surfaces.values().filter(|r| r.kind == kind).count()
    }

    pub fn event_is_set(&self, event: EventId) -> bool {
        self.events.get(event.0 as usize).copied().unwrap_or(false)
    }

    fn create_surface(&mut self, kind: SurfaceKind, width: u32, height: u32) -> Result<SurfaceHandle> {
        if width == 0
            || height == 0
            || width > self.caps.max_coded_width
            || height > self.caps.max_coded_height
        {
            return Err(Error::accelerator(format!(
                "Surface size {}x{} outside 1x1..{}x{}",
                width, height, self.caps.max_coded_width, self.caps.max_coded_height
            )));
        }

        let handle = SurfaceHandle(self.next_surface);
        self.next_surface += 1;
        self.surfaces.insert(
            handle,
            SurfaceRecord {
                kind,
                width,
                height,
                state: ResourceState::UNDEFINED,
            },
        );
        Ok(handle)
    }

    fn surface(&self, handle: SurfaceHandle) -> Result<&SurfaceRecord> {
        self.surfaces
            .get(&handle)
            .ok_or_else(|| Error::accelerator(format!("Unknown surface {:?}", handle)))
    }

    fn expect_state(&self, handle: SurfaceHandle, expected: ResourceState, what: &str) -> Result<()> {
        let actual = self.surface(handle)?.state;
        if actual != expected {
            return Err(Error::accelerator(format!(
                "{}: surface {:?} is {:?}, expected {:?}",
                what, handle, actual, expected
            )));
        }
        Ok(())
    }

    fn apply_barrier(&mut self, barrier: &ImageBarrier) -> Result<()> {
        let record = self
            .surfaces
            .get_mut(&barrier.surface)
            .ok_or_else(|| Error::accelerator(format!("Unknown surface {:?}", barrier.surface)))?;

        // An undefined source discards the contents and is legal from any state
        if barrier.src.layout != ImageLayout::Undefined && barrier.src != record.state {
            return Err(Error::accelerator(format!(
                "Barrier on {:?} claims {:?} but surface is {:?}",
                barrier.surface, barrier.src, record.state
            )));
        }
        record.state = barrier.dst;
        Ok(())
    }

    fn check_decode(&self, request: &DecodeRequest, bitstream: &[u8]) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::accelerator("Decode without a session"));
        }
        if !self.session_reset {
            return Err(Error::accelerator("Decode before the session was reset"));
        }

        self.expect_state(request.target, ResourceState::DECODE_TARGET, "Decode target")?;
        if request.setup.surface != request.target {
            return Err(Error::accelerator(format!(
                "Setup slot surface {:?} differs from target {:?}",
                request.setup.surface, request.target
            )));
        }

        if request.references.len() > self.caps.max_active_reference_pictures as usize {
            return Err(Error::accelerator(format!(
                "{} references exceed the limit of {}",
                request.references.len(),
                self.caps.max_active_reference_pictures
            )));
        }
        for reference in &request.references {
            if reference.surface == request.target || reference.slot == request.setup.slot {
                return Err(Error::accelerator(format!(
                    "Target slot {} appears in its own reference list",
                    request.setup.slot
                )));
            }
            self.expect_state(reference.surface, ResourceState::DECODE_REFERENCE, "Reference")?;
        }

        let offset_align = self.caps.min_bitstream_offset_alignment.max(1);
        let size_align = self.caps.min_bitstream_size_alignment.max(1);
        if request.bitstream_offset % offset_align != 0 {
            return Err(Error::accelerator(format!(
                "Bitstream offset {} not aligned to {}",
                request.bitstream_offset, offset_align
            )));
        }
        if request.bitstream_range == 0 || request.bitstream_range % size_align != 0 {
            return Err(Error::accelerator(format!(
                "Bitstream range {} not a positive multiple of {}",
                request.bitstream_range, size_align
            )));
        }
        let end = request.bitstream_offset + request.bitstream_range;
        if end > bitstream.len() as u64 {
            return Err(Error::accelerator(format!(
                "Bitstream region ends at {} past buffer of {} bytes",
                end,
                bitstream.len()
            )));
        }
        Ok(())
    }

    fn check_copy(&self, request: &CopyRequest) -> Result<()> {
        self.expect_state(request.src, ResourceState::TRANSFER_SRC, "Copy source")?;
        self.expect_state(request.dst, ResourceState::TRANSFER_DST, "Copy destination")?;

        let dst = self.surface(request.dst)?;
        if dst.kind != SurfaceKind::Output {
            return Err(Error::accelerator(format!(
                "Copy destination {:?} is not an output surface",
                request.dst
            )));
        }
        if request.plane as usize >= self.caps.picture_format.num_planes() {
            return Err(Error::accelerator(format!(
                "Plane {} does not exist in {}",
                request.plane, self.caps.picture_format
            )));
        }
        if request.width > dst.width || request.height > dst.height {
            return Err(Error::accelerator(format!(
                "Copy of {}x{} exceeds output surface {}x{}",
                request.width, request.height, dst.width, dst.height
            )));
        }
        Ok(())
    }

    fn semaphore_mut(&mut self, id: SemaphoreId) -> Result<&mut u32> {
        self.semaphores
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::accelerator(format!("Unknown semaphore {:?}", id)))
    }

    fn event_mut(&mut self, id: EventId) -> Result<&mut bool> {
        self.events
            .get_mut(id.0 as usize)
            .ok_or_else(|| Error::accelerator(format!("Unknown event {:?}", id)))
    }

    fn execute(&mut self, submission: &Submission, bitstream: &[u8]) -> Result<()> {
        if let Some(wait) = submission.wait {
            let pending = self.semaphore_mut(wait)?;
            if *pending == 0 {
                return Err(Error::accelerator(format!(
                    "Wait on semaphore {:?} that was never signaled",
                    wait
                )));
            }
            *pending -= 1;
        }

        for command in &submission.commands {
            match command {
                Command::Barrier(barrier) => self.apply_barrier(barrier)?,
                Command::ResetSession => {
                    if self.session.is_none() {
                        return Err(Error::accelerator("Reset without a session"));
                    }
                    self.session_reset = true;
                }
                Command::Decode(request) => {
                    if submission.engine != Engine::Decode {
                        return Err(Error::accelerator("Decode recorded on the graphics engine"));
                    }
                    self.check_decode(request, bitstream)?;
                }
                Command::CopyToOutput(request) => self.check_copy(request)?,
                Command::SetEvent(event) => *self.event_mut(*event)? = true,
                Command::WaitEvent(event) => {
                    if !*self.event_mut(*event)? {
                        return Err(Error::accelerator(format!(
                            "Wait on event {:?} before it was set",
                            event
                        )));
                    }
                }
                Command::ResetEvent(event) => *self.event_mut(*event)? = false,
            }
        }

        if let Some(signal) = submission.signal {
            *self.semaphore_mut(signal)? += 1;
        }
        Ok(())
    }
}

impl Default for RecordingAccelerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeAccelerator for RecordingAccelerator {
    fn name(&self) -> &str {
        "recording"
    }

    fn capabilities(&self, _profile: HwProfile) -> Result<AcceleratorCaps> {
        Ok(self.caps.clone())
    }

    fn create_session(&mut self, config: &SessionConfig) -> Result<()> {
        if config.coded_width > self.caps.max_coded_width
            || config.coded_height > self.caps.max_coded_height
        {
            return Err(Error::accelerator(format!(
                "Coded size {}x{} exceeds {}x{}",
                config.coded_width,
                config.coded_height,
                self.caps.max_coded_width,
                self.caps.max_coded_height
            )));
        }
        debug!(
            "Session: {:?} {}x{} {} slots",
            config.profile, config.coded_width, config.coded_height, config.max_dpb_slots
        );
        self.session = Some(config.clone());
        self.session_reset = false;
        Ok(())
    }

    fn upload_parameter_sets(&mut self, sps: &[Sps], pps: &[Pps]) -> Result<()> {
        if self.session.is_none() {
            return Err(Error::accelerator("Parameter upload without a session"));
        }
        self.uploaded_sps = sps.len();
        self.uploaded_pps = pps.len();
        Ok(())
    }

    fn create_dpb_surfaces(
        &mut self,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<Vec<SurfaceHandle>> {
        (0..count)
            .map(|_| self.create_surface(SurfaceKind::Dpb, width, height))
            .collect()
    }

    fn create_output_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle> {
        self.create_surface(SurfaceKind::Output, width, height)
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        self.semaphores.push(0);
        Ok(SemaphoreId(self.semaphores.len() as u32 - 1))
    }

    fn create_event(&mut self) -> Result<EventId> {
        self.events.push(false);
        Ok(EventId(self.events.len() as u32 - 1))
    }

    fn submit(&mut self, submission: &Submission, bitstream: &[u8]) -> Result<()> {
        let index = self.submit_count;
        self.submit_count += 1;
        if self.fail_at == Some(index) {
            return Err(Error::accelerator(format!(
                "Injected failure on submission {}",
                index
            )));
        }

        self.execute(submission, bitstream)?;
        trace!(
            "Submission {} on {:?}: {} commands",
            index,
            submission.engine,
            submission.commands.len()
        );
        self.accepted += 1;
        if submission.decode_request().is_some() {
            self.accepted_decodes += 1;
        }

        match self.history_limit {
            Some(0) => {}
            Some(limit) => {
                self.submissions.push(submission.clone());
                if self.submissions.len() > limit {
                    let excess = self.submissions.len() - limit;
                    self.submissions.drain(..excess);
                }
            }
            None => self.submissions.push(submission.clone()),
        }
        Ok(())
    }
}
