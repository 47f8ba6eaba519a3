//! Playback scheduling
//!
//! The scheduler runs once per host tick. It first advances the display
//! cursor by the elapsed time, then decodes at most one frame, as long as
//! the number of decoded-but-not-retired surfaces stays under the in-flight
//! cap. Display time and decode cadence are independent: a slow decoder
//! stalls the display on its last picture rather than skipping frames.

use tracing::{debug, info, trace, warn};

use super::surface::{OutputSurface, SurfacePool};
use crate::error::Result;
use crate::hwaccel::SurfaceHandle;

/// Default upper bound on output surfaces in flight
pub const DEFAULT_MAX_TEXTURE_COUNT: usize = 64;

/// Where decode and display currently are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackCursor {
    /// Next frame to decode, in decode order
    pub decode_index: usize,
    /// Frame being displayed, in display order
    pub play_index: usize,
    /// Position of the displayed surface in the used pool
    pub frame_index_in_used_pool: Option<usize>,
    pub is_stopped: bool,
}

/// Work the scheduler hands out each tick
pub trait FrameSink {
    /// Create a new output surface when the free pool is empty
    fn create_surface(&mut self) -> Result<OutputSurface>;

    /// Decode frame `decode_index` into `surface` and return it filled
    fn decode(&mut self, decode_index: usize, surface: OutputSurface) -> Result<OutputSurface>;

    /// Drop all reference state; called once playback has stopped
    fn reset_references(&mut self);
}

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tick {
    /// Decode index of the frame decoded this tick
    pub decoded: Option<usize>,
    /// Display frames advanced
    pub advanced: usize,
    /// Decode was skipped because too many surfaces are in flight
    pub throttled: bool,
}

/// Decode/display cursor over a fixed number of frames
#[derive(Debug)]
pub struct PlaybackScheduler {
    cursor: PlaybackCursor,
    frame_count: usize,
    num_dpb_slots: usize,
    max_in_flight: usize,
    ready_threshold: usize,
    decoded_count: usize,
    prepared: bool,
    /// Overshoot carried to a display frame that is not decoded yet
    pending_carry: f64,
    pool: SurfacePool,
}

impl PlaybackScheduler {
    /// `max_texture_count` caps output surfaces together with the DPB size:
    /// at most `min(max_texture_count, num_dpb_slots + 1)` are in flight.
    ///
    /// Display starts once `min(num_dpb_slots, frame_count)` frames are
    /// decoded, or as many as the in-flight cap allows.
    pub fn new(frame_count: usize, num_dpb_slots: usize, max_texture_count: usize) -> Self {
        let max_in_flight = max_texture_count.min(num_dpb_slots + 1).max(1);
        let ready_threshold = num_dpb_slots.min(frame_count).min(max_in_flight);
        debug!(
            "Scheduler: {} frames, {} surfaces in flight, ready after {}",
            frame_count, max_in_flight, ready_threshold
        );

        PlaybackScheduler {
            cursor: PlaybackCursor::default(),
            frame_count,
            num_dpb_slots,
            max_in_flight,
            ready_threshold,
            decoded_count: 0,
            prepared: false,
            pending_carry: 0.0,
            pool: SurfacePool::new(),
        }
    }

    /// Raise the in-flight cap to fit `reorder_depth` pictures that are
    /// decoded ahead of one still waiting to be displayed
    ///
    /// With a lower cap the used pool fills with later pictures while the
    /// display waits on a frame that decode is throttled from producing.
    pub fn with_reorder_depth(mut self, reorder_depth: usize) -> Self {
        let needed = reorder_depth + 1;
        if needed > self.max_in_flight {
            warn!(
                "Raising surfaces in flight from {} to {} for reordered pictures",
                self.max_in_flight, needed
            );
            self.max_in_flight = needed;
            self.ready_threshold = self
                .num_dpb_slots
                .min(self.frame_count)
                .min(self.max_in_flight);
        }
        self
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Enough frames are decoded to start displaying
    pub fn is_ready(&self) -> bool {
        self.prepared
    }

    pub fn is_stopped(&self) -> bool {
        self.cursor.is_stopped
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    /// Surface the consumer should show
    ///
    /// The surface for the current display position, or the closest decoded
    /// one while that frame is still in flight.
    pub fn current_surface(&self) -> Option<&OutputSurface> {
        let play = self.cursor.play_index as u32;
        self.pool
            .find(play)
            .or_else(|| self.pool.nearest(play))
            .map(|i| &self.pool.used()[i])
    }

    pub fn current_surface_handle(&self) -> Option<SurfaceHandle> {
        self.current_surface().map(|s| s.surface)
    }

    /// Run one tick
    pub fn update<F: FrameSink + ?Sized>(&mut self, elapsed: f64, sink: &mut F) -> Result<Tick> {
        let mut tick = Tick::default();

        if self.prepared && !self.cursor.is_stopped {
            tick.advanced = self.advance_display(elapsed);
        }

        if self.cursor.is_stopped {
            sink.reset_references();
            return Ok(tick);
        }

        if self.pool.used_count() >= self.max_in_flight {
            trace!(
                "Decode throttled: {} surfaces in flight",
                self.pool.used_count()
            );
            tick.throttled = true;
            return Ok(tick);
        }

        if self.cursor.decode_index < self.frame_count {
            let surface = match self.pool.acquire() {
                Some(surface) => surface,
                None => sink.create_surface()?,
            };

            let index = self.cursor.decode_index;
            let decoded = sink.decode(index, surface)?;
            self.pool.push_used(decoded);
            self.cursor.decode_index += 1;
            self.decoded_count += 1;
            tick.decoded = Some(index);

            if !self.prepared && self.decoded_count >= self.ready_threshold {
                self.prepared = true;
                info!("Playback ready after {} decoded frames", self.decoded_count);
            }
        }

        self.cursor.frame_index_in_used_pool = self.pool.find(self.cursor.play_index as u32);
        Ok(tick)
    }

    fn advance_display(&mut self, elapsed: f64) -> usize {
        let mut advanced = 0;
        let Some(mut index) = self.pool.find(self.cursor.play_index as u32) else {
            self.pending_carry -= elapsed;
            return 0;
        };

        let used = self.pool.used_mut();
        used[index].remaining_seconds += self.pending_carry - elapsed;
        self.pending_carry = 0.0;

        while self.pool.used()[index].remaining_seconds <= 0.0 {
            if self.cursor.play_index + 1 >= self.frame_count {
                self.cursor.play_index = self.frame_count.saturating_sub(1);
                self.cursor.is_stopped = true;
                info!("Playback stopped at frame {}", self.cursor.play_index);
                break;
            }

            let carry = self.pool.used()[index].remaining_seconds;
            self.pool.retire(index);
            self.cursor.play_index += 1;
            advanced += 1;

            match self.pool.find(self.cursor.play_index as u32) {
                Some(next) => {
                    index = next;
                    self.pool.used_mut()[index].remaining_seconds += carry;
                }
                None => {
                    // next picture still in flight
                    self.pending_carry = carry;
                    break;
                }
            }
        }

        self.cursor.frame_index_in_used_pool = self.pool.find(self.cursor.play_index as u32);
        advanced
    }
}
