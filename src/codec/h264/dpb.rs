//! Decoded picture buffer management
//!
//! The DPB is a fixed pool of accelerator surfaces. Each decode writes into
//! the slot returned by [`DpbManager::allocate_current_slot`]; reference
//! pictures are then kept in a FIFO [`ReferenceRing`] until they rotate out.
//! Slot reuse follows ring rotation, so the picture being decoded never
//! overwrites a surface it also reads from.
//!
//! Besides slot bookkeeping the manager tracks each slot's resource state and
//! produces the barriers needed to move a slot between being written,
//! being copied from and being read as a reference.

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::hwaccel::{ImageBarrier, ReferenceSlot, ResourceState, SurfaceHandle};

/// Maximum DPB size in H.264 (16 references plus the current picture)
pub const MAX_DPB_SLOTS: usize = 17;

/// Coding type of a picture as far as the DPB is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum FrameType {
    /// IDR picture; drops every reference
    Intra,
    Predictive,
}

/// One decode-target surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DpbSlot {
    pub surface: SurfaceHandle,
    pub state: ResourceState,
    pub poc: i32,
    pub frame_num: u32,
    pub in_use_as_reference: bool,
}

/// Slot indices usable as references, oldest first
#[derive(Debug, Clone)]
pub struct ReferenceRing {
    slots: VecDeque<usize>,
    capacity: usize,
}

impl ReferenceRing {
    pub fn new(capacity: usize) -> Self {
        ReferenceRing {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a slot, returning the slot evicted to make room
    pub fn push(&mut self, slot: usize) -> Option<usize> {
        if self.capacity == 0 {
            return Some(slot);
        }
        let evicted = if self.slots.len() == self.capacity {
            self.slots.pop_front()
        } else {
            None
        };
        self.slots.push_back(slot);
        evicted
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.slots.contains(&slot)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().copied()
    }
}

/// References for one decode plus the slot it writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceList {
    pub references: Vec<ReferenceSlot>,
    pub setup: ReferenceSlot,
}

/// Slot assignment and reference rotation over a fixed surface pool
#[derive(Debug, Clone)]
pub struct DpbManager {
    slots: [DpbSlot; MAX_DPB_SLOTS],
    num_slots: usize,
    max_reference_pictures: usize,
    ring: ReferenceRing,
    next_ref: usize,
    next_slot: usize,
    current: Option<usize>,
}

impl DpbManager {
    /// Create a manager over the first `num_slots` of `surfaces`
    ///
    /// The reference ring holds at most `min(num_slots - 1, max_reference_pictures)`
    /// entries; a lower reference limit than the slot count allows is logged.
    pub fn new(
        num_slots: usize,
        max_reference_pictures: usize,
        surfaces: &[SurfaceHandle],
    ) -> Result<Self> {
        if num_slots == 0 || num_slots > MAX_DPB_SLOTS {
            return Err(Error::invalid_input(format!(
                "DPB slot count {} outside 1..={}",
                num_slots, MAX_DPB_SLOTS
            )));
        }
        if surfaces.len() < num_slots {
            return Err(Error::invalid_input(format!(
                "{} DPB slots need as many surfaces, got {}",
                num_slots,
                surfaces.len()
            )));
        }

        let ring_capacity = (num_slots - 1).min(max_reference_pictures);
        if ring_capacity < num_slots - 1 {
            warn!(
                "Reference ring limited to {} pictures by the accelerator ({} DPB slots)",
                ring_capacity, num_slots
            );
        }

        let mut slots = [DpbSlot::default(); MAX_DPB_SLOTS];
        for (slot, &surface) in slots.iter_mut().zip(surfaces) {
            slot.surface = surface;
        }

        debug!(
            "DPB: {} slots, {} max references, ring capacity {}",
            num_slots, max_reference_pictures, ring_capacity
        );

        Ok(DpbManager {
            slots,
            num_slots,
            max_reference_pictures,
            ring: ReferenceRing::new(ring_capacity),
            next_ref: 0,
            next_slot: 0,
            current: None,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn max_reference_pictures(&self) -> usize {
        self.max_reference_pictures
    }

    pub fn ring(&self) -> &ReferenceRing {
        &self.ring
    }

    /// Slot of the picture being decoded, once allocated
    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    /// Position the next committed reference takes in the ring
    pub fn next_ref(&self) -> usize {
        self.next_ref
    }

    pub fn slot(&self, index: usize) -> Option<&DpbSlot> {
        self.slots[..self.num_slots].get(index)
    }

    pub fn slots(&self) -> &[DpbSlot] {
        &self.slots[..self.num_slots]
    }

    /// Pick the slot the next picture is decoded into
    pub fn allocate_current_slot(
        &mut self,
        frame_type: FrameType,
        poc: i32,
        frame_num: u32,
    ) -> Result<usize> {
        if frame_type == FrameType::Intra {
            self.clear_references();
            self.next_ref = 0;
            self.next_slot = 0;
        }

        let current = self.next_slot;
        if self.ring.contains(current) {
            return Err(Error::invalid_state(format!(
                "DPB slot {} is still a reference",
                current
            )));
        }

        let slot = &mut self.slots[current];
        slot.poc = poc;
        slot.frame_num = frame_num;
        self.current = Some(current);

        trace!("DPB slot {} <- poc {} frame_num {}", current, poc, frame_num);
        Ok(current)
    }

    fn current_index(&self) -> Result<usize> {
        self.current
            .ok_or_else(|| Error::invalid_state("No DPB slot allocated for the current picture"))
    }

    fn reference_slot(&self, index: usize) -> ReferenceSlot {
        let slot = &self.slots[index];
        ReferenceSlot {
            slot: index,
            surface: slot.surface,
            poc: slot.poc,
            frame_num: slot.frame_num,
        }
    }

    /// References for the current picture, oldest first, plus its setup slot
    pub fn build_reference_list(&self) -> Result<ReferenceList> {
        let current = self.current_index()?;
        Ok(ReferenceList {
            references: self.ring.iter().map(|i| self.reference_slot(i)).collect(),
            setup: self.reference_slot(current),
        })
    }

    /// Keep the current picture as a reference when `priority > 0`
    pub fn commit_reference(&mut self, priority: u8) -> Result<()> {
        let current = self.current_index()?;
        if priority == 0 {
            return Ok(());
        }

        if let Some(evicted) = self.ring.push(current) {
            self.slots[evicted].in_use_as_reference = false;
        }
        if self.ring.contains(current) {
            self.slots[current].in_use_as_reference = true;
        }

        if self.ring.capacity() > 0 {
            self.next_ref = (self.next_ref + 1) % self.ring.capacity();
        }
        self.next_slot = (self.next_slot + 1) % self.num_slots;
        Ok(())
    }

    fn clear_references(&mut self) {
        self.ring.clear();
        for slot in self.slots.iter_mut() {
            slot.in_use_as_reference = false;
        }
    }

    /// Forget every reference; used when playback stops
    pub fn reset_reference_usage(&mut self) {
        self.clear_references();
        self.next_ref = 0;
        self.next_slot = 0;
        self.current = None;
    }

    /// Move a slot to `dst`, returning the barrier if its state changes
    pub fn transition(&mut self, index: usize, dst: ResourceState) -> Option<ImageBarrier> {
        let slot = &mut self.slots[index];
        if slot.state == dst {
            return None;
        }
        let barrier = ImageBarrier {
            surface: slot.surface,
            src: slot.state,
            dst,
        };
        slot.state = dst;
        Some(barrier)
    }

    /// Current slot becomes the decode output
    pub fn target_barrier(&mut self) -> Result<Option<ImageBarrier>> {
        let current = self.current_index()?;
        Ok(self.transition(current, ResourceState::DECODE_TARGET))
    }

    /// Every reference becomes readable by the decoder
    pub fn reference_barriers(&mut self, list: &ReferenceList) -> Vec<ImageBarrier> {
        list.references
            .iter()
            .filter_map(|r| self.transition(r.slot, ResourceState::DECODE_REFERENCE))
            .collect()
    }

    /// Current slot becomes a copy source
    pub fn copy_source_barrier(&mut self) -> Result<Option<ImageBarrier>> {
        let current = self.current_index()?;
        Ok(self.transition(current, ResourceState::TRANSFER_SRC))
    }

    /// Current slot returns to the reference state after the copy
    pub fn reference_ready_barrier(&mut self) -> Result<Option<ImageBarrier>> {
        let current = self.current_index()?;
        Ok(self.transition(current, ResourceState::DECODE_REFERENCE))
    }
}
