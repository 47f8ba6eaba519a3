//! Output surfaces and their pools

use crate::hwaccel::SurfaceHandle;

/// Whether an output surface has ever received a picture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceLifecycle {
    /// Freshly created; contents undefined
    #[default]
    Init,
    /// Holds a decoded picture and is readable by the presentation engine
    Ready,
}

/// A display-format surface carrying one decoded picture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSurface {
    pub surface: SurfaceHandle,
    pub display_order: u32,
    pub duration_seconds: f64,
    /// Display time left before the next picture is shown
    pub remaining_seconds: f64,
    pub lifecycle: SurfaceLifecycle,
}

impl OutputSurface {
    pub fn new(surface: SurfaceHandle) -> Self {
        OutputSurface {
            surface,
            display_order: 0,
            duration_seconds: 0.0,
            remaining_seconds: 0.0,
            lifecycle: SurfaceLifecycle::Init,
        }
    }

    /// Tag the surface with the frame about to be written into it
    pub fn assign(&mut self, display_order: u32, duration_seconds: f64) {
        self.display_order = display_order;
        self.duration_seconds = duration_seconds;
        self.remaining_seconds = duration_seconds;
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle == SurfaceLifecycle::Ready
    }
}

/// Free and used output surfaces
///
/// A surface is moved between the two lists, never copied, so it is owned by
/// exactly one of them at a time.
#[derive(Debug, Default)]
pub struct SurfacePool {
    free: Vec<OutputSurface>,
    /// Decoded and waiting for or being displayed, in decode order
    used: Vec<OutputSurface>,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a free surface, if any
    pub fn acquire(&mut self) -> Option<OutputSurface> {
        self.free.pop()
    }

    pub fn release(&mut self, surface: OutputSurface) {
        self.free.push(surface);
    }

    pub fn push_used(&mut self, surface: OutputSurface) {
        self.used.push(surface);
    }

    /// Move the used surface at `index` back to the free list
    pub fn retire(&mut self, index: usize) -> Option<SurfaceHandle> {
        if index >= self.used.len() {
            return None;
        }
        let surface = self.used.remove(index);
        let handle = surface.surface;
        self.free.push(surface);
        Some(handle)
    }

    pub fn used(&self) -> &[OutputSurface] {
        &self.used
    }

    pub fn used_mut(&mut self) -> &mut [OutputSurface] {
        &mut self.used
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Index of the used surface showing `display_order`
    pub fn find(&self, display_order: u32) -> Option<usize> {
        self.used
            .iter()
            .position(|s| s.display_order == display_order)
    }

    /// Index of the used surface closest to `display_order`
    pub fn nearest(&self, display_order: u32) -> Option<usize> {
        self.used
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.display_order.abs_diff(display_order))
            .map(|(i, _)| i)
    }
}
