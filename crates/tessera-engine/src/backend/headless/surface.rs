use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::Bitmap;

static NEXT_SURFACE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct SurfaceState {
    front: Option<Bitmap>,
    presents: u64,
}

/// In-memory presentation target for the headless backend.
///
/// Clones share the same front buffer: the surface owner keeps one clone to
/// inspect what was presented, the render thread holds the other while bound.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    id: u64,
    label: Arc<str>,
    unallocatable: bool,
    state: Arc<Mutex<SurfaceState>>,
    dropped: Arc<AtomicU64>,
}

impl HeadlessSurface {
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SURFACE.fetch_add(1, Ordering::Relaxed),
            label: label.into(),
            unallocatable: false,
            state: Arc::new(Mutex::new(SurfaceState::default())),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A surface whose backing buffers can never be allocated.
    ///
    /// Binding it fails with `AllocationFailure`, the way a platform surface
    /// fails when the compositor is out of buffer memory.
    pub fn unallocatable(label: impl Into<Arc<str>>) -> Self {
        Self {
            unallocatable: true,
            ..Self::new(label)
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub(crate) fn is_unallocatable(&self) -> bool {
        self.unallocatable
    }

    /// Copy of the last presented frame, if any.
    pub fn snapshot(&self) -> Option<Bitmap> {
        self.state.lock().front.clone()
    }

    /// Premultiplied RGBA of the last presented frame at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.state.lock().front.as_ref().and_then(|b| b.pixel(x, y))
    }

    /// Number of frames presented to this surface.
    pub fn present_count(&self) -> u64 {
        self.state.lock().presents
    }

    /// Frames that could not be presented because the owner held the surface lock.
    pub fn dropped_presents(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Publishes `frame` as the new front buffer.
    ///
    /// Called on the render thread. Never waits for the owner: if the owner is
    /// reading the front buffer right now, this frame's presentation is dropped.
    pub(crate) fn present(&self, frame: &Bitmap) -> bool {
        match self.state.try_lock() {
            Some(mut state) => {
                match state.front.as_mut() {
                    Some(front) if front.width() == frame.width() && front.height() == frame.height() => {
                        front.clone_from(frame);
                    }
                    _ => state.front = Some(frame.clone()),
                }
                state.presents += 1;
                true
            }
            None => {
                log::warn!("headless surface '{}' busy; dropping presentation", self.label);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl PartialEq for HeadlessSurface {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HeadlessSurface {}
