//! Functors: externally owned draw callbacks run inline by the render thread.
//!
//! A functor is the only sanctioned way for code outside the core to run on
//! the render thread during a draw. It must be self-contained: it may not wait
//! on anything owned by a control thread, since a control thread may itself be
//! blocked waiting for the draw that is invoking the functor.

use std::fmt;
use std::sync::Arc;

use crate::backend::Backend;
use crate::coords::{PixelBounds, Rect, Viewport};
use crate::handle::{DisplayListId, FunctorId};

/// Per-invocation context handed to a functor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FunctorInfo {
    /// Display list whose traversal reached the functor.
    pub display_list: DisplayListId,
    /// Size of the target being drawn (surface viewport or layer size).
    pub viewport: Viewport,
    /// Pixels the frame is allowed to touch.
    pub damage: PixelBounds,
    /// Clip active at the functor's position in the display list.
    pub clip: Option<Rect>,
    /// Number of frames the context has drawn before this one.
    pub frame_index: u64,
}

/// Draw code a backend frame can run inline.
pub trait DrawFunctor<B: Backend>: Send + Sync {
    fn draw(&self, frame: &mut B::Frame, info: &FunctorInfo);
}

impl<B, F> DrawFunctor<B> for F
where
    B: Backend,
    F: Fn(&mut B::Frame, &FunctorInfo) + Send + Sync,
{
    fn draw(&self, frame: &mut B::Frame, info: &FunctorInfo) {
        self(frame, info)
    }
}

/// Handle to a draw callback: a stable id plus the shared callback.
///
/// The owner keeps the `Functor` (or a clone) alive for as long as it is
/// attached; [`RenderProxy::detach_functor`](crate::proxy::RenderProxy::detach_functor)
/// must be issued before the backing state is torn down.
pub struct Functor<B: Backend> {
    id: FunctorId,
    callback: Arc<dyn DrawFunctor<B>>,
}

impl<B: Backend> Functor<B> {
    pub fn new(callback: impl DrawFunctor<B> + 'static) -> Self {
        Self {
            id: FunctorId::next(),
            callback: Arc::new(callback),
        }
    }

    /// Wraps a closure. Prefer this over [`new`](Self::new) for closures so
    /// their argument types are inferred.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut B::Frame, &FunctorInfo) + Send + Sync + 'static,
    {
        Self::new(f)
    }

    #[inline]
    pub fn id(&self) -> FunctorId {
        self.id
    }

    pub(crate) fn invoke(&self, frame: &mut B::Frame, info: &FunctorInfo) {
        self.callback.draw(frame, info);
    }
}

impl<B: Backend> Clone for Functor<B> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<B: Backend> fmt::Debug for Functor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Functor").field(&self.id).finish()
    }
}
