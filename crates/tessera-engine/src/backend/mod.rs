//! GPU backend contract.
//!
//! A backend is created on the render thread and never leaves it. It owns the
//! device-level state; per-proxy state lives in its `Canvas`. The render thread
//! drives it through this trait:
//! - surface binding and resize
//! - frame begin / per-op rasterization / flush / end
//! - optional offscreen layers, gated by [`Capabilities`]
//!
//! The display-list traversal itself (functor dispatch, layer lookup) belongs
//! to the render thread, so every backend gets the same ordering guarantees.

mod bitmap;
pub mod gpu;
pub mod headless;

use bitflags::bitflags;

use crate::coords::{PixelBounds, Rect, Viewport};
use crate::display::DrawItem;
use crate::error::RenderError;

pub use bitmap::Bitmap;

bitflags! {
    /// Optional features a backend may provide.
    ///
    /// Operations that need a missing capability fail with
    /// [`RenderError::UnsupportedOperation`] without reaching the render thread.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Offscreen display-list layers.
        const LAYERS = 1 << 0;
        /// Reading layer pixels back to the CPU.
        const LAYER_READBACK = 1 << 1;
        /// Inline functor invocation during draws.
        const FUNCTORS = 1 << 2;
        /// Dirty-region scoped repaint; without it every draw repaints the whole target.
        const PARTIAL_REDRAW = 1 << 3;
    }
}

/// Render-thread side of a GPU backend.
///
/// No method may block on anything owned by a control thread.
pub trait Backend: 'static {
    /// Platform surface handed over by the surface owner.
    type Surface: Send + 'static;
    /// Per-proxy state (surface binding, back buffers, configuration).
    type Canvas;
    /// Offscreen render target.
    type Layer;
    /// An in-flight frame. Functors receive it to record their own drawing.
    type Frame;

    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Allocates per-proxy state configured for translucent or opaque composition.
    fn create_canvas(&mut self, translucent: bool) -> Result<Self::Canvas, RenderError>;

    /// Binds `surface`, replacing any previous binding.
    ///
    /// On error the previous binding is already gone and the canvas has no surface.
    fn bind_surface(
        &mut self,
        canvas: &mut Self::Canvas,
        surface: Self::Surface,
        viewport: Option<Viewport>,
    ) -> Result<(), RenderError>;

    /// Releases the surface binding, if any.
    fn unbind_surface(&mut self, canvas: &mut Self::Canvas);

    /// Records the viewport. With a surface bound, buffers for the new size
    /// must be obtainable; an error leaves the binding in place.
    fn resize(&mut self, canvas: &mut Self::Canvas, viewport: Viewport) -> Result<(), RenderError>;

    /// Starts a frame repainting `damage`.
    ///
    /// `Ok(None)` means the surface cannot produce a frame right now (lost,
    /// outdated, timed out); the draw is skipped.
    fn begin_frame(
        &mut self,
        canvas: &mut Self::Canvas,
        damage: PixelBounds,
    ) -> Result<Option<Self::Frame>, RenderError>;

    /// Rasterizes `Clear` and `FillRect` items. Functor and layer ops never reach it.
    fn draw_op(&mut self, frame: &mut Self::Frame, item: &DrawItem);

    /// Makes all previously recorded ops visible to code that draws directly
    /// into the frame. Called before every functor invocation.
    fn flush(&mut self, frame: &mut Self::Frame) {
        let _ = frame;
    }

    /// Submits the frame and queues it for presentation.
    fn end_frame(&mut self, canvas: &mut Self::Canvas, frame: Self::Frame) -> Result<(), RenderError>;

    fn create_layer(&mut self, width: u32, height: u32) -> Result<Self::Layer, RenderError> {
        let _ = (width, height);
        Err(RenderError::UnsupportedOperation(Capabilities::LAYERS))
    }

    /// Starts re-recording a layer's contents. The layer is cleared first.
    fn begin_layer_frame(&mut self, layer: &mut Self::Layer) -> Result<Self::Frame, RenderError> {
        let _ = layer;
        Err(RenderError::UnsupportedOperation(Capabilities::LAYERS))
    }

    fn end_layer_frame(&mut self, layer: &mut Self::Layer, frame: Self::Frame) {
        let _ = (layer, frame);
    }

    /// Composites `layer` into the frame at `dst`.
    fn draw_layer(&mut self, frame: &mut Self::Frame, layer: &Self::Layer, dst: Rect, clip: Option<Rect>) {
        let _ = (frame, layer, dst, clip);
    }

    fn copy_layer(&mut self, layer: &Self::Layer) -> Result<Bitmap, RenderError> {
        let _ = layer;
        Err(RenderError::UnsupportedOperation(Capabilities::LAYER_READBACK))
    }

    /// Frees the layer's GPU backing immediately.
    fn destroy_layer(&mut self, layer: Self::Layer) {
        drop(layer);
    }

    /// Drops transient caches (pipelines stay, scratch buffers go).
    fn trim_caches(&mut self, canvas: &mut Self::Canvas) {
        let _ = canvas;
    }

    /// Tears down the canvas, releasing its surface binding.
    fn destroy_canvas(&mut self, canvas: Self::Canvas);
}
