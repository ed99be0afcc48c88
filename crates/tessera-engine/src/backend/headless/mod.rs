//! Headless CPU backend.
//!
//! Rasterizes display lists into RGBA8 bitmaps and "presents" them into
//! [`HeadlessSurface`]s. Supports every capability, including layers and
//! readback, and lets callers impose allocation budgets to exercise the
//! out-of-memory paths without a GPU.

mod surface;

use crate::coords::{Color, PixelBounds, Rect, Viewport};
use crate::display::{DrawItem, DrawOp};
use crate::error::RenderError;

use super::{Backend, Bitmap, Capabilities};

pub use surface::HeadlessSurface;

/// Headless backend configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Maximum number of live canvases. `None` = unbounded.
    pub max_canvases: Option<usize>,

    /// Largest single pixel buffer (back buffer or layer) in bytes.
    pub max_buffer_bytes: usize,

    /// Capabilities to advertise. Masking some off is how callers test the
    /// unsupported-operation paths.
    pub capabilities: Capabilities,

    /// Color opaque canvases clear their damage to before each frame.
    pub opaque_clear: Color,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            max_canvases: None,
            max_buffer_bytes: 256 * 1024 * 1024,
            capabilities: Capabilities::all(),
            opaque_clear: Color::BLACK,
        }
    }
}

pub struct HeadlessBackend {
    config: HeadlessConfig,
    live_canvases: usize,
}

/// Per-proxy state: bound surface plus the back buffer frames are drawn into.
pub struct HeadlessCanvas {
    translucent: bool,
    surface: Option<HeadlessSurface>,
    viewport: Option<Viewport>,
    back: Bitmap,
}

/// In-flight frame. Functors draw through [`fill_rect`](Self::fill_rect) or
/// directly into [`target_mut`](Self::target_mut).
pub struct HeadlessFrame {
    target: Bitmap,
    damage: PixelBounds,
}

pub struct HeadlessLayer {
    pixels: Bitmap,
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> Self {
        Self { config, live_canvases: 0 }
    }

    pub fn live_canvases(&self) -> usize {
        self.live_canvases
    }

    fn check_budget(&self, what: &str, viewport: Viewport) -> Result<(), RenderError> {
        let bytes = viewport.rgba8_bytes();
        if bytes > self.config.max_buffer_bytes {
            return Err(RenderError::allocation(format!(
                "{what} {}x{} needs {bytes} bytes, budget is {}",
                viewport.width, viewport.height, self.config.max_buffer_bytes
            )));
        }
        Ok(())
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessCanvas {
    pub fn surface(&self) -> Option<&HeadlessSurface> {
        self.surface.as_ref()
    }
}

impl HeadlessFrame {
    /// Pixels this frame may modify.
    #[inline]
    pub fn damage(&self) -> PixelBounds {
        self.damage
    }

    #[inline]
    pub fn target(&self) -> &Bitmap {
        &self.target
    }

    #[inline]
    pub fn target_mut(&mut self) -> &mut Bitmap {
        &mut self.target
    }

    /// Source-over fill, limited to the frame's damage.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(area) = rect
            .pixel_bounds(self.target.width(), self.target.height())
            .and_then(|b| b.intersect(self.damage))
        else {
            return;
        };
        self.target.blend(area, color);
    }

    fn clip_area(&self, clip: Option<Rect>) -> Option<PixelBounds> {
        match clip {
            None => Some(self.damage),
            Some(c) => c
                .pixel_bounds(self.target.width(), self.target.height())
                .and_then(|b| b.intersect(self.damage)),
        }
    }
}

impl HeadlessLayer {
    pub fn pixels(&self) -> &Bitmap {
        &self.pixels
    }
}

impl Backend for HeadlessBackend {
    type Surface = HeadlessSurface;
    type Canvas = HeadlessCanvas;
    type Layer = HeadlessLayer;
    type Frame = HeadlessFrame;

    fn name(&self) -> &'static str {
        "headless"
    }

    fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    fn create_canvas(&mut self, translucent: bool) -> Result<HeadlessCanvas, RenderError> {
        if let Some(max) = self.config.max_canvases {
            if self.live_canvases >= max {
                return Err(RenderError::allocation(format!("canvas limit reached ({max} live)")));
            }
        }
        self.live_canvases += 1;
        log::debug!("headless canvas created (translucent={translucent}, live={})", self.live_canvases);

        Ok(HeadlessCanvas {
            translucent,
            surface: None,
            viewport: None,
            back: Bitmap::default(),
        })
    }

    fn bind_surface(
        &mut self,
        canvas: &mut HeadlessCanvas,
        surface: HeadlessSurface,
        viewport: Option<Viewport>,
    ) -> Result<(), RenderError> {
        canvas.surface = None;
        // The back buffer holds the previous surface's last frame.
        canvas.back = Bitmap::default();

        if surface.is_unallocatable() {
            return Err(RenderError::allocation(format!(
                "buffers for surface '{}'",
                surface.label()
            )));
        }
        if let Some(vp) = viewport {
            self.check_budget("back buffer", vp)?;
        }

        log::debug!("headless surface '{}' bound", surface.label());
        canvas.surface = Some(surface);
        Ok(())
    }

    fn unbind_surface(&mut self, canvas: &mut HeadlessCanvas) {
        if let Some(surface) = canvas.surface.take() {
            log::debug!("headless surface '{}' unbound", surface.label());
        }
    }

    fn resize(&mut self, canvas: &mut HeadlessCanvas, viewport: Viewport) -> Result<(), RenderError> {
        canvas.viewport = Some(viewport);
        if canvas.surface.is_some() {
            self.check_budget("back buffer", viewport)?;
        }
        Ok(())
    }

    fn begin_frame(
        &mut self,
        canvas: &mut HeadlessCanvas,
        damage: PixelBounds,
    ) -> Result<Option<HeadlessFrame>, RenderError> {
        let Some(viewport) = canvas.viewport.filter(|vp| !vp.is_empty()) else {
            return Ok(None);
        };
        if canvas.surface.is_none() {
            return Ok(None);
        }

        if canvas.back.width() != viewport.width || canvas.back.height() != viewport.height {
            self.check_budget("back buffer", viewport)?;
            canvas.back = Bitmap::new(viewport.width, viewport.height);
        }

        let mut target = std::mem::take(&mut canvas.back);
        let clear = if canvas.translucent { Color::TRANSPARENT } else { self.config.opaque_clear };
        target.fill(damage, clear);

        Ok(Some(HeadlessFrame { target, damage }))
    }

    fn draw_op(&mut self, frame: &mut HeadlessFrame, item: &DrawItem) {
        let Some(area) = frame.clip_area(item.clip) else { return };
        match item.op {
            DrawOp::Clear(color) => frame.target.fill(area, color),
            DrawOp::FillRect { rect, color } => {
                let Some(cover) = rect
                    .pixel_bounds(frame.target.width(), frame.target.height())
                    .and_then(|b| b.intersect(area))
                else {
                    return;
                };
                frame.target.blend(cover, color);
            }
            DrawOp::Functor(_) | DrawOp::Layer { .. } => {}
        }
    }

    fn end_frame(&mut self, canvas: &mut HeadlessCanvas, frame: HeadlessFrame) -> Result<(), RenderError> {
        if let Some(surface) = canvas.surface.as_ref() {
            surface.present(&frame.target);
        }
        canvas.back = frame.target;
        Ok(())
    }

    fn create_layer(&mut self, width: u32, height: u32) -> Result<HeadlessLayer, RenderError> {
        let size = Viewport::new(width, height);
        if size.is_empty() {
            return Err(RenderError::allocation(format!("empty layer {width}x{height}")));
        }
        self.check_budget("layer", size)?;
        Ok(HeadlessLayer { pixels: Bitmap::new(width, height) })
    }

    fn begin_layer_frame(&mut self, layer: &mut HeadlessLayer) -> Result<HeadlessFrame, RenderError> {
        let mut target = std::mem::take(&mut layer.pixels);
        let damage = target.bounds();
        target.fill(damage, Color::TRANSPARENT);
        Ok(HeadlessFrame { target, damage })
    }

    fn end_layer_frame(&mut self, layer: &mut HeadlessLayer, frame: HeadlessFrame) {
        layer.pixels = frame.target;
    }

    fn draw_layer(&mut self, frame: &mut HeadlessFrame, layer: &HeadlessLayer, dst: Rect, clip: Option<Rect>) {
        let Some(area) = frame.clip_area(clip) else { return };
        let Some(dst_area) = dst
            .pixel_bounds(frame.target.width(), frame.target.height())
            .and_then(|b| b.intersect(area))
        else {
            return;
        };
        let origin = dst.normalized();
        frame.target.blit(
            &layer.pixels,
            origin.x.round() as i64,
            origin.y.round() as i64,
            dst_area,
        );
    }

    fn copy_layer(&mut self, layer: &HeadlessLayer) -> Result<Bitmap, RenderError> {
        if !self.config.capabilities.contains(Capabilities::LAYER_READBACK) {
            return Err(RenderError::UnsupportedOperation(Capabilities::LAYER_READBACK));
        }
        Ok(layer.pixels.clone())
    }

    fn trim_caches(&mut self, canvas: &mut HeadlessCanvas) {
        // Without a surface the back buffer is dead weight until the next bind.
        if canvas.surface.is_none() {
            canvas.back = Bitmap::default();
        }
    }

    fn destroy_canvas(&mut self, mut canvas: HeadlessCanvas) {
        self.unbind_surface(&mut canvas);
        self.live_canvases = self.live_canvases.saturating_sub(1);
        log::debug!("headless canvas destroyed (live={})", self.live_canvases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayListRecorder;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn red() -> Color {
        Color::from_rgba8(255, 0, 0, 255)
    }

    fn ready_canvas(backend: &mut HeadlessBackend, surface: &HeadlessSurface) -> HeadlessCanvas {
        let mut canvas = backend.create_canvas(false).unwrap();
        backend.resize(&mut canvas, Viewport::new(8, 8)).unwrap();
        backend.bind_surface(&mut canvas, surface.clone(), Some(Viewport::new(8, 8))).unwrap();
        canvas
    }

    #[test]
    fn canvas_limit_reports_allocation_failure() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            max_canvases: Some(1),
            ..HeadlessConfig::default()
        });
        let first = backend.create_canvas(false).unwrap();
        assert!(matches!(
            backend.create_canvas(true),
            Err(RenderError::AllocationFailure { .. })
        ));

        backend.destroy_canvas(first);
        assert!(backend.create_canvas(true).is_ok());
    }

    #[test]
    fn frame_is_scoped_to_damage() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("main");
        let mut canvas = ready_canvas(&mut backend, &surface);

        let mut rec = DisplayListRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), red());
        let list = rec.finish();

        let damage = PixelBounds { x0: 0, y0: 0, x1: 4, y1: 4 };
        let mut frame = backend.begin_frame(&mut canvas, damage).unwrap().unwrap();
        for item in list.items() {
            backend.draw_op(&mut frame, item);
        }
        backend.end_frame(&mut canvas, frame).unwrap();

        assert_eq!(surface.pixel(3, 3), Some(RED));
        assert_eq!(surface.pixel(4, 4), Some([0, 0, 0, 0]));
        assert_eq!(surface.present_count(), 1);
    }

    #[test]
    fn begin_frame_without_surface_or_viewport_skips() {
        let mut backend = HeadlessBackend::default();
        let mut canvas = backend.create_canvas(false).unwrap();
        let damage = PixelBounds { x0: 0, y0: 0, x1: 1, y1: 1 };
        assert!(backend.begin_frame(&mut canvas, damage).unwrap().is_none());

        backend.resize(&mut canvas, Viewport::new(4, 4)).unwrap();
        assert!(backend.begin_frame(&mut canvas, damage).unwrap().is_none());
    }

    #[test]
    fn oversized_back_buffer_fails_to_bind() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            max_buffer_bytes: 16,
            ..HeadlessConfig::default()
        });
        let mut canvas = backend.create_canvas(false).unwrap();
        let err = backend
            .bind_surface(&mut canvas, HeadlessSurface::new("big"), Some(Viewport::new(100, 100)))
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(canvas.surface().is_none());
    }

    #[test]
    fn growing_past_budget_fails_while_bound() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            max_buffer_bytes: 64,
            ..HeadlessConfig::default()
        });
        let mut canvas = backend.create_canvas(false).unwrap();
        backend.bind_surface(&mut canvas, HeadlessSurface::new("s"), None).unwrap();

        let err = backend.resize(&mut canvas, Viewport::new(800, 600)).unwrap_err();
        assert!(matches!(err, RenderError::AllocationFailure { .. }));
        assert!(canvas.surface().is_some());
        assert!(backend.resize(&mut canvas, Viewport::new(4, 4)).is_ok());
    }

    #[test]
    fn rebinding_discards_the_previous_back_buffer() {
        let mut backend = HeadlessBackend::default();
        let a = HeadlessSurface::new("a");
        let mut canvas = ready_canvas(&mut backend, &a);

        let full = PixelBounds { x0: 0, y0: 0, x1: 8, y1: 8 };
        let mut frame = backend.begin_frame(&mut canvas, full).unwrap().unwrap();
        frame.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), red());
        backend.end_frame(&mut canvas, frame).unwrap();

        let b = HeadlessSurface::new("b");
        backend.bind_surface(&mut canvas, b.clone(), Some(Viewport::new(8, 8))).unwrap();
        let corner = PixelBounds { x0: 0, y0: 0, x1: 1, y1: 1 };
        let frame = backend.begin_frame(&mut canvas, corner).unwrap().unwrap();
        backend.end_frame(&mut canvas, frame).unwrap();

        assert_eq!(b.pixel(7, 7), Some([0, 0, 0, 0]));
    }

    #[test]
    fn layers_record_and_composite() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("main");
        let mut canvas = ready_canvas(&mut backend, &surface);

        let mut layer = backend.create_layer(2, 2).unwrap();
        let mut frame = backend.begin_layer_frame(&mut layer).unwrap();
        frame.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), red());
        backend.end_layer_frame(&mut layer, frame);
        assert_eq!(backend.copy_layer(&layer).unwrap().pixel(1, 1), Some(RED));

        let damage = PixelBounds { x0: 0, y0: 0, x1: 8, y1: 8 };
        let mut frame = backend.begin_frame(&mut canvas, damage).unwrap().unwrap();
        backend.draw_layer(&mut frame, &layer, Rect::new(5.0, 5.0, 2.0, 2.0), None);
        backend.end_frame(&mut canvas, frame).unwrap();

        assert_eq!(surface.pixel(5, 5), Some(RED));
        assert_eq!(surface.pixel(4, 4), Some([0, 0, 0, 255]));
    }

    #[test]
    fn readback_can_be_masked_off() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            capabilities: Capabilities::LAYERS,
            ..HeadlessConfig::default()
        });
        let layer = backend.create_layer(1, 1).unwrap();
        assert_eq!(
            backend.copy_layer(&layer),
            Err(RenderError::UnsupportedOperation(Capabilities::LAYER_READBACK))
        );
    }
}
