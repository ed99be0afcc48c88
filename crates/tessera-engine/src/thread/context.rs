//! Render-thread state of one proxy and the command interpreter over it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crossbeam::channel::{Sender, TrySendError};

use crate::backend::{Backend, Capabilities};
use crate::coords::{DirtyRegion, PixelBounds, Viewport};
use crate::display::{DisplayList, DrawOp};
use crate::error::RenderError;
use crate::functor::FunctorInfo;
use crate::handle::{LayerHandle, ProxyHandle};
use crate::registry::ResourceRegistry;

use super::channel::{Command, DrawStatus, Reply};

/// Counters kept per context.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_drawn: u64,
    pub frames_skipped: u64,
}

/// Snapshot of a context, taken on the render thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxInfo {
    pub name: String,
    pub backend: &'static str,
    pub handle: ProxyHandle,
    pub capabilities: Capabilities,
    pub viewport: Option<Viewport>,
    pub surface_bound: bool,
    pub destroyed: bool,
    pub stats: FrameStats,
    pub functors: usize,
    pub layers: usize,
    pub cached_display_lists: usize,
}

impl fmt::Display for GfxInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Render context '{}' ({}, {})", self.name, self.handle, self.backend)?;
        writeln!(f, "  capabilities: {:?}", self.capabilities)?;
        match self.viewport {
            Some(vp) => writeln!(f, "  viewport: {}x{}", vp.width, vp.height)?,
            None => writeln!(f, "  viewport: unset")?,
        }
        writeln!(f, "  surface bound: {}", self.surface_bound)?;
        if self.destroyed {
            writeln!(f, "  destroyed: resources released")?;
        }
        writeln!(
            f,
            "  frames: {} drawn, {} skipped",
            self.stats.frames_drawn, self.stats.frames_skipped
        )?;
        write!(
            f,
            "  registry: {} functors, {} layers, {} cached display lists",
            self.functors, self.layers, self.cached_display_lists
        )
    }
}

/// What a traversal is drawing into.
#[derive(Debug, Copy, Clone)]
struct Target {
    viewport: Viewport,
    damage: PixelBounds,
    frame_index: u64,
}

pub(crate) struct CanvasContext<B: Backend> {
    handle: ProxyHandle,
    name: String,
    /// `None` once fully destroyed.
    canvas: Option<B::Canvas>,
    reply: Sender<Reply>,
    registry: ResourceRegistry<B>,
    viewport: Option<Viewport>,
    surface_bound: bool,
    /// Set by a new binding or size: nothing outside the damage is valid yet.
    needs_full_redraw: bool,
    stats: FrameStats,
}

impl<B: Backend> CanvasContext<B> {
    pub fn new(handle: ProxyHandle, canvas: B::Canvas, reply: Sender<Reply>) -> Self {
        Self {
            handle,
            name: format!("context-{}", handle.get()),
            canvas: Some(canvas),
            reply,
            registry: ResourceRegistry::default(),
            viewport: None,
            surface_bound: false,
            needs_full_redraw: true,
            stats: FrameStats::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `command` and answers on the reply slot if it is synchronous.
    pub fn dispatch(&mut self, backend: &mut B, command: Command<B>) {
        let name = command.name();
        log::trace!("[{}] {name}", self.name);
        if let Some(reply) = self.execute(backend, command) {
            self.acknowledge(name, reply);
        }
    }

    /// Never waits: the slot is empty whenever the proxy is waiting, so a
    /// failed `try_send` means the proxy is gone or out of step.
    pub fn acknowledge(&self, command: &str, reply: Reply) {
        match self.reply.try_send(reply) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::error!("[{}] reply slot full; dropping {command} acknowledgement", self.name);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("[{}] proxy gone; dropping {command} acknowledgement", self.name);
            }
        }
    }

    fn execute(&mut self, backend: &mut B, command: Command<B>) -> Option<Reply> {
        match command {
            // Handled by the run loop.
            Command::Create { .. } | Command::Dispose => None,

            Command::Initialize(surface) => Some(Reply::Surface(self.bind(backend, Some(surface)))),
            Command::UpdateSurface(surface) => Some(Reply::Surface(self.bind(backend, surface))),

            Command::Setup(viewport) => Some(Reply::Resized(self.resize(backend, viewport))),

            Command::Draw(args) => {
                let dirty = args.dirty();
                Some(Reply::Drawn(self.draw(backend, args.display_list, dirty)))
            }

            Command::RepeatLastDraw => {
                let status = match self.registry.last_drawn().cloned() {
                    Some(list) => self.draw(backend, list, DirtyRegion::Full),
                    None => {
                        log::debug!("[{}] nothing to repeat", self.name);
                        self.stats.frames_skipped += 1;
                        DrawStatus::Skipped
                    }
                };
                Some(Reply::Drawn(status))
            }

            Command::Destroy { full } => {
                self.destroy(backend, full);
                Some(Reply::Done)
            }

            Command::AttachFunctor(functor) => {
                let id = functor.id();
                if !self.registry.attach_functor(functor) {
                    log::debug!("[{}] {id:?} already attached", self.name);
                }
                None
            }

            Command::DetachFunctor(id) => {
                if !self.registry.detach_functor(id) {
                    log::debug!("[{}] {id:?} was not attached", self.name);
                }
                None
            }

            Command::CreateLayer { width, height } => Some(Reply::Layer(self.create_layer(backend, width, height))),

            Command::PushLayerUpdate { layer, display_list } => {
                if !self.registry.queue_layer_update(layer, display_list) {
                    log::debug!("[{}] update for unknown {layer:?} dropped", self.name);
                }
                None
            }

            Command::FlushLayerUpdates => {
                self.apply_layer_updates(backend);
                None
            }

            Command::CopyLayer(layer) => {
                self.apply_layer_updates(backend);
                let pixels = match self.registry.layer(layer) {
                    Some(entry) => backend.copy_layer(&entry.layer),
                    None => Err(RenderError::InvalidHandle),
                };
                Some(Reply::Pixels(pixels))
            }

            Command::DestroyLayer(layer) => {
                match self.registry.remove_layer(layer) {
                    Some(entry) => backend.destroy_layer(entry.layer),
                    None => log::debug!("[{}] destroy of unknown {layer:?} ignored", self.name),
                }
                None
            }

            Command::FlushCaches => {
                self.registry.flush_caches();
                if let Some(canvas) = self.canvas.as_mut() {
                    backend.trim_caches(canvas);
                }
                None
            }

            Command::SetName(name) => {
                log::debug!("[{}] renamed to '{name}'", self.name);
                self.name = name;
                None
            }

            Command::DumpInfo => Some(Reply::Info(Box::new(self.info(backend)))),

            Command::Fence => Some(Reply::Done),
        }
    }

    fn bind(&mut self, backend: &mut B, surface: Option<B::Surface>) -> Result<(), RenderError> {
        let Some(canvas) = self.canvas.as_mut() else {
            return Err(RenderError::InvalidHandle);
        };

        let Some(surface) = surface else {
            backend.unbind_surface(canvas);
            self.surface_bound = false;
            return Ok(());
        };

        let result = backend.bind_surface(canvas, surface, self.viewport);
        self.surface_bound = result.is_ok();
        match &result {
            Ok(()) => self.needs_full_redraw = true,
            Err(err) => log::warn!("[{}] surface bind failed: {err}", self.name),
        }
        result
    }

    fn resize(&mut self, backend: &mut B, viewport: Viewport) -> Result<(), RenderError> {
        if self.viewport != Some(viewport) {
            self.needs_full_redraw = true;
        }
        self.viewport = Some(viewport);

        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };
        let result = backend.resize(canvas, viewport);
        if let Err(err) = &result {
            log::warn!(
                "[{}] no buffers for {}x{}: {err}",
                self.name, viewport.width, viewport.height
            );
        }
        result
    }

    fn create_layer(&mut self, backend: &mut B, width: u32, height: u32) -> Result<LayerHandle, RenderError> {
        if self.canvas.is_none() {
            return Err(RenderError::InvalidHandle);
        }
        let layer = backend.create_layer(width, height)?;
        let handle = self.registry.insert_layer(layer, Viewport::new(width, height));
        log::debug!("[{}] {handle:?} created ({width}x{height})", self.name);
        Ok(handle)
    }

    fn draw(&mut self, backend: &mut B, list: DisplayList, dirty: DirtyRegion) -> DrawStatus {
        self.registry.set_last_drawn(list.clone());
        self.apply_layer_updates(backend);

        let status = self.draw_frame(backend, &list, dirty);
        match status {
            DrawStatus::Drawn => self.stats.frames_drawn += 1,
            DrawStatus::Skipped => self.stats.frames_skipped += 1,
        }
        status
    }

    fn draw_frame(&mut self, backend: &mut B, list: &DisplayList, dirty: DirtyRegion) -> DrawStatus {
        let Some(canvas) = self.canvas.as_mut() else {
            return DrawStatus::Skipped;
        };
        if !self.surface_bound {
            log::trace!("[{}] no surface; draw skipped", self.name);
            return DrawStatus::Skipped;
        }
        let Some(viewport) = self.viewport else {
            log::trace!("[{}] no viewport; draw skipped", self.name);
            return DrawStatus::Skipped;
        };

        let dirty = if backend.capabilities().contains(Capabilities::PARTIAL_REDRAW) {
            dirty
        } else {
            DirtyRegion::Full
        };
        let Some(damage) = dirty.clip_to(viewport) else {
            return DrawStatus::Skipped;
        };
        let damage = if self.needs_full_redraw {
            DirtyRegion::Full.clip_to(viewport).unwrap_or(damage)
        } else {
            damage
        };

        let mut frame = match backend.begin_frame(canvas, damage) {
            Ok(Some(frame)) => frame,
            Ok(None) => return DrawStatus::Skipped,
            Err(err) => {
                log::warn!("[{}] cannot begin frame: {err}", self.name);
                return DrawStatus::Skipped;
            }
        };

        let target = Target {
            viewport,
            damage,
            frame_index: self.stats.frames_drawn,
        };
        traverse(backend, &mut frame, list, &self.registry, target, &self.name);

        match backend.end_frame(canvas, frame) {
            Ok(()) => {
                self.needs_full_redraw = false;
                DrawStatus::Drawn
            }
            Err(err) => {
                log::warn!("[{}] frame submission failed: {err}", self.name);
                DrawStatus::Skipped
            }
        }
    }

    /// Re-records every layer with a queued update, in push order.
    fn apply_layer_updates(&mut self, backend: &mut B) {
        if !self.registry.has_pending_layer_updates() {
            return;
        }

        for (handle, list) in self.registry.take_layer_updates() {
            let Some(mut entry) = self.registry.take_layer(handle) else { continue };

            match backend.begin_layer_frame(&mut entry.layer) {
                Ok(mut frame) => {
                    let target = Target {
                        viewport: entry.size,
                        damage: PixelBounds { x0: 0, y0: 0, x1: entry.size.width, y1: entry.size.height },
                        frame_index: self.stats.frames_drawn,
                    };
                    traverse(backend, &mut frame, &list, &self.registry, target, &self.name);
                    backend.end_layer_frame(&mut entry.layer, frame);
                }
                Err(err) => log::warn!("[{}] cannot re-record {handle:?}: {err}", self.name),
            }

            self.registry.restore_layer(handle, entry);
        }
    }

    fn destroy(&mut self, backend: &mut B, full: bool) {
        if let Some(canvas) = self.canvas.as_mut() {
            backend.unbind_surface(canvas);
        }
        self.surface_bound = false;

        if full {
            self.registry.clear(backend);
            if let Some(canvas) = self.canvas.take() {
                backend.destroy_canvas(canvas);
            }
            log::debug!("[{}] destroyed with all resources", self.name);
        } else {
            log::debug!("[{}] surface released", self.name);
        }
    }

    fn info(&self, backend: &B) -> GfxInfo {
        GfxInfo {
            name: self.name.clone(),
            backend: backend.name(),
            handle: self.handle,
            capabilities: backend.capabilities(),
            viewport: self.viewport,
            surface_bound: self.surface_bound,
            destroyed: self.canvas.is_none(),
            stats: self.stats,
            functors: self.registry.functor_count(),
            layers: self.registry.layer_count(),
            cached_display_lists: self.registry.cached_display_lists(),
        }
    }

    /// Releases everything the context still holds.
    pub fn teardown(mut self, backend: &mut B) {
        self.registry.clear(backend);
        if let Some(canvas) = self.canvas.take() {
            backend.destroy_canvas(canvas);
        }
        log::debug!("[{}] disposed", self.name);
    }
}

/// Walks `list` in order: functors run inline after a flush, layers are
/// composited from the registry, everything else goes to the backend.
fn traverse<B: Backend>(
    backend: &mut B,
    frame: &mut B::Frame,
    list: &DisplayList,
    registry: &ResourceRegistry<B>,
    target: Target,
    context: &str,
) {
    for item in list.items() {
        match item.op {
            DrawOp::Functor(id) => {
                let Some(functor) = registry.functor(id) else {
                    log::trace!("[{context}] {id:?} not attached; skipped");
                    continue;
                };
                backend.flush(frame);
                let info = FunctorInfo {
                    display_list: list.id(),
                    viewport: target.viewport,
                    damage: target.damage,
                    clip: item.clip,
                    frame_index: target.frame_index,
                };
                if catch_unwind(AssertUnwindSafe(|| functor.invoke(frame, &info))).is_err() {
                    log::error!("[{context}] {id:?} panicked; frame continues without it");
                }
            }
            DrawOp::Layer { layer, dst } => match registry.layer(layer) {
                Some(entry) => backend.draw_layer(frame, &entry.layer, dst, item.clip),
                None => log::trace!("[{context}] {layer:?} unknown; skipped"),
            },
            DrawOp::Clear(_) | DrawOp::FillRect { .. } => backend.draw_op(frame, item),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossbeam::channel::{Receiver, bounded};
    use parking_lot::Mutex;

    use super::*;
    use crate::backend::headless::{HeadlessBackend, HeadlessConfig, HeadlessFrame, HeadlessSurface};
    use crate::coords::{Color, DirtyRect, Rect};
    use crate::display::DisplayListRecorder;
    use crate::functor::Functor;
    use crate::thread::channel::DrawArgs;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn context(backend: &mut HeadlessBackend) -> (CanvasContext<HeadlessBackend>, Receiver<Reply>) {
        let (tx, rx) = bounded(1);
        let canvas = backend.create_canvas(false).unwrap();
        (CanvasContext::new(ProxyHandle::next(), canvas, tx), rx)
    }

    fn ready(backend: &mut HeadlessBackend, surface: &HeadlessSurface) -> CanvasContext<HeadlessBackend> {
        let (mut ctx, _rx) = context(backend);
        assert!(matches!(
            ctx.execute(backend, Command::Setup(Viewport::new(4, 4))),
            Some(Reply::Resized(Ok(())))
        ));
        assert!(matches!(
            ctx.execute(backend, Command::Initialize(surface.clone())),
            Some(Reply::Surface(Ok(())))
        ));
        ctx
    }

    fn draw(ctx: &mut CanvasContext<HeadlessBackend>, backend: &mut HeadlessBackend, list: &DisplayList, dirty: DirtyRegion) -> DrawStatus {
        match ctx.execute(backend, Command::Draw(DrawArgs::new(list.clone(), dirty))) {
            Some(Reply::Drawn(status)) => status,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    fn solid(color: Color) -> DisplayList {
        let mut rec = DisplayListRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), color);
        rec.finish()
    }

    #[test]
    fn functors_run_inline_in_list_order() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        // The functor sees the red fill already rasterized.
        let seen = Arc::new(Mutex::new(None));
        let observed = Arc::clone(&seen);
        let functor = Functor::<HeadlessBackend>::from_fn(move |frame: &mut HeadlessFrame, info| {
            *observed.lock() = frame.target().pixel(0, 0);
            assert_eq!(info.viewport, Viewport::new(4, 4));
            frame.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::from_rgba8(0, 0, 255, 255));
        });
        ctx.execute(&mut backend, Command::AttachFunctor(functor.clone()));

        let mut rec = DisplayListRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::from_rgba8(255, 0, 0, 255));
        rec.draw_functor(functor.id());
        let list = rec.finish();

        assert_eq!(draw(&mut ctx, &mut backend, &list, DirtyRegion::Full), DrawStatus::Drawn);
        assert_eq!(*seen.lock(), Some(RED));
        assert_eq!(surface.pixel(0, 0), Some(BLUE));
        assert_eq!(surface.pixel(1, 1), Some(RED));
    }

    #[test]
    fn panicking_functor_does_not_abort_the_frame() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        let functor = Functor::<HeadlessBackend>::from_fn(|_, _| panic!("functor bug"));
        ctx.execute(&mut backend, Command::AttachFunctor(functor.clone()));

        let mut rec = DisplayListRecorder::new();
        rec.draw_functor(functor.id());
        rec.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::from_rgba8(255, 0, 0, 255));
        let list = rec.finish();

        assert_eq!(draw(&mut ctx, &mut backend, &list, DirtyRegion::Full), DrawStatus::Drawn);
        assert_eq!(surface.pixel(2, 2), Some(RED));
    }

    #[test]
    fn partial_redraw_keeps_pixels_outside_damage() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        draw(&mut ctx, &mut backend, &solid(Color::from_rgba8(255, 0, 0, 255)), DirtyRegion::Full);
        let blue = solid(Color::from_rgba8(0, 0, 255, 255));
        draw(&mut ctx, &mut backend, &blue, DirtyRegion::Rect(DirtyRect::new(0, 0, 2, 2)));

        assert_eq!(surface.pixel(1, 1), Some(BLUE));
        assert_eq!(surface.pixel(3, 3), Some(RED));
    }

    #[test]
    fn first_draw_on_a_new_surface_repaints_everything() {
        let mut backend = HeadlessBackend::default();
        let a = HeadlessSurface::new("a");
        let mut ctx = ready(&mut backend, &a);
        draw(&mut ctx, &mut backend, &solid(Color::from_rgba8(255, 0, 0, 255)), DirtyRegion::Full);

        let b = HeadlessSurface::new("b");
        ctx.execute(&mut backend, Command::UpdateSurface(Some(b.clone())));
        let blue = solid(Color::from_rgba8(0, 0, 255, 255));
        let corner = DirtyRegion::Rect(DirtyRect::new(0, 0, 2, 2));

        draw(&mut ctx, &mut backend, &blue, corner);
        assert_eq!(b.pixel(3, 3), Some(BLUE));

        // Only the first frame is widened.
        draw(&mut ctx, &mut backend, &solid(Color::from_rgba8(255, 0, 0, 255)), corner);
        assert_eq!(b.pixel(1, 1), Some(RED));
        assert_eq!(b.pixel(3, 3), Some(BLUE));
        assert_eq!(a.present_count(), 1);
    }

    #[test]
    fn setup_reports_buffer_allocation_failure() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            max_buffer_bytes: 64,
            ..HeadlessConfig::default()
        });
        let surface = HeadlessSurface::new("s");
        let (mut ctx, _rx) = context(&mut backend);
        assert!(matches!(
            ctx.execute(&mut backend, Command::Initialize(surface.clone())),
            Some(Reply::Surface(Ok(())))
        ));

        assert!(matches!(
            ctx.execute(&mut backend, Command::Setup(Viewport::new(800, 600))),
            Some(Reply::Resized(Err(RenderError::AllocationFailure { .. })))
        ));
        assert!(ctx.info(&backend).surface_bound);

        assert!(matches!(
            ctx.execute(&mut backend, Command::Setup(Viewport::new(4, 4))),
            Some(Reply::Resized(Ok(())))
        ));
        let status = draw(&mut ctx, &mut backend, &solid(Color::from_rgba8(255, 0, 0, 255)), DirtyRegion::Full);
        assert_eq!(status, DrawStatus::Drawn);
        assert_eq!(surface.pixel(3, 3), Some(RED));
    }

    #[test]
    fn without_partial_redraw_every_draw_repaints_everything() {
        let mut backend = HeadlessBackend::new(HeadlessConfig {
            capabilities: Capabilities::FUNCTORS,
            ..HeadlessConfig::default()
        });
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        draw(&mut ctx, &mut backend, &solid(Color::from_rgba8(255, 0, 0, 255)), DirtyRegion::Full);
        let blue = solid(Color::from_rgba8(0, 0, 255, 255));
        draw(&mut ctx, &mut backend, &blue, DirtyRegion::Rect(DirtyRect::new(0, 0, 2, 2)));

        assert_eq!(surface.pixel(3, 3), Some(BLUE));
    }

    #[test]
    fn draw_outside_viewport_is_skipped() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        let status = draw(
            &mut ctx,
            &mut backend,
            &DisplayList::empty(),
            DirtyRegion::Rect(DirtyRect::new(10, 10, 20, 20)),
        );
        assert_eq!(status, DrawStatus::Skipped);
        assert_eq!(surface.present_count(), 0);
        assert_eq!(ctx.info(&backend).stats.frames_skipped, 1);
    }

    #[test]
    fn layer_updates_apply_before_the_next_draw() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);

        let layer = match ctx.execute(&mut backend, Command::CreateLayer { width: 2, height: 2 }) {
            Some(Reply::Layer(Ok(layer))) => layer,
            other => panic!("unexpected reply {other:?}"),
        };

        let mut rec = DisplayListRecorder::new();
        rec.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::from_rgba8(255, 0, 0, 255));
        ctx.execute(&mut backend, Command::PushLayerUpdate { layer, display_list: rec.finish() });

        rec.draw_layer(layer, Rect::new(2.0, 2.0, 2.0, 2.0));
        draw(&mut ctx, &mut backend, &rec.finish(), DirtyRegion::Full);

        assert_eq!(surface.pixel(3, 3), Some(RED));
        assert_eq!(surface.pixel(0, 0), Some([0, 0, 0, 255]));
    }

    #[test]
    fn full_destroy_releases_registry_and_canvas() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);
        ctx.execute(&mut backend, Command::AttachFunctor(Functor::<HeadlessBackend>::from_fn(|_, _| {})));
        ctx.execute(&mut backend, Command::CreateLayer { width: 1, height: 1 });

        ctx.execute(&mut backend, Command::Destroy { full: true });
        let info = ctx.info(&backend);
        assert!(info.destroyed);
        assert!(!info.surface_bound);
        assert_eq!((info.functors, info.layers), (0, 0));
        assert_eq!(backend.live_canvases(), 0);

        assert!(matches!(
            ctx.execute(&mut backend, Command::Initialize(surface.clone())),
            Some(Reply::Surface(Err(RenderError::InvalidHandle)))
        ));
    }

    #[test]
    fn acknowledge_never_blocks_on_a_full_slot() {
        let mut backend = HeadlessBackend::default();
        let (ctx, rx) = context(&mut backend);

        ctx.acknowledge("fence", Reply::Done);
        ctx.acknowledge("fence", Reply::Done);
        assert!(matches!(rx.try_recv(), Ok(Reply::Done)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn info_renders_a_readable_report() {
        let mut backend = HeadlessBackend::default();
        let surface = HeadlessSurface::new("s");
        let mut ctx = ready(&mut backend, &surface);
        ctx.execute(&mut backend, Command::SetName("main window".into()));

        let report = ctx.info(&backend).to_string();
        assert!(report.contains("'main window'"));
        assert!(report.contains("viewport: 4x4"));
        assert!(report.contains("surface bound: true"));
    }
}
