//! wgpu backend.
//!
//! One device/queue shared by every canvas; each canvas binds a winit window
//! surface. Frames always repaint the whole surface (swapchain images do not
//! retain previous contents), so `PARTIAL_REDRAW` is not advertised. Layers
//! are not implemented here; the headless backend covers them.

mod init;
mod rect;
mod surface;

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::window::Window;

use crate::coords::{Color, PixelBounds, Rect, Viewport};
use crate::display::{DrawItem, DrawOp};
use crate::error::RenderError;

use super::{Backend, Capabilities};

use rect::{PendingRect, RectRenderer, RectTarget};
use surface::{BoundSurface, SurfaceErrorAction};

pub use init::GpuInit;

pub struct WgpuBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    init: GpuInit,
    rects: RectRenderer,
}

pub struct WgpuCanvas {
    translucent: bool,
    bound: Option<BoundSurface>,
    viewport: Option<Viewport>,
}

/// An acquired swapchain image plus the encoder recording into it.
///
/// Functors may record their own passes through `encoder` against `view`, or
/// queue solid fills with [`fill_rect`](Self::fill_rect).
pub struct WgpuFrame {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub encoder: wgpu::CommandEncoder,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub viewport: Viewport,
    window: Arc<Window>,
    surface_texture: wgpu::SurfaceTexture,
    pending: Vec<PendingRect>,
}

impl WgpuFrame {
    /// Queues a premultiplied solid fill. Drawn at the next flush.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() || !rect.is_finite() {
            return;
        }
        self.pending.push(PendingRect::new(rect, color, None));
    }

    fn clear_pass(&mut self, color: Color) {
        let _ = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessera clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
}

impl WgpuBackend {
    /// Creates the device-level context. Blocks on adapter and device requests.
    pub fn new(init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new_async(init))
    }

    async fn new_async(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // No surface exists yet; windows are bound per canvas later.
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessera render device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let info = adapter.get_info();
        log::info!("wgpu adapter: {} ({:?})", info.name, info.backend);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            init,
            rects: RectRenderer::default(),
        })
    }

    fn render_pending(&mut self, frame: &mut WgpuFrame) {
        if frame.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut frame.pending);
        self.rects.render(
            RectTarget {
                device: &self.device,
                queue: &self.queue,
                encoder: &mut frame.encoder,
                view: &frame.view,
                format: frame.format,
                viewport: frame.viewport,
            },
            &pending,
        );
        // Keep the allocation for the next batch.
        frame.pending = pending;
        frame.pending.clear();
    }
}

impl Backend for WgpuBackend {
    type Surface = Arc<Window>;
    type Canvas = WgpuCanvas;
    type Layer = ();
    type Frame = WgpuFrame;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FUNCTORS
    }

    fn create_canvas(&mut self, translucent: bool) -> Result<WgpuCanvas, RenderError> {
        Ok(WgpuCanvas {
            translucent,
            bound: None,
            viewport: None,
        })
    }

    fn bind_surface(
        &mut self,
        canvas: &mut WgpuCanvas,
        window: Arc<Window>,
        viewport: Option<Viewport>,
    ) -> Result<(), RenderError> {
        // Drop the old surface before creating a new one for the same window.
        canvas.bound = None;

        let surface = self
            .instance
            .create_surface(Arc::clone(&window))
            .map_err(surface::surface_allocation_error)?;

        let caps = surface.get_capabilities(&self.adapter);
        let format = surface::choose_surface_format(&caps, self.init.prefer_srgb)
            .ok_or_else(|| surface::surface_allocation_error("no supported formats"))?;
        let alpha_mode = surface::choose_alpha_mode(&caps, canvas.translucent);

        let size = viewport.or(canvas.viewport).unwrap_or_else(|| {
            let s = window.inner_size();
            Viewport::new(s.width, s.height)
        });

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: self.init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: self.init.desired_maximum_frame_latency,
        };

        let mut bound = BoundSurface {
            window,
            surface,
            config,
            configured: false,
        };
        bound.configure(&self.device, size);
        log::debug!("wgpu surface bound ({format:?}, {alpha_mode:?}, {}x{})", size.width, size.height);

        canvas.bound = Some(bound);
        Ok(())
    }

    fn unbind_surface(&mut self, canvas: &mut WgpuCanvas) {
        if canvas.bound.take().is_some() {
            log::debug!("wgpu surface unbound");
        }
    }

    fn resize(&mut self, canvas: &mut WgpuCanvas, viewport: Viewport) -> Result<(), RenderError> {
        canvas.viewport = Some(viewport);
        if let Some(bound) = canvas.bound.as_mut() {
            bound.configure(&self.device, viewport);
        }
        Ok(())
    }

    fn begin_frame(
        &mut self,
        canvas: &mut WgpuCanvas,
        _damage: PixelBounds,
    ) -> Result<Option<WgpuFrame>, RenderError> {
        let Some(viewport) = canvas.viewport.filter(|vp| !vp.is_empty()) else {
            return Ok(None);
        };
        let Some(bound) = canvas.bound.as_mut().filter(|b| b.configured) else {
            return Ok(None);
        };

        let surface_texture = match bound.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                return match bound.handle_error(&self.device, err.clone()) {
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        log::debug!("skipping frame: {err}");
                        Ok(None)
                    }
                    SurfaceErrorAction::Fatal => Err(surface::surface_allocation_error(err)),
                };
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tessera frame encoder"),
            });

        let mut frame = WgpuFrame {
            device: self.device.clone(),
            queue: self.queue.clone(),
            encoder,
            view,
            format: bound.config.format,
            viewport,
            window: Arc::clone(&bound.window),
            surface_texture,
            pending: Vec::new(),
        };

        self.rects.begin_frame();

        let clear = if canvas.translucent { Color::TRANSPARENT } else { Color::BLACK };
        frame.clear_pass(clear);
        Ok(Some(frame))
    }

    /// A clipped `Clear` is drawn as a fill of the clip, so translucent clear
    /// colors blend instead of replacing.
    fn draw_op(&mut self, frame: &mut WgpuFrame, item: &DrawItem) {
        match item.op {
            DrawOp::Clear(color) => match item.clip {
                None => {
                    // Everything queued so far is about to be overwritten.
                    frame.pending.clear();
                    frame.clear_pass(color);
                }
                Some(clip) => frame.pending.push(PendingRect::new(clip, color, Some(clip))),
            },
            DrawOp::FillRect { rect, color } => {
                frame.pending.push(PendingRect::new(rect, color, item.clip));
            }
            DrawOp::Functor(_) | DrawOp::Layer { .. } => {}
        }
    }

    fn flush(&mut self, frame: &mut WgpuFrame) {
        self.render_pending(frame);
    }

    fn end_frame(&mut self, _canvas: &mut WgpuCanvas, mut frame: WgpuFrame) -> Result<(), RenderError> {
        self.render_pending(&mut frame);

        let WgpuFrame {
            encoder,
            view,
            window,
            surface_texture,
            ..
        } = frame;

        window.pre_present_notify();
        self.queue.submit(std::iter::once(encoder.finish()));
        drop(view);
        surface_texture.present();
        Ok(())
    }

    fn trim_caches(&mut self, _canvas: &mut WgpuCanvas) {
        self.rects.trim();
    }

    fn destroy_canvas(&mut self, mut canvas: WgpuCanvas) {
        self.unbind_surface(&mut canvas);
    }
}
