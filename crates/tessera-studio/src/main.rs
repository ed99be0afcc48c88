use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use tessera_engine::backend::gpu::{GpuInit, WgpuBackend, WgpuFrame};
use tessera_engine::coords::{Color, Rect};
use tessera_engine::display::DisplayListRecorder;
use tessera_engine::logging::{LoggingConfig, init_logging};
use tessera_engine::{DrawStatus, Functor, FunctorInfo, RenderProxy, RenderThread, RenderThreadConfig};

/// Draws a bar whose width follows a sine of wall-clock time.
fn pulse_functor(started: Instant) -> Functor<WgpuBackend> {
    Functor::from_fn(move |frame: &mut WgpuFrame, info: &FunctorInfo| {
        let Some(area) = info.clip else { return };
        let t = started.elapsed().as_secs_f32();
        let fill = 0.5 + 0.5 * (t * 2.0).sin();

        frame.fill_rect(
            Rect::new(area.x, area.y, area.width * fill, area.height),
            Color::from_rgba8(80, 200, 255, 255),
        );
    })
}

struct Studio {
    // Field order matters: the proxy must go before the render thread.
    proxy: Option<RenderProxy<WgpuBackend>>,
    window: Option<Arc<Window>>,
    render: RenderThread<WgpuBackend>,
    pulse: Functor<WgpuBackend>,
    recorder: DisplayListRecorder,
}

impl Studio {
    fn new(render: RenderThread<WgpuBackend>) -> Self {
        Self {
            proxy: None,
            window: None,
            render,
            pulse: pulse_functor(Instant::now()),
            recorder: DisplayListRecorder::new(),
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("tessera studio")
            .with_inner_size(LogicalSize::new(960.0, 540.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let mut proxy = self
            .render
            .try_create_proxy(false)
            .context("failed to allocate render context")?;
        proxy.set_name("studio");

        let size = window.inner_size();
        proxy
            .setup(size.width, size.height)
            .context("failed to size render context")?;
        proxy
            .initialize(Arc::clone(&window))
            .context("failed to bind window surface")?;

        if let Err(e) = proxy.attach_functor(&self.pulse) {
            log::warn!("pulse functor unavailable: {e}");
        }

        self.window = Some(window);
        self.proxy = Some(proxy);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut proxy) = self.proxy.take() {
            proxy.detach_functor(self.pulse.id());
            // Release the binding before the window goes away.
            if let Err(e) = proxy.update_surface(None) {
                log::warn!("failed to release surface: {e}");
            }
            proxy.dispose();
        }
        self.window = None;
    }

    fn redraw(&mut self) {
        let Some(proxy) = self.proxy.as_mut() else { return };
        let (w, h) = (proxy.width() as f32, proxy.height() as f32);
        if w == 0.0 || h == 0.0 {
            return;
        }

        let rec = &mut self.recorder;
        rec.clear_to(Color::from_rgba8(18, 20, 28, 255));
        rec.fill_rect(Rect::new(24.0, 24.0, w - 48.0, 48.0), Color::from_rgba8(40, 44, 60, 255));
        rec.fill_rect(
            Rect::new(24.0, 96.0, (w - 48.0) * 0.5, h - 120.0),
            Color::from_rgba8(255, 255, 255, 24).over(Color::from_rgba8(30, 32, 44, 255)),
        );

        rec.push_clip(Rect::new(36.0, 36.0, w - 72.0, 24.0));
        rec.draw_functor(self.pulse.id());
        rec.pop_clip();

        let list = rec.finish();
        if proxy.draw(&list, None) == DrawStatus::Skipped {
            log::trace!("frame skipped");
        }
    }

    fn dump_info(&mut self) {
        let Some(proxy) = self.proxy.as_mut() else { return };
        let mut out = std::io::stdout().lock();
        if let Err(e) = proxy.dump_gfx_info(&mut out) {
            log::warn!("failed to write gfx info: {e}");
        }
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            log::error!("{e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(proxy) = self.proxy.as_mut() {
                    if let Err(e) = proxy.setup(size.width, size.height) {
                        log::warn!("resize to {}x{} failed: {e}", size.width, size.height);
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::KeyD) {
                    self.dump_info();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let render = RenderThread::spawn(RenderThreadConfig::default(), || WgpuBackend::new(GpuInit::default()))?;
    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;

    let mut studio = Studio::new(render);
    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;

    studio.close();
    Ok(())
}
